//! Share store port: persistence for disclosure tokens.

use async_trait::async_trait;

use crate::domain::ShareToken;

/// Partial update applied to a stored token. Tokens are never deleted;
/// the only mutations are revocation and the access counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareTokenPatch {
    /// Set the active flag (revocation writes `Some(false)`).
    pub active: Option<bool>,
    /// Bump `accessed_count` by one, atomically at the store.
    pub increment_access: bool,
}

/// Trait for disclosure token persistence.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Error type for share store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert a freshly minted token. All-or-nothing: a failed insert
    /// must leave nothing resolvable behind.
    ///
    /// # Errors
    /// Returns a conflict error if the token value already exists.
    async fn insert(&self, token: &ShareToken) -> Result<(), Self::Error>;

    /// Look up a token by its opaque bearer value.
    ///
    /// # Returns
    /// `None` if no such token exists.
    ///
    /// # Errors
    /// Returns error if the lookup fails.
    async fn find_by_token(&self, token: &str) -> Result<Option<ShareToken>, Self::Error>;

    /// List tokens with `active = true` for an entity, newest first.
    /// Expiry is not filtered here; callers compute expired-but-not-
    /// revoked states themselves.
    ///
    /// # Errors
    /// Returns error if the lookup fails.
    async fn find_active_by_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<ShareToken>, Self::Error>;

    /// Apply a patch to a token row by id. Patching an unknown id is a
    /// no-op (revocation stays idempotent).
    ///
    /// # Errors
    /// Returns error if the write fails.
    async fn update(&self, token_id: &str, patch: ShareTokenPatch) -> Result<(), Self::Error>;
}
