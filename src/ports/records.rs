//! Record store port: read access to an animal's health records.
//!
//! The record store is owned by the surrounding application; the engine
//! only reads from it. One typed method per record category keeps the
//! four fetches independently awaitable so the aggregator can fan out.

use async_trait::async_trait;

use crate::domain::{
    EntityProfile, MedicationRecord, VaccinationRecord, VisitRecord, WeightRecord,
};

/// Trait for read-only access to the record store.
///
/// Implementations order each list by the category's natural date field
/// descending (most recent first).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Error type for record store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// List vaccination records for an entity.
    ///
    /// # Errors
    /// Returns error if the fetch fails.
    async fn list_vaccinations(
        &self,
        entity_id: &str,
    ) -> Result<Vec<VaccinationRecord>, Self::Error>;

    /// List medication records for an entity.
    ///
    /// # Errors
    /// Returns error if the fetch fails.
    async fn list_medications(&self, entity_id: &str)
        -> Result<Vec<MedicationRecord>, Self::Error>;

    /// List visit records for an entity.
    ///
    /// # Errors
    /// Returns error if the fetch fails.
    async fn list_visits(&self, entity_id: &str) -> Result<Vec<VisitRecord>, Self::Error>;

    /// List weight records for an entity.
    ///
    /// # Errors
    /// Returns error if the fetch fails.
    async fn list_weights(&self, entity_id: &str) -> Result<Vec<WeightRecord>, Self::Error>;

    /// Fetch the non-temporal profile of an entity.
    ///
    /// # Returns
    /// `None` if the entity is unknown.
    ///
    /// # Errors
    /// Returns error if the fetch fails.
    async fn profile(&self, entity_id: &str) -> Result<Option<EntityProfile>, Self::Error>;
}
