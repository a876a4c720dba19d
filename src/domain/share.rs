//! Disclosure tokens and the permission-scoped disclosed view.
//!
//! A share token is an opaque bearer string granting time-limited,
//! field-group-scoped read access to one animal's record. Tokens are
//! minted from CSPRNG entropy and are never derivable from the row id,
//! the entity id, or any timestamp.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::alert::AlertItem;
use super::record::{
    DocumentRef, EmergencyContact, MedicationRecord, TimelineItem, VaccinationRecord, VisitRecord,
};
use super::rules::WeightTrend;

/// Shares expire this many days after creation.
pub const SHARE_TTL_DAYS: i64 = 30;

/// Token entropy in bytes (hex-encoded to twice this length).
pub const TOKEN_BYTES: usize = 32;

/// Attempts to mint a unique token before surfacing a conflict.
pub const TOKEN_MINT_RETRIES: usize = 3;

/// The fixed set of disclosable field-groups, one flag each.
///
/// Adding a field-group is a one-place change here; everything that
/// gates on permissions consumes this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePermissions {
    pub identification: bool,
    pub physical: bool,
    pub medical: bool,
    pub vaccinations: bool,
    pub emergency: bool,
    pub allergies: bool,
    pub notes: bool,
    pub timeline: bool,
    pub documents: bool,
}

impl SharePermissions {
    /// Every field-group disclosed.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            identification: true,
            physical: true,
            medical: true,
            vaccinations: true,
            emergency: true,
            allergies: true,
            notes: true,
            timeline: true,
            documents: true,
        }
    }

    /// No field-group disclosed.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            identification: false,
            physical: false,
            medical: false,
            vaccinations: false,
            emergency: false,
            allergies: false,
            notes: false,
            timeline: false,
            documents: false,
        }
    }

    /// Whether at least one field-group is disclosed.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.identification
            || self.physical
            || self.medical
            || self.vaccinations
            || self.emergency
            || self.allergies
            || self.notes
            || self.timeline
            || self.documents
    }
}

/// A persisted disclosure token.
///
/// Lifecycle: created by `generate`, mutated only by `revoke`
/// (`active` → false, permanent) and `resolve` (access count), never
/// deleted — expired and revoked tokens remain for the owner's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareToken {
    pub id: String,
    pub entity_id: String,
    /// Opaque bearer value; returned to the owner once, at creation.
    pub token: String,
    pub permissions: SharePermissions,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accessed_count: u64,
}

impl ShareToken {
    /// Mint a new active token for an entity, expiring
    /// [`SHARE_TTL_DAYS`] after `now`.
    #[must_use]
    pub fn mint(entity_id: impl Into<String>, permissions: SharePermissions, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            entity_id: entity_id.into(),
            token: mint_token(),
            permissions,
            active: true,
            created_at: now,
            expires_at: now + Duration::days(SHARE_TTL_DAYS),
            accessed_count: 0,
        }
    }

    /// Expiry is a pure function of time; no write happens when a token
    /// crosses its `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether `resolve` may disclose anything for this token.
    #[must_use]
    pub fn is_resolvable(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }
}

/// Generate a random id (UUID v4 format) using a CSPRNG.
///
/// Uses ChaCha20Rng seeded from OS entropy so ids are unpredictable on
/// all platforms.
#[must_use]
pub fn new_id() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

/// Mint an opaque bearer token: [`TOKEN_BYTES`] bytes of CSPRNG
/// entropy, hex-encoded. Brute-force guessing is infeasible at this
/// size; a stored-uniqueness collision is treated as a retryable
/// conflict by the service layer anyway.
#[must_use]
pub fn mint_token() -> String {
    use rand::RngCore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill_bytes(&mut bytes);

    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Identification field-group of a disclosure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationSection {
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub sex: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub microchip: Option<String>,
}

/// Physical field-group: latest weight plus trend and visible traits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalSection {
    pub latest_weight: Option<f64>,
    pub latest_weight_unit: Option<String>,
    pub weight_recorded_on: Option<NaiveDate>,
    pub weight_trend: Option<WeightTrend>,
    /// Body condition label ("ideal", "overweight", ...), when scored.
    pub body_condition: Option<String>,
    pub color: Option<String>,
    pub markings: Option<String>,
}

/// Medical field-group: current medications, visit history, and any
/// interaction or allergy warnings the rule library raises for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalSection {
    pub medications: Vec<MedicationRecord>,
    pub visits: Vec<VisitRecord>,
    pub warnings: Vec<String>,
}

/// Timeline field-group: the normalized timeline plus ranked alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineSection {
    pub items: Vec<TimelineItem>,
    pub alerts: Vec<AlertItem>,
}

/// The permission-filtered projection returned by `resolve`. Derived,
/// never persisted: each section is present only when its field-group
/// flag was true on the token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisclosedView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<IdentificationSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical: Option<PhysicalSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical: Option<MedicalSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vaccinations: Option<Vec<VaccinationRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency: Option<EmergencyContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<DocumentRef>>,
}

impl Default for SharePermissions {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_all_none_any() {
        assert!(SharePermissions::all().any());
        assert!(!SharePermissions::none().any());

        let one = SharePermissions {
            vaccinations: true,
            ..SharePermissions::none()
        };
        assert!(one.any());
    }

    #[test]
    fn test_mint_sets_ttl_and_defaults() {
        let now = Utc::now();
        let token = ShareToken::mint("pet-1", SharePermissions::all(), now);

        assert!(token.active);
        assert_eq!(token.accessed_count, 0);
        assert_eq!(token.expires_at, now + Duration::days(SHARE_TTL_DAYS));
        assert!(token.expires_at > token.created_at);
        assert!(token.is_resolvable(now));
    }

    #[test]
    fn test_expiry_is_time_based() {
        let now = Utc::now();
        let token = ShareToken::mint("pet-1", SharePermissions::all(), now);

        assert!(!token.is_expired(now));
        let later = now + Duration::days(SHARE_TTL_DAYS + 1);
        assert!(token.is_expired(later));
        assert!(!token.is_resolvable(later));
    }

    #[test]
    fn test_token_format_and_uniqueness() {
        let first = mint_token();
        let second = mint_token();

        assert_eq!(first.len(), TOKEN_BYTES * 2);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn test_id_generation() {
        let id1 = new_id();
        let id2 = new_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36); // UUID format with dashes
    }
}
