//! Health record types for a single animal.
//!
//! Records are owned by the record store and created by owner-facing CRUD
//! flows outside this engine. Everything here is read-only from the
//! engine's perspective; the engine derives timelines and alerts from it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The four record categories the aggregator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordCategory {
    Vaccination,
    Medication,
    Visit,
    Weight,
}

impl RecordCategory {
    /// Tie-break rank for alert ordering: visits (medical follow-ups)
    /// outrank vaccinations, which outrank medications, which outrank
    /// everything else. Lower sorts first.
    #[must_use]
    pub const fn triage_rank(self) -> u8 {
        match self {
            Self::Visit => 0,
            Self::Vaccination => 1,
            Self::Medication => 2,
            Self::Weight => 3,
        }
    }

    /// Stable name used in storage and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vaccination => "vaccination",
            Self::Medication => "medication",
            Self::Visit => "visit",
            Self::Weight => "weight",
        }
    }
}

impl std::fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight measurement unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    Kg,
    Lb,
}

impl WeightUnit {
    /// Stable name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::Lb => "lb",
        }
    }

    /// Parse a stored unit string; defaults to kg for unknown values.
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "lb" | "lbs" => Self::Lb,
            _ => Self::Kg,
        }
    }
}

/// A vaccination record. Due-date semantics: `next_due_date` is the
/// authoritative due date for boosters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccinationRecord {
    pub record_id: String,
    pub entity_id: String,
    /// Vaccine name (e.g. "Rabies", "DHPP")
    pub vaccine: String,
    pub administered_on: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
}

/// A medication record. Due-date semantics: the next refill is derived
/// from `start_date` and `refill_every_days`; a course whose `end_date`
/// precedes the derived refill is finished and never alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationRecord {
    pub record_id: String,
    pub entity_id: String,
    pub name: String,
    /// Free-form dose as entered (e.g. "75 mg twice daily")
    pub dose: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Refill interval in calendar days, if the medication refills.
    pub refill_every_days: Option<i64>,
}

/// A vet visit. A completed, non-alerting event unless `follow_up_date`
/// is set, in which case the follow-up is medically urgent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
    pub record_id: String,
    pub entity_id: String,
    pub reason: String,
    pub visit_date: NaiveDate,
    pub follow_up_date: Option<NaiveDate>,
}

/// A weight reading. Never alert-worthy by itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightRecord {
    pub record_id: String,
    pub entity_id: String,
    pub value: f64,
    pub unit: WeightUnit,
    pub recorded_on: NaiveDate,
}

/// One entry in the normalized timeline produced by the aggregator.
///
/// Every item carries a resolved due date (or none, for completed
/// events) regardless of which category-specific field it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItem {
    pub record_id: String,
    pub entity_id: String,
    pub category: RecordCategory,
    pub label: String,
    /// Resolved due date; `None` means the item never alerts.
    pub due_date: Option<NaiveDate>,
    /// When the underlying event happened, if it already did.
    pub occurred_on: Option<NaiveDate>,
    /// Medically urgent by policy (e.g. vet-ordered follow-ups):
    /// classified High regardless of how far out the due date is.
    pub urgent: bool,
    pub action_label: String,
    pub action_target: String,
}

/// Emergency contact details disclosed under the `emergency` field-group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
    pub vet_name: Option<String>,
    pub vet_phone: Option<String>,
}

/// Metadata for an uploaded document (the file bytes live elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: String,
    pub title: String,
    pub uploaded_on: Option<NaiveDate>,
}

/// The non-temporal profile of an animal: identification, physical
/// traits, emergency contact, allergies, notes, and document metadata.
/// Source for the disclosure field-groups that are not timeline-derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityProfile {
    pub entity_id: String,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub sex: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub microchip: Option<String>,
    pub color: Option<String>,
    pub markings: Option<String>,
    /// Vet-assessed body condition score (1..=9), when recorded.
    pub body_condition_score: Option<i32>,
    pub emergency_contact: EmergencyContact,
    pub allergies: Vec<String>,
    pub notes: Option<String>,
    pub documents: Vec<DocumentRef>,
}
