//! Domain layer: Core business types and logic.
//!
//! This module contains pure Rust types with no external dependencies
//! beyond serialization and date handling. All health rules live in
//! `rules` and are side-effect free.

mod alert;
mod record;
pub mod rules;
mod share;

pub use alert::{
    AlertItem, RankedAlerts, Severity, SeverityCounts, DEFAULT_ALERT_CAP, DUE_SOON_DAYS_MAX,
    OVERDUE_DAYS_MAX,
};
pub use record::{
    DocumentRef, EmergencyContact, EntityProfile, MedicationRecord, RecordCategory, TimelineItem,
    VaccinationRecord, VisitRecord, WeightRecord, WeightUnit,
};
pub use rules::RuleError;
pub use share::{
    DisclosedView, IdentificationSection, MedicalSection, PhysicalSection, SharePermissions,
    ShareToken, TimelineSection, SHARE_TTL_DAYS, TOKEN_BYTES, TOKEN_MINT_RETRIES,
};
