//! # Pawvault
//!
//! Health Disclosure & Alert Engine for pet health records.
//!
//! This crate provides:
//! - Severity-ranked health alerts derived from an animal's vaccination,
//!   medication, visit, and weight history
//! - Scoped, time-limited disclosure tokens that expose a restricted
//!   subset of an animal's record to an unauthenticated viewer
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types and pure health rules
//! - `ports`: Trait definitions for the record store and token store
//! - `adapters`: Concrete implementations (SQLite)
//! - `application`: Use cases orchestrating domain and ports
//! - `server`: HTTP surface (owner API and public token resolver)

pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;
pub mod server;

pub use domain::{AlertItem, DisclosedView, Severity, SharePermissions, ShareToken};

/// Result type for Pawvault operations.
pub type Result<T> = std::result::Result<T, PawvaultError>;

/// Main error type for Pawvault.
#[derive(Debug, thiserror::Error)]
pub enum PawvaultError {
    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Health rule violated: {0}")]
    Rule(#[from] domain::RuleError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Aggregation failed: source '{source_name}' errored: {detail}")]
    Aggregation {
        source_name: &'static str,
        detail: String,
    },

    #[error("Not found")]
    NotFound,

    #[error("Token conflict persisted after {0} attempts")]
    Conflict(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
