//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the engine and its collaborators (the record store owning
//! the animal's records, and the persistence behind disclosure tokens).

mod records;
mod shares;

pub use records::RecordStore;
pub use shares::{ShareStore, ShareTokenPatch};
