//! Adapters layer: Concrete implementations of the ports.

pub mod sqlite;

pub use sqlite::{SqliteStorage, StorageError};
