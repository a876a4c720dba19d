//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement the
//! engine's use cases: timeline aggregation, alert prioritization, and
//! the disclosure token lifecycle.

mod alerts;
mod shares;
mod timeline;

pub use alerts::{prioritize, AlertService};
pub use shares::ShareService;
pub use timeline::{Timeline, TimelineService};
