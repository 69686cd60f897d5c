//! Aggregation engine: folds classified incidents into persistent scam
//! patterns, plus the read-side insight shaping the dashboard consumes.

pub mod aggregator;
pub mod insights;
pub mod scoring;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use aggregator::{Aggregator, RunSummary};
pub use traits::{IncidentStore, PatternStore};
