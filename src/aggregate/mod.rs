//! Host aggregation: merge, favorites, ordering

mod aggregator;
pub mod merge;

pub use aggregator::{Aggregator, LoadOptions, LoadOutcome, ManualUpdate};
