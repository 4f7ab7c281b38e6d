//! Harvest module - gathers survey logs from a source tree.
//!
//! - **Collector**: [`Harvester`] walks a tree and copies matching files into
//!   a flat staging directory
//! - **Stats**: per-harvest counters via [`HarvestStats`]

pub mod collector;

// Re-export commonly used types
pub use collector::{matches_extension, HarvestError, HarvestStats, Harvester};
