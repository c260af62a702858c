//! Aircraft list filtering and counters

mod filter;

pub use filter::{range_extent, AircraftCounts, AircraftFilter, DEFAULT_THRESHOLD_SECS};
