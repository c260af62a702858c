//! Alert classification: emergency squawks and aircraft of special interest

mod classifier;
mod tables;

pub use classifier::{Alert, AlertClassifier, AlertKind};
pub use tables::{EmergencyCode, Watchlist};
