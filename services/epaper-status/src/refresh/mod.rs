//! Refresh cycle controller and status derivation

mod controller;
mod status;

pub use controller::{RefreshController, RefreshTrigger};
pub use status::StatusReport;
