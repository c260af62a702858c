//! Telemetry client for the PiAware / dump1090 JSON interface
//!
//! Fetches `status.json`, `receiver.json`, `aircraft.json` and the optional
//! Flightradar24 `monitor.json`. Connection failures are retried with
//! backoff, HTTP errors are not.

mod client;
mod error;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{Resource, TelemetryClient};
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::AircraftRecord;
