//! Telemetry error types

use thiserror::Error;

/// Failure fetching a telemetry resource
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, reset or timed out on every attempt
    #[error("Error GETing {url} after {attempts} attempt(s): {reason}")]
    Transport {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// Non-2xx response, never retried
    #[error("Error GETing {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    /// Body was not the JSON we expected
    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}
