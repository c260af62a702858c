//! Telemetry client with bounded retry on connection failures

use std::time::Duration;

use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::error::FetchError;
use super::transport::HttpTransport;
use super::types::{fr24_status, parse_aircraft, receiver_position, AircraftRecord};
use crate::config::{ConfigError, RetryPolicy};
use crate::geo::Position;

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Telemetry resources the monitor polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Status,
    Receiver,
    Aircraft,
    /// Flightradar24 feeder monitor, served by a different host
    Monitor,
}

impl Resource {
    fn path(self) -> &'static str {
        match self {
            Resource::Status => "status.json",
            Resource::Receiver => "skyaware/data/receiver.json",
            Resource::Aircraft => "skyaware/data/aircraft.json",
            Resource::Monitor => "monitor.json",
        }
    }

    fn index(self) -> usize {
        match self {
            Resource::Status => 0,
            Resource::Receiver => 1,
            Resource::Aircraft => 2,
            Resource::Monitor => 3,
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Resource::Status => "status",
            Resource::Receiver => "receiver",
            Resource::Aircraft => "aircraft",
            Resource::Monitor => "monitor",
        };
        f.write_str(name)
    }
}

/// Sleep before retry number `retry` (1-based): `factor * 2^(retry - 1)` seconds
pub fn backoff_delay(factor: f64, retry: u32) -> Duration {
    if retry == 0 || factor <= 0.0 {
        return Duration::ZERO;
    }
    let secs = factor * 2f64.powi(retry.saturating_sub(1).min(16) as i32);
    Duration::from_secs_f64(secs.min(MAX_BACKOFF.as_secs_f64()))
}

/// Client for the receiver's JSON interface
pub struct TelemetryClient<T> {
    transport: T,
    endpoints: [Url; 4],
    retry: RetryPolicy,
    cache_bust: bool,
}

impl<T: HttpTransport> TelemetryClient<T> {
    /// Build a client, validating every endpoint URL up front
    pub fn new(
        transport: T,
        piaware_host: &Url,
        flightradar_host: &Url,
        retry: RetryPolicy,
        cache_bust: bool,
    ) -> Result<Self, ConfigError> {
        let endpoint = |host: &Url, resource: Resource| -> Result<Url, ConfigError> {
            let raw = format!("{}/{}", host.as_str().trim_end_matches('/'), resource.path());
            crate::config::parse_url(&raw)
        };

        let endpoints = [
            endpoint(piaware_host, Resource::Status)?,
            endpoint(piaware_host, Resource::Receiver)?,
            endpoint(piaware_host, Resource::Aircraft)?,
            endpoint(flightradar_host, Resource::Monitor)?,
        ];

        Ok(Self {
            transport,
            endpoints,
            retry,
            cache_bust,
        })
    }

    /// Endpoint URL of a resource, without the cache-busting parameter
    pub fn endpoint(&self, resource: Resource) -> &Url {
        &self.endpoints[resource.index()]
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    fn retry_policy(&self, resource: Resource) -> RetryPolicy {
        match resource {
            Resource::Monitor => RetryPolicy::SECONDARY,
            _ => self.retry,
        }
    }

    fn request_url(&self, resource: Resource) -> Url {
        let mut url = self.endpoint(resource).clone();
        if self.cache_bust {
            let ts = chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0;
            url.query_pairs_mut().append_pair("ts", &format!("{:.6}", ts));
        }
        url
    }

    /// Fetch and parse a resource
    ///
    /// Connection failures are retried up to the policy's retry count with
    /// exponential backoff. A non-2xx status or an unparsable body fails
    /// immediately.
    pub async fn fetch(&self, resource: Resource) -> Result<Value, FetchError> {
        let policy = self.retry_policy(resource);
        let url = self.request_url(resource);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.transport.get(&url).await {
                Ok(response) if response.is_success() => {
                    debug!(%resource, attempt, bytes = response.body.len(), "Fetched telemetry");
                    return serde_json::from_slice(&response.body).map_err(|e| {
                        FetchError::Malformed {
                            url: url.to_string(),
                            reason: e.to_string(),
                        }
                    });
                }
                Ok(response) => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: response.status,
                    });
                }
                Err(e) if attempt <= policy.retries => {
                    let delay = backoff_delay(policy.backoff_factor, attempt);
                    warn!(
                        %resource,
                        attempt,
                        retries = policy.retries,
                        "Connection to {} failed: {}. Retrying in {:.1}s",
                        url,
                        e,
                        delay.as_secs_f64()
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    return Err(FetchError::Transport {
                        url: url.to_string(),
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Fetch a resource, degrading any failure to an empty JSON object
    pub async fn fetch_or_empty(&self, resource: Resource) -> Value {
        match self.fetch(resource).await {
            Ok(value) => value,
            Err(e) => {
                error!(%resource, "{}", e);
                Value::Object(Map::new())
            }
        }
    }

    /// Current aircraft list, `None` when the feed is unavailable
    pub async fn fetch_aircraft(&self) -> Option<Vec<AircraftRecord>> {
        let document = self.fetch_or_empty(Resource::Aircraft).await;
        let aircraft = parse_aircraft(&document);
        if aircraft.is_none() {
            error!("Aircraft feed unavailable at {}", self.endpoint(Resource::Aircraft));
        }
        aircraft
    }

    /// Receiver location, falling back to (0, 0) when it is not reported
    pub async fn fetch_receiver_position(&self) -> Position {
        let document = self.fetch_or_empty(Resource::Receiver).await;
        match receiver_position(&document) {
            Some(origin) => {
                debug!("Own {}", origin);
                origin
            }
            None => {
                let origin = Position::origin();
                error!("Could not get own Location. Own {}", origin);
                origin
            }
        }
    }

    /// Flightradar24 feeder status text
    pub async fn fetch_fr24_status(&self) -> String {
        let document = self.fetch_or_empty(Resource::Monitor).await;
        let status = fr24_status(&document);
        info!("Flightradar24 Status: {}", status);
        status
    }
}
