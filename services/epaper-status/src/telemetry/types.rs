//! Telemetry payload types

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::geo::Position;

/// One entry of `aircraft.json`
///
/// Only the fields the monitor consumes are kept; the feed carries many more.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AircraftRecord {
    /// ICAO 24-bit address as hex, `~` prefixed for non-ICAO (TIS-B) targets
    #[serde(default)]
    pub hex: String,

    /// Callsign, usually space padded to 8 characters
    pub flight: Option<String>,

    /// Transponder code as four octal digits
    pub squawk: Option<String>,

    pub lat: Option<f64>,
    pub lon: Option<f64>,

    /// Seconds since the last position update
    pub seen_pos: Option<f64>,

    /// Seconds since any message
    pub seen: Option<f64>,

    /// Fields derived from multilateration
    #[serde(default)]
    pub mlat: Vec<String>,
}

impl AircraftRecord {
    /// Reported position, if both coordinates are present
    pub fn position(&self) -> Option<Position> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
            _ => None,
        }
    }

    /// Trimmed callsign, `None` when absent or blank
    pub fn callsign(&self) -> Option<&str> {
        self.flight
            .as_deref()
            .map(str::trim)
            .filter(|cs| !cs.is_empty())
    }

    /// Trimmed squawk, `None` when absent or blank
    pub fn squawk(&self) -> Option<&str> {
        self.squawk
            .as_deref()
            .map(str::trim)
            .filter(|sq| !sq.is_empty())
    }

    /// Whether the position was derived by multilateration
    pub fn has_mlat_position(&self) -> bool {
        self.mlat.iter().any(|field| field == "lat")
    }
}

/// Extract the aircraft list from an `aircraft.json` document
///
/// Returns `None` when the document has no `aircraft` array, which means the
/// feed itself is unavailable. Entries that fail to parse are skipped.
pub fn parse_aircraft(document: &Value) -> Option<Vec<AircraftRecord>> {
    let entries = document.get("aircraft")?.as_array()?;

    let mut aircraft = Vec::with_capacity(entries.len());
    for entry in entries {
        match AircraftRecord::deserialize(entry) {
            Ok(record) => aircraft.push(record),
            Err(e) => warn!("Skipping malformed aircraft entry: {}", e),
        }
    }

    debug!("Parsed {} of {} aircraft entries", aircraft.len(), entries.len());
    Some(aircraft)
}

/// Receiver location from a `receiver.json` document
pub fn receiver_position(document: &Value) -> Option<Position> {
    match Position::deserialize(document) {
        Ok(position) => Some(position),
        Err(e) => {
            debug!("Receiver document has no usable location: {}", e);
            None
        }
    }
}

/// Human readable feeder state from a Flightradar24 `monitor.json` document
pub fn fr24_status(document: &Value) -> String {
    match document.get("feed_status").and_then(Value::as_str) {
        Some("connected") => {
            let mode = document
                .get("feed_current_mode")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            format!("Connected via {}", mode)
        }
        Some(status) => ucfirst(status),
        None => "unknown".to_string(),
    }
}

fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
