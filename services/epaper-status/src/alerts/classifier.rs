//! Emergency squawk and watchlist detection
//!
//! Both scans run once per refresh cycle over the aircraft with a recent
//! position. There is no suppression across cycles: an aircraft that keeps
//! squawking 7700 is reported on every cycle it is seen.

use std::sync::Arc;

use crate::geo::{decimal_label, to_kilometers, Position};
use crate::telemetry::AircraftRecord;

use super::tables::{EmergencyCode, Watchlist};

/// Emergency count reported when the aircraft feed itself is unavailable
pub const TELEMETRY_LOSS: u32 = 666;

const UNKNOWN: &str = "unknown";

/// What triggered an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Emergency squawk
    Emergency,
    /// Callsign on the watchlist
    Registration,
    /// ICAO address on the watchlist
    Icao,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Emergency => f.write_str("emergency"),
            AlertKind::Registration => f.write_str("registration"),
            AlertKind::Icao => f.write_str("icao"),
        }
    }
}

/// A notification request
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub hex: String,
    pub callsign: String,
    pub squawk: String,
    /// Distance from the receiver in km, two decimals
    pub distance_km: Option<f64>,
}

impl Alert {
    /// Distance as shown in notifications: a number or `unknown`
    pub fn distance_label(&self) -> String {
        match self.distance_km {
            Some(km) => decimal_label(km),
            None => UNKNOWN.to_string(),
        }
    }
}

/// Result of the emergency scan
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyScan {
    pub count: u32,
    pub alerts: Vec<Alert>,
}

impl EmergencyScan {
    pub fn telemetry_loss() -> Self {
        Self {
            count: TELEMETRY_LOSS,
            alerts: Vec::new(),
        }
    }

    pub fn is_telemetry_loss(&self) -> bool {
        self.count == TELEMETRY_LOSS && self.alerts.is_empty()
    }

    /// Replace the status line with a banner when anything was found
    pub fn status_slug(&self, current: &str) -> String {
        if self.count >= 1 {
            format!("!!! SQUAWK 7x00 (Count: {}) !!!", self.count)
        } else {
            current.to_string()
        }
    }
}

/// Classifies aircraft against the emergency codes and the watchlists
///
/// Holds the receiver origin and the watchlists, both fixed for the lifetime
/// of the process.
#[derive(Debug, Clone)]
pub struct AlertClassifier {
    origin: Position,
    watchlist: Arc<Watchlist>,
}

impl AlertClassifier {
    pub fn new(origin: Position, watchlist: Arc<Watchlist>) -> Self {
        Self { origin, watchlist }
    }

    fn distance_km(&self, aircraft: &AircraftRecord) -> Option<f64> {
        aircraft
            .position()
            .map(|pos| to_kilometers(self.origin.distance_to(&pos), 2))
    }

    fn alert(&self, kind: AlertKind, hex: String, aircraft: &AircraftRecord) -> Alert {
        Alert {
            kind,
            hex,
            callsign: aircraft.callsign().unwrap_or(UNKNOWN).to_string(),
            squawk: aircraft.squawk().unwrap_or(UNKNOWN).to_string(),
            distance_km: self.distance_km(aircraft),
        }
    }

    /// Count aircraft squawking an emergency code
    ///
    /// `None` means the aircraft feed was unavailable, which is reported as
    /// [`TELEMETRY_LOSS`] rather than as "no emergencies".
    pub fn scan_emergencies(&self, aircraft: Option<&[&AircraftRecord]>) -> EmergencyScan {
        let Some(aircraft) = aircraft else {
            return EmergencyScan::telemetry_loss();
        };

        let alerts: Vec<Alert> = aircraft
            .iter()
            .filter(|a| a.squawk().and_then(EmergencyCode::from_squawk).is_some())
            .map(|a| self.alert(AlertKind::Emergency, a.hex.clone(), a))
            .collect();

        EmergencyScan {
            count: alerts.len() as u32,
            alerts,
        }
    }

    /// Match callsigns and ICAO addresses against the watchlists
    ///
    /// Each table is only consulted when it has entries.
    pub fn scan_watchlist(&self, aircraft: &[&AircraftRecord]) -> Vec<Alert> {
        if self.watchlist.is_empty() {
            return Vec::new();
        }

        let mut alerts = Vec::new();
        for a in aircraft {
            if self.watchlist.callsign_len() > 0 {
                if let Some(callsign) = a.callsign() {
                    if self.watchlist.callsign_description(callsign).is_some() {
                        alerts.push(self.alert(AlertKind::Registration, a.hex.clone(), a));
                    }
                }
            }

            if self.watchlist.icao_len() > 0 {
                let hex = a.hex.trim().to_uppercase();
                if !hex.is_empty() && self.watchlist.icao_description(&hex).is_some() {
                    alerts.push(self.alert(AlertKind::Icao, hex, a));
                }
            }
        }
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn origin() -> Position {
        Position::new(51.2895, 6.7668)
    }

    fn record(hex: &str, flight: &str, squawk: &str, pos: Option<(f64, f64)>) -> AircraftRecord {
        AircraftRecord {
            hex: hex.to_string(),
            flight: Some(flight.to_string()),
            squawk: Some(squawk.to_string()),
            lat: pos.map(|p| p.0),
            lon: pos.map(|p| p.1),
            seen_pos: Some(1.0),
            seen: Some(0.5),
            ..Default::default()
        }
    }

    fn classifier(watchlist: Watchlist) -> AlertClassifier {
        AlertClassifier::new(origin(), Arc::new(watchlist))
    }

    #[test]
    fn test_single_emergency() {
        let a = record("3c6444", "DLH9U   ", "7700", Some((51.5, 7.0)));
        let scan = classifier(Watchlist::default()).scan_emergencies(Some(&[&a]));

        assert_eq!(scan.count, 1);
        assert_eq!(scan.alerts.len(), 1);
        let alert = &scan.alerts[0];
        assert_eq!(alert.kind, AlertKind::Emergency);
        assert_eq!(alert.callsign, "DLH9U");
        assert_eq!(alert.squawk, "7700");
        assert_ne!(alert.distance_label(), "unknown");
        assert!(alert.distance_km.unwrap() > 0.0);
        assert_eq!(scan.status_slug("OK"), "!!! SQUAWK 7x00 (Count: 1) !!!");
    }

    #[test]
    fn test_no_emergency() {
        let a = record("3c6444", "DLH9U", "7000", Some((51.5, 7.0)));
        let scan = classifier(Watchlist::default()).scan_emergencies(Some(&[&a]));
        assert_eq!(scan.count, 0);
        assert!(scan.alerts.is_empty());
        assert_eq!(scan.status_slug("NEEDS ATTENTION"), "NEEDS ATTENTION");
    }

    #[test]
    fn test_emergency_without_position_or_callsign() {
        let mut a = record("abc123", "", "7500", None);
        a.flight = None;
        let scan = classifier(Watchlist::default()).scan_emergencies(Some(&[&a]));
        assert_eq!(scan.count, 1);
        assert_eq!(scan.alerts[0].callsign, "unknown");
        assert_eq!(scan.alerts[0].distance_label(), "unknown");
    }

    #[test]
    fn test_multiple_emergencies() {
        let a = record("a", "A", "7500", None);
        let b = record("b", "B", "7600", None);
        let c = record("c", "C", "1200", None);
        let scan = classifier(Watchlist::default()).scan_emergencies(Some(&[&a, &b, &c]));
        assert_eq!(scan.count, 2);
        assert_eq!(scan.status_slug("OK"), "!!! SQUAWK 7x00 (Count: 2) !!!");
    }

    #[test]
    fn test_telemetry_loss() {
        let scan = classifier(Watchlist::default()).scan_emergencies(None);
        assert_eq!(scan.count, TELEMETRY_LOSS);
        assert!(scan.is_telemetry_loss());
        assert_eq!(scan.status_slug("OK"), "!!! SQUAWK 7x00 (Count: 666) !!!");
    }

    #[test]
    fn test_scan_is_stateless_across_cycles() {
        let a = record("a", "A", "7700", None);
        let c = classifier(Watchlist::default());
        assert_eq!(c.scan_emergencies(Some(&[&a])).alerts.len(), 1);
        assert_eq!(c.scan_emergencies(Some(&[&a])).alerts.len(), 1);
    }

    #[test]
    fn test_watchlist_matches() {
        let watchlist = Watchlist::new(
            BTreeMap::from([("3EA12C".to_string(), "VIP 10+01".to_string())]),
            BTreeMap::from([("QTR85".to_string(), "Qatar DUS".to_string())]),
        );
        let vip = record("3ea12c", "GAF681  ", "1000", Some((51.0, 7.0)));
        let qatar = record("06a1e3", "qtr85", "2000", None);
        let other = record("3c6444", "DLH9U", "1000", None);

        let alerts = classifier(watchlist).scan_watchlist(&[&vip, &qatar, &other]);
        assert_eq!(alerts.len(), 2);

        assert_eq!(alerts[0].kind, AlertKind::Icao);
        assert_eq!(alerts[0].hex, "3EA12C");
        assert_eq!(alerts[0].callsign, "GAF681");
        assert!(alerts[0].distance_km.is_some());

        assert_eq!(alerts[1].kind, AlertKind::Registration);
        assert_eq!(alerts[1].callsign, "qtr85");
        assert_eq!(alerts[1].distance_label(), "unknown");
    }

    #[test]
    fn test_empty_watchlist_is_noop() {
        let a = record("3ea12c", "QTR85", "1000", None);
        assert!(classifier(Watchlist::default()).scan_watchlist(&[&a]).is_empty());
    }
}
