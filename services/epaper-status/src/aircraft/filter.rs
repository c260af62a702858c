//! Aircraft selection by report age and position source
//!
//! The counters on the display and the alert scans all work on subsets of the
//! same `aircraft.json` list; this module defines those subsets.

use std::str::FromStr;

use thiserror::Error;
use tracing::info;

use crate::geo::Position;
use crate::telemetry::AircraftRecord;

/// Default age threshold for an aircraft to count as currently seen
pub const DEFAULT_THRESHOLD_SECS: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Value {0:?} unsupported. Supported: [\"adsb\", \"mlat\"]")]
    UnsupportedMode(String),
}

/// Position source an aircraft is selected by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Age of ADS-B reports
    Adsb,
    /// Presence of a multilateration position
    Mlat,
}

impl FromStr for FilterMode {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adsb" => Ok(FilterMode::Adsb),
            "mlat" => Ok(FilterMode::Mlat),
            other => Err(FilterError::UnsupportedMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterMode::Adsb => f.write_str("adsb"),
            FilterMode::Mlat => f.write_str("mlat"),
        }
    }
}

/// Aircraft selection criteria
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AircraftFilter {
    /// Judge ADS-B age by the last position (`seen_pos`) rather than any message (`seen`)
    pub position_only: bool,
    pub mode: FilterMode,
    /// Inclusive age limit in seconds
    pub threshold_secs: f64,
    /// Skip filtering and hand back the full list
    pub raw: bool,
}

impl AircraftFilter {
    /// ADS-B aircraft seen at all within the threshold
    pub fn all(threshold_secs: f64) -> Self {
        Self {
            position_only: false,
            mode: FilterMode::Adsb,
            threshold_secs,
            raw: false,
        }
    }

    /// ADS-B aircraft with a position report within the threshold
    pub fn with_position(threshold_secs: f64) -> Self {
        Self {
            position_only: true,
            ..Self::all(threshold_secs)
        }
    }

    /// Aircraft positioned by multilateration
    pub fn mlat(threshold_secs: f64) -> Self {
        Self {
            mode: FilterMode::Mlat,
            ..Self::with_position(threshold_secs)
        }
    }

    /// Whether a single aircraft passes the filter
    ///
    /// An aircraft lacking the age field the filter looks at never passes.
    pub fn matches(&self, aircraft: &AircraftRecord) -> bool {
        if self.raw {
            return true;
        }
        match self.mode {
            FilterMode::Adsb => {
                let age = if self.position_only {
                    aircraft.seen_pos
                } else {
                    aircraft.seen
                };
                age.map_or(false, |age| age <= self.threshold_secs)
            }
            FilterMode::Mlat => aircraft.has_mlat_position(),
        }
    }

    /// Select the matching aircraft
    pub fn apply<'a>(&self, aircraft: &'a [AircraftRecord]) -> Vec<&'a AircraftRecord> {
        aircraft.iter().filter(|a| self.matches(a)).collect()
    }

    /// Count the matching aircraft
    pub fn count(&self, aircraft: &[AircraftRecord]) -> usize {
        let count = aircraft.iter().filter(|a| self.matches(a)).count();
        info!(
            "Found {} total Flights (Position: {}, Mode: {}, Threshold: {}s)",
            count, self.position_only, self.mode, self.threshold_secs
        );
        count
    }
}

/// Nearest and farthest in-range aircraft, in meters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeExtent {
    pub min_m: f64,
    pub max_m: f64,
}

/// Distance extent of the aircraft with a recent position
///
/// Returns `None` when no aircraft qualifies.
pub fn range_extent(
    aircraft: &[AircraftRecord],
    origin: &Position,
    threshold_secs: f64,
) -> Option<RangeExtent> {
    let filter = AircraftFilter::with_position(threshold_secs);

    aircraft
        .iter()
        .filter(|a| filter.matches(a))
        .filter_map(AircraftRecord::position)
        .map(|pos| origin.distance_to(&pos))
        .fold(None, |extent: Option<RangeExtent>, d| {
            Some(match extent {
                Some(e) => RangeExtent {
                    min_m: e.min_m.min(d),
                    max_m: e.max_m.max(d),
                },
                None => RangeExtent { min_m: d, max_m: d },
            })
        })
}

/// Aircraft counters shown on the display
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AircraftCounts {
    pub all: usize,
    pub with_position: usize,
    pub mlat: usize,
}

impl AircraftCounts {
    pub fn from_aircraft(aircraft: &[AircraftRecord], threshold_secs: f64) -> Self {
        Self {
            all: AircraftFilter::all(threshold_secs).count(aircraft),
            with_position: AircraftFilter::with_position(threshold_secs).count(aircraft),
            mlat: AircraftFilter::mlat(threshold_secs).count(aircraft),
        }
    }
}

impl std::fmt::Display for AircraftCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Aircraft: {} total, {} with position, {} MLAT",
            self.all, self.with_position, self.mlat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aircraft(hex: &str, seen: Option<f64>, seen_pos: Option<f64>) -> AircraftRecord {
        AircraftRecord {
            hex: hex.to_string(),
            seen,
            seen_pos,
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_parsing_fails_fast() {
        assert_eq!("adsb".parse::<FilterMode>(), Ok(FilterMode::Adsb));
        assert_eq!("mlat".parse::<FilterMode>(), Ok(FilterMode::Mlat));
        assert_eq!(
            "mode-s".parse::<FilterMode>(),
            Err(FilterError::UnsupportedMode("mode-s".to_string()))
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let list = vec![
            aircraft("a", Some(120.0), Some(120.0)),
            aircraft("b", Some(120.5), Some(120.5)),
        ];
        let selected = AircraftFilter::with_position(120.0).apply(&list);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].hex, "a");
    }

    #[test]
    fn test_missing_age_field_is_excluded() {
        let list = vec![
            aircraft("no-pos", Some(1.0), None),
            aircraft("no-seen", None, Some(1.0)),
        ];
        let with_pos = AircraftFilter::with_position(f64::MAX).apply(&list);
        assert_eq!(with_pos.len(), 1);
        assert_eq!(with_pos[0].hex, "no-seen");

        let all = AircraftFilter::all(f64::MAX).apply(&list);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].hex, "no-pos");
    }

    #[test]
    fn test_mlat_mode() {
        let mut mlat = aircraft("m", Some(1.0), Some(1.0));
        mlat.mlat = vec!["lat".to_string(), "lon".to_string()];
        let mut partial = aircraft("p", Some(1.0), Some(1.0));
        partial.mlat = vec!["track".to_string()];
        let list = vec![mlat, partial, aircraft("x", Some(1.0), Some(1.0))];

        assert_eq!(AircraftFilter::mlat(120.0).count(&list), 1);
    }

    #[test]
    fn test_raw_passthrough() {
        let list = vec![aircraft("a", None, None), aircraft("b", Some(999.0), None)];
        let raw = AircraftFilter {
            raw: true,
            ..AircraftFilter::all(DEFAULT_THRESHOLD_SECS)
        };
        assert_eq!(raw.apply(&list).len(), 2);
    }

    #[test]
    fn test_counts() {
        let mut mlat = aircraft("m", Some(3.0), Some(3.0));
        mlat.mlat = vec!["lat".to_string()];
        let list = vec![
            aircraft("a", Some(1.0), Some(1.0)),
            aircraft("b", Some(5.0), None),
            aircraft("c", Some(500.0), Some(500.0)),
            mlat,
        ];
        let counts = AircraftCounts::from_aircraft(&list, DEFAULT_THRESHOLD_SECS);
        assert_eq!(
            counts,
            AircraftCounts {
                all: 3,
                with_position: 2,
                mlat: 1
            }
        );
    }

    #[test]
    fn test_range_extent() {
        let origin = Position::new(51.0, 7.0);
        let mut near = aircraft("near", Some(1.0), Some(1.0));
        near.lat = Some(51.1);
        near.lon = Some(7.0);
        let mut far = aircraft("far", Some(1.0), Some(1.0));
        far.lat = Some(52.0);
        far.lon = Some(7.0);
        let mut stale = aircraft("stale", Some(1.0), Some(600.0));
        stale.lat = Some(55.0);
        stale.lon = Some(7.0);
        let no_position = aircraft("nopos", Some(1.0), Some(1.0));

        let extent = range_extent(&[near, far, stale, no_position], &origin, 120.0).unwrap();
        assert!((extent.min_m - 11_119.5).abs() < 10.0);
        assert!((extent.max_m - 111_195.0).abs() < 100.0);
    }

    #[test]
    fn test_range_extent_empty() {
        assert_eq!(range_extent(&[], &Position::origin(), 120.0), None);
    }
}
