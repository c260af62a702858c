//! Fixed lookup tables: emergency squawks and watchlists

use std::collections::BTreeMap;

/// Transponder codes reserved for emergencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyCode {
    Hijack,
    RadioFailure,
    General,
}

impl EmergencyCode {
    pub const ALL: [EmergencyCode; 3] = [
        EmergencyCode::Hijack,
        EmergencyCode::RadioFailure,
        EmergencyCode::General,
    ];

    pub fn squawk(self) -> &'static str {
        match self {
            EmergencyCode::Hijack => "7500",
            EmergencyCode::RadioFailure => "7600",
            EmergencyCode::General => "7700",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EmergencyCode::Hijack => "Unlawful interference (hijacking)",
            EmergencyCode::RadioFailure => "Aircraft has lost verbal communication",
            EmergencyCode::General => "General emergency",
        }
    }

    /// Look up a squawk, ignoring case and surrounding whitespace
    pub fn from_squawk(squawk: &str) -> Option<Self> {
        let squawk = squawk.trim();
        Self::ALL
            .into_iter()
            .find(|code| code.squawk().eq_ignore_ascii_case(squawk))
    }
}

/// Identifiers and callsigns that trigger a notification when seen
///
/// Keys are stored upper case; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Watchlist {
    icao: BTreeMap<String, String>,
    callsigns: BTreeMap<String, String>,
}

impl Watchlist {
    pub fn new(icao: BTreeMap<String, String>, callsigns: BTreeMap<String, String>) -> Self {
        let upper = |table: BTreeMap<String, String>| {
            table
                .into_iter()
                .map(|(k, v)| (k.trim().to_uppercase(), v))
                .collect()
        };
        Self {
            icao: upper(icao),
            callsigns: upper(callsigns),
        }
    }

    pub fn icao_description(&self, hex: &str) -> Option<&str> {
        self.icao
            .get(&hex.trim().to_uppercase())
            .map(String::as_str)
    }

    pub fn callsign_description(&self, callsign: &str) -> Option<&str> {
        self.callsigns
            .get(&callsign.trim().to_uppercase())
            .map(String::as_str)
    }

    pub fn icao_len(&self) -> usize {
        self.icao.len()
    }

    pub fn callsign_len(&self) -> usize {
        self.callsigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icao.is_empty() && self.callsigns.is_empty()
    }
}
