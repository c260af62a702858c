//! Configuration loaded from environment variables

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::aircraft::DEFAULT_THRESHOLD_SECS;
use crate::alerts::Watchlist;

/// Built-in identifiers of interest, used when `WATCHLIST_ICAO` is unset
const DEFAULT_ICAO_WATCHLIST: &[(&str, &str)] = &[
    ("3EA12C", "Luftwaffe A350-900 VIP 10+01 Konrad Adenauer"),
    ("3F5D91", "Luftwaffe A350-900 VIP 10+02 Theodor Heuss"),
    ("3E854F", "Luftwaffe A350-900 VIP 10+03 Kurt Schumacher"),
];

const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api/chat.postMessage";

/// Longest accepted refresh interval, one week
const MAX_REFRESH_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration errors, all fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Environment variable {name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("URL {0} is invalid")]
    InvalidUrl(String),

    #[error("Invalid watchlist entry {entry:?} in {name}: {reason}")]
    Watchlist {
        name: &'static str,
        entry: String,
        reason: String,
    },
}

/// Retry policy for transport-level failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Backoff factor in seconds
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Budget used for the secondary feed, which is only side information
    pub const SECONDARY: RetryPolicy = RetryPolicy {
        retries: 2,
        backoff_factor: 0.1,
    };
}

/// Notification credentials
#[derive(Clone)]
pub struct SlackCredentials {
    pub token: String,
    pub channel: String,
    pub api_url: Url,
}

impl std::fmt::Debug for SlackCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackCredentials")
            .field("channel", &self.channel)
            .field("api_url", &self.api_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telemetry base URL (dump1090 / PiAware web interface)
    pub piaware_host: Url,

    /// Secondary feed host (Flightradar24 feeder)
    pub flightradar_host: Url,

    /// Include the secondary feed status in the status line
    pub enable_fr24: bool,

    /// Retry policy for telemetry requests
    pub retry: RetryPolicy,

    /// Append a cache-busting timestamp to telemetry requests
    pub cache_bust: bool,

    /// Log level / filter directive
    pub log_level: String,

    /// Notification credentials, `None` disables notifications
    pub slack: Option<SlackCredentials>,

    /// Time between scheduled refresh cycles
    pub refresh_interval: Duration,

    /// Maximum report age for an aircraft to count as in range
    pub aircraft_threshold_secs: f64,

    /// Identifier and callsign watchlists
    pub watchlist: Watchlist,

    /// File the text display writes each frame to
    pub display_snapshot: Option<PathBuf>,

    /// Read button presses from stdin instead of GPIO
    pub buttons_from_stdin: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let piaware_host = lookup("PIAWARE_HOST").ok_or(ConfigError::Missing("PIAWARE_HOST"))?;
        let piaware_host = parse_url(&piaware_host)?;

        let flightradar_host = parse_url(
            &lookup("FLIGHTRADAR_HOST").unwrap_or_else(|| "http://127.0.0.1:8754".to_string()),
        )?;

        let retry = RetryPolicy {
            retries: parse_or(&lookup, "PIAWARE_RETRIES", 10)?,
            backoff_factor: parse_or(&lookup, "PIAWARE_BACKOFF", 1.0)?,
        };
        if !retry.backoff_factor.is_finite() || retry.backoff_factor < 0.0 {
            return Err(ConfigError::Invalid {
                name: "PIAWARE_BACKOFF",
                value: retry.backoff_factor.to_string(),
            });
        }

        let slack = match (lookup("SLACK_BOT_TOKEN"), lookup("SLACK_CHANNEL")) {
            (Some(token), Some(channel)) => Some(SlackCredentials {
                token,
                channel,
                api_url: parse_url(
                    &lookup("SLACK_API_URL").unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string()),
                )?,
            }),
            _ => None,
        };

        let icao = match lookup("WATCHLIST_ICAO") {
            Some(raw) => parse_table("WATCHLIST_ICAO", &raw)?,
            None => DEFAULT_ICAO_WATCHLIST
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        for hex_id in icao.keys() {
            validate_icao(hex_id)?;
        }
        let callsigns = match lookup("WATCHLIST_CALLSIGN") {
            Some(raw) => parse_table("WATCHLIST_CALLSIGN", &raw)?,
            None => BTreeMap::new(),
        };

        let aircraft_threshold_secs: f64 = parse_or(&lookup, "AIRCRAFT_THRESHOLD_SECS", DEFAULT_THRESHOLD_SECS)?;
        if !aircraft_threshold_secs.is_finite() || aircraft_threshold_secs < 0.0 {
            return Err(ConfigError::Invalid {
                name: "AIRCRAFT_THRESHOLD_SECS",
                value: aircraft_threshold_secs.to_string(),
            });
        }

        let refresh_secs: u64 = parse_or(&lookup, "REFRESH_INTERVAL_SECS", 300)?;
        if refresh_secs > MAX_REFRESH_INTERVAL_SECS {
            return Err(ConfigError::Invalid {
                name: "REFRESH_INTERVAL_SECS",
                value: refresh_secs.to_string(),
            });
        }

        Ok(Self {
            piaware_host,
            flightradar_host,
            enable_fr24: bool_from(&lookup, "ENABLE_FR24", false),
            retry,
            cache_bust: bool_from(&lookup, "PIAWARE_CACHE_BUST", true),
            log_level: lookup("LOGLEVEL").unwrap_or_else(|| "INFO".to_string()),
            slack,
            refresh_interval: Duration::from_secs(refresh_secs),
            aircraft_threshold_secs,
            watchlist: Watchlist::new(icao, callsigns),
            display_snapshot: lookup("DISPLAY_SNAPSHOT").map(PathBuf::from),
            buttons_from_stdin: bool_from(&lookup, "BUTTONS_FROM_STDIN", false),
        })
    }
}

/// Parse a URL, requiring both a scheme and a host
pub fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    if url.scheme().is_empty() || url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

/// `true`, `1` and `t` (any case) are true, anything else is false
fn bool_from<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "t"),
        None => default,
    }
}

/// Parse `KEY=description;KEY=description` into a table with upper-case keys
fn parse_table(name: &'static str, raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut table = BTreeMap::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, description) = entry.split_once('=').ok_or_else(|| ConfigError::Watchlist {
            name,
            entry: entry.to_string(),
            reason: "expected KEY=description".to_string(),
        })?;
        let key = key.trim().to_uppercase();
        if key.is_empty() {
            return Err(ConfigError::Watchlist {
                name,
                entry: entry.to_string(),
                reason: "empty key".to_string(),
            });
        }
        table.insert(key, description.trim().to_string());
    }
    Ok(table)
}

/// ICAO addresses are 24 bits, written as six hex digits
fn validate_icao(hex_id: &str) -> Result<(), ConfigError> {
    match hex::decode(hex_id) {
        Ok(bytes) if bytes.len() == 3 => Ok(()),
        _ => Err(ConfigError::Watchlist {
            name: "WATCHLIST_ICAO",
            entry: hex_id.to_string(),
            reason: "not a 24-bit hex address".to_string(),
        }),
    }
}
