//! Receiver health derived from `status.json`

use chrono::{Local, TimeZone};
use serde_json::Value;

use crate::aircraft::AircraftCounts;
use crate::geo::decimal_label;

pub const STATUS_OK: &str = "OK";
pub const STATUS_NEEDS_ATTENTION: &str = "NEEDS ATTENTION";

const FAILED_UPTIME: &str = "Failed API Call";
const FAILED_TIME: &str = "!!! Failed to get System Time";
const FAILED_GPS: &str = "!!! Failed to get GPS Status";
const FAILED_RADIO: &str = "!!! Failed to get Radio Status";
const FAILED_PIAWARE: &str = "!!! Failed to get PiAware Status";
const FALLBACK_CPU_TEMP: &str = "-273.15";

/// Per-cycle receiver health
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub uptime: String,
    pub time: String,
    pub gps: String,
    pub radio: String,
    pub piaware: String,
    pub cpu_temp: String,
    pub cpu_load: String,
    /// Set when any mandatory field was missing
    pub error: bool,
}

impl StatusSnapshot {
    /// Derive the snapshot, substituting fallbacks for missing fields
    ///
    /// Uptime, time and the three health messages are mandatory. CPU
    /// temperature and load have fallbacks that do not count as errors.
    pub fn from_status(status: &Value) -> Self {
        let mut error = false;
        let mut mandatory = |value: Option<String>, fallback: &str| {
            value.unwrap_or_else(|| {
                error = true;
                fallback.to_string()
            })
        };

        let uptime = mandatory(
            status
                .get("system_uptime")
                .and_then(Value::as_f64)
                .map(|secs| format_uptime(secs.max(0.0) as u64)),
            FAILED_UPTIME,
        );
        let time = mandatory(
            status
                .get("time")
                .and_then(Value::as_f64)
                .and_then(|ms| format_report_time(ms as i64)),
            FAILED_TIME,
        );
        let gps = mandatory(message(status, "gps"), FAILED_GPS);
        let radio = mandatory(message(status, "radio"), FAILED_RADIO);
        let piaware = mandatory(message(status, "piaware"), FAILED_PIAWARE);

        let cpu_temp = status
            .get("cpu_temp_celcius")
            .and_then(Value::as_f64)
            .map(|t| decimal_label((t * 100.0).round() / 100.0))
            .unwrap_or_else(|| FALLBACK_CPU_TEMP.to_string());

        let cpu_load = match status.get("cpu_load_percent") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => (cpu_cores() * 100).to_string(),
        };

        Self {
            uptime,
            time,
            gps,
            radio,
            piaware,
            cpu_temp,
            cpu_load,
            error,
        }
    }

    /// Status line before the emergency scan is applied
    pub fn base_slug(&self, fr24: Option<&str>) -> String {
        if self.error {
            return STATUS_NEEDS_ATTENTION.to_string();
        }
        match fr24 {
            Some(fr24) => format!("{}, fr24: {}", STATUS_OK, fr24),
            None => STATUS_OK.to_string(),
        }
    }
}

fn message(status: &Value, section: &str) -> Option<String> {
    status
        .get(section)?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

fn cpu_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Format seconds as `[N day(s), ]H:MM:SS`
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let clock = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Render epoch milliseconds in local time
pub fn format_report_time(epoch_ms: i64) -> Option<String> {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|t| t.format("%d.%m.%Y, %H:%M:%S").to_string())
}

/// Local outbound IPv4 address
///
/// Connecting a UDP socket selects the outbound interface without sending
/// anything.
pub fn local_ip() -> String {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("192.168.255.255:1")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Flat set of display lines handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status_slug: String,
    pub time: String,
    pub piaware: String,
    pub gps: String,
    pub radio: String,
    pub counts: AircraftCounts,
    pub min_range_km: Option<f64>,
    pub max_range_km: Option<f64>,
    pub uptime: String,
    pub cpu_load: String,
    pub cpu_temp: String,
    pub cycle: u64,
    pub local_ip: String,
}
