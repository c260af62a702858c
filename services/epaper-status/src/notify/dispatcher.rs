//! Notification dispatch - one message per alert, failures never propagate

use std::future::Future;
use std::sync::Arc;

use reqwest::Url;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::alerts::{Alert, AlertKind, EmergencyCode, Watchlist};
use crate::geo::decimal_label;

/// Notification delivery failure
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Notification API returned HTTP {0}")]
    Status(u16),

    #[error("Notification API returned a malformed response: {0}")]
    Malformed(String),
}

/// A structured chat message: header, description, divider, fields
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Plain-text fallback shown in push notifications
    pub summary: String,
    pub header: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
}

/// Trait for delivering a message to a chat channel
pub trait MessageTransport: Send + Sync {
    /// Returns whether the service acknowledged the message
    fn send(&self, message: &Message) -> impl Future<Output = Result<bool, NotifyError>> + Send;
}

/// Formats alerts and hands them to the transport
pub struct Notifier<M> {
    /// `None` when no credentials are configured
    transport: Option<M>,
    piaware_host: Url,
    watchlist: Arc<Watchlist>,
}

impl<M: MessageTransport> Notifier<M> {
    pub fn new(transport: Option<M>, piaware_host: Url, watchlist: Arc<Watchlist>) -> Self {
        Self {
            transport,
            piaware_host,
            watchlist,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// `host[:port]` of the telemetry host, used in message headers
    fn host_label(&self) -> String {
        let host = self.piaware_host.host_str().unwrap_or_default();
        match self.piaware_host.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    fn link_base(&self) -> &str {
        self.piaware_host.as_str().trim_end_matches('/')
    }

    /// Build the message for an alert
    pub fn build_message(&self, alert: &Alert) -> Message {
        let host = self.host_label();
        let (summary, header, description) = match alert.kind {
            AlertKind::Emergency => (
                format!("ICAO Emergency Squawk {}", alert.squawk),
                format!("ICAO Emergency Squawk on {}", host),
                EmergencyCode::from_squawk(&alert.squawk).map(EmergencyCode::description),
            ),
            AlertKind::Registration => (
                format!("Registration of Special Interest {}", alert.callsign),
                format!("Registration of Special Interest on {}", host),
                self.watchlist.callsign_description(&alert.callsign),
            ),
            AlertKind::Icao => (
                format!("Flight of Special Interest {}", alert.callsign),
                format!("Flight of Special Interest on {}", host),
                self.watchlist.icao_description(&alert.hex),
            ),
        };

        let distance = match alert.distance_km {
            Some(km) => format!("{} km", decimal_label(km)),
            None => alert.distance_label(),
        };

        let base = self.link_base();
        Message {
            summary,
            header,
            description: description.unwrap_or("No description").to_string(),
            fields: vec![
                ("Aircraft".to_string(), alert.hex.clone()),
                ("Callsign".to_string(), alert.callsign.clone()),
                ("Squawk".to_string(), alert.squawk.clone()),
                ("Distance".to_string(), distance),
                (
                    "Tar1090".to_string(),
                    format!("<{}/tar1090/?icao={}|Open>", base, alert.hex),
                ),
                ("SkyAware".to_string(), format!("<{}/skyaware/|Open>", base)),
            ],
        }
    }

    /// Send one notification; returns whether it was delivered
    ///
    /// Without credentials this is a silent no-op returning `false`.
    pub async fn notify(&self, alert: &Alert) -> bool {
        let Some(transport) = &self.transport else {
            debug!(kind = %alert.kind, hex = %alert.hex, "Notifications disabled, not sending");
            return false;
        };

        let message = self.build_message(alert);
        match transport.send(&message).await {
            Ok(true) => {
                info!(kind = %alert.kind, hex = %alert.hex, "Notification sent: {}", message.summary);
                true
            }
            Ok(false) => {
                warn!(kind = %alert.kind, hex = %alert.hex, "Notification not acknowledged");
                false
            }
            Err(e) => {
                error!("Unable to Send Slack Message: {}", e);
                false
            }
        }
    }
}
