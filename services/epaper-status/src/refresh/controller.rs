//! Refresh cycle: fetch, compute, notify, render

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::status::{local_ip, StatusReport, StatusSnapshot};
use crate::aircraft::{range_extent, AircraftCounts, AircraftFilter};
use crate::alerts::{AlertClassifier, AlertKind, Watchlist};
use crate::display::{Color, DisplayError, DisplaySink, Frame};
use crate::geo::{to_kilometers, Position};
use crate::notify::{MessageTransport, Notifier};
use crate::telemetry::{HttpTransport, Resource, TelemetryClient};

/// Number of the next scheduled cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleCounter(u64);

impl CycleCounter {
    pub fn new() -> Self {
        Self(1)
    }

    pub fn current(&self) -> u64 {
        self.0
    }

    fn advance(&mut self) {
        self.0 += 1;
    }
}

impl Default for CycleCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// What started a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Timed loop; advances the cycle counter
    Scheduled,
    /// Manual request; renders as cycle 0, always clears, never advances
    Forced,
}

/// Outcome of one completed refresh
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub trigger: RefreshTrigger,
    pub report: StatusReport,
    pub emergencies: u32,
    pub alerts: usize,
    pub notifications_sent: usize,
    pub elapsed: Duration,
}

/// Drives the refresh cycle
///
/// Owns the telemetry client, notifier and display. The receiver origin is
/// fetched once and kept for the lifetime of the controller.
pub struct RefreshController<T, M, D> {
    telemetry: TelemetryClient<T>,
    notifier: Notifier<M>,
    display: D,
    watchlist: Arc<Watchlist>,
    origin: Option<Position>,
    threshold_secs: f64,
    enable_fr24: bool,
    counter: CycleCounter,
}

impl<T, M, D> RefreshController<T, M, D>
where
    T: HttpTransport,
    M: MessageTransport,
    D: DisplaySink,
{
    pub fn new(
        telemetry: TelemetryClient<T>,
        notifier: Notifier<M>,
        display: D,
        watchlist: Arc<Watchlist>,
        threshold_secs: f64,
        enable_fr24: bool,
    ) -> Self {
        Self {
            telemetry,
            notifier,
            display,
            watchlist,
            origin: None,
            threshold_secs,
            enable_fr24,
            counter: CycleCounter::new(),
        }
    }

    #[cfg(test)]
    pub fn counter(&self) -> CycleCounter {
        self.counter
    }

    /// Receiver origin, fetched on first use
    pub async fn ensure_origin(&mut self) -> Position {
        if let Some(origin) = self.origin {
            return origin;
        }
        let origin = self.telemetry.fetch_receiver_position().await;
        self.origin = Some(origin);
        origin
    }

    /// Run one refresh cycle
    ///
    /// Telemetry and notification failures degrade into the rendered report.
    /// Only a display failure is returned.
    pub async fn refresh(&mut self, trigger: RefreshTrigger) -> Result<CycleReport, DisplayError> {
        let started = Instant::now();
        let cycle = match trigger {
            RefreshTrigger::Scheduled => self.counter.current(),
            RefreshTrigger::Forced => 0,
        };
        info!("Starting Refresh Cycle {}", cycle);

        let status = self.telemetry.fetch_or_empty(Resource::Status).await;
        let fr24 = if self.enable_fr24 {
            Some(self.telemetry.fetch_fr24_status().await)
        } else {
            None
        };
        let origin = self.ensure_origin().await;
        let aircraft = self.telemetry.fetch_aircraft().await;

        let snapshot = StatusSnapshot::from_status(&status);
        if snapshot.error {
            warn!("Receiver status is incomplete");
        }

        let classifier = AlertClassifier::new(origin, self.watchlist.clone());
        let positioned = aircraft
            .as_deref()
            .map(|all| AircraftFilter::with_position(self.threshold_secs).apply(all));

        let scan = classifier.scan_emergencies(positioned.as_deref());
        if scan.is_telemetry_loss() {
            warn!("Aircraft telemetry lost, reporting emergency count {}", scan.count);
        }
        let status_slug = scan.status_slug(&snapshot.base_slug(fr24.as_deref()));

        let mut alerts = scan.alerts;
        if let Some(positioned) = &positioned {
            alerts.extend(classifier.scan_watchlist(positioned));
        }

        let mut notifications_sent = 0;
        for alert in &alerts {
            let delivered = self.notifier.notify(alert).await;
            if delivered {
                notifications_sent += 1;
            }
            if alert.kind == AlertKind::Emergency {
                warn!(
                    "Aircraft {} (Callsign {}) with ICAO Emergency Squawk {} found in {} km distance (Notification sent {})",
                    alert.hex,
                    alert.callsign,
                    alert.squawk,
                    alert.distance_label(),
                    delivered
                );
            } else {
                debug!(kind = %alert.kind, hex = %alert.hex, delivered, "Alert at {} km", alert.distance_label());
            }
        }

        let records = aircraft.as_deref().unwrap_or_default();
        let counts = AircraftCounts::from_aircraft(records, self.threshold_secs);
        let extent = range_extent(records, &origin, self.threshold_secs);

        let report = StatusReport {
            status_slug,
            time: snapshot.time,
            piaware: snapshot.piaware,
            gps: snapshot.gps,
            radio: snapshot.radio,
            counts,
            min_range_km: extent.map(|e| to_kilometers(e.min_m, 1)),
            max_range_km: extent.map(|e| to_kilometers(e.max_m, 1)),
            uptime: snapshot.uptime,
            cpu_load: snapshot.cpu_load,
            cpu_temp: snapshot.cpu_temp,
            cycle,
            local_ip: local_ip(),
        };

        if cycle == 1 || trigger == RefreshTrigger::Forced {
            self.display.clear(Color::White)?;
        }
        let (width, height) = self.display.size();
        debug!("e-Paper Display is {}x{} (Width x Height)", width, height);
        self.display.display(&Frame::layout(&report, width, height))?;
        self.display.sleep()?;

        if trigger == RefreshTrigger::Scheduled {
            self.counter.advance();
        }

        let elapsed = started.elapsed();
        info!(
            "Refresh cycle {} complete after {:.3}s ({})",
            cycle,
            elapsed.as_secs_f64(),
            counts
        );

        Ok(CycleReport {
            cycle,
            trigger,
            report,
            emergencies: scan.count,
            alerts: alerts.len(),
            notifications_sent,
            elapsed,
        })
    }

    /// Clear the display to a solid color
    pub fn clear(&mut self, color: Color) -> Result<(), DisplayError> {
        self.display.clear(color)
    }

    /// Blank the display, put it to sleep and release it
    pub fn shutdown(&mut self) -> Result<(), DisplayError> {
        self.display.clear(Color::White)?;
        self.display.sleep()?;
        self.display.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::display::testing::{MockDisplay, SinkOp};
    use crate::notify::testing::RecordingTransport;
    use crate::telemetry::testing::ScriptedTransport;
    use reqwest::Url;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    type TestController =
        RefreshController<ScriptedTransport, Arc<RecordingTransport>, MockDisplay>;

    fn status() -> Value {
        json!({
            "system_uptime": 3600,
            "time": 1_700_000_000_000i64,
            "gps": {"message": "GPS 3D fix"},
            "radio": {"message": "Received Mode S data recently"},
            "piaware": {"message": "PiAware 9.0 is running"},
            "cpu_temp_celcius": 45.0,
            "cpu_load_percent": 7
        })
    }

    fn aircraft(squawk: &str) -> Value {
        json!({
            "now": 1_700_000_000.0,
            "aircraft": [
                {"hex": "3c6444", "flight": "DLH9U   ", "squawk": squawk,
                 "lat": 51.5, "lon": 7.0, "seen_pos": 1.0, "seen": 0.5},
                {"hex": "4b1805", "flight": "SWR1AB", "squawk": "1000",
                 "lat": 51.0, "lon": 6.5, "seen_pos": 3.0, "seen": 1.0},
                {"hex": "a1b2c3", "seen": 2.0}
            ]
        })
    }

    fn controller(
        transport: ScriptedTransport,
        watchlist: Watchlist,
    ) -> (TestController, MockDisplay, Arc<RecordingTransport>) {
        let host = Url::parse("http://piaware.local:8080").unwrap();
        let telemetry = TelemetryClient::new(
            transport,
            &host,
            &Url::parse("http://piaware.local:8754").unwrap(),
            RetryPolicy {
                retries: 0,
                backoff_factor: 0.0,
            },
            false,
        )
        .unwrap();
        let watchlist = Arc::new(watchlist);
        let recorder = Arc::new(RecordingTransport::acknowledging());
        let notifier = Notifier::new(Some(recorder.clone()), host, watchlist.clone());
        let display = MockDisplay::new();
        let controller =
            RefreshController::new(telemetry, notifier, display.clone(), watchlist, 120.0, false);
        (controller, display, recorder)
    }

    fn healthy_feed(squawk: &str) -> ScriptedTransport {
        ScriptedTransport::new()
            .route("status.json", 200, status())
            .route("receiver.json", 200, json!({"lat": 51.2895, "lon": 6.7668}))
            .route("aircraft.json", 200, aircraft(squawk))
    }

    fn line_starting<'a>(lines: &'a [String], prefix: &str) -> &'a str {
        lines
            .iter()
            .find(|l| l.starts_with(prefix))
            .map(String::as_str)
            .unwrap()
    }

    #[tokio::test]
    async fn test_counter_sequence_with_forced_refresh() {
        let (mut c, display, _) = controller(healthy_feed("1000"), Watchlist::default());

        assert_eq!(c.refresh(RefreshTrigger::Scheduled).await.unwrap().cycle, 1);
        assert_eq!(c.refresh(RefreshTrigger::Scheduled).await.unwrap().cycle, 2);
        assert_eq!(c.refresh(RefreshTrigger::Forced).await.unwrap().cycle, 0);
        assert_eq!(c.counter().current(), 3);
        assert_eq!(c.refresh(RefreshTrigger::Scheduled).await.unwrap().cycle, 3);
        assert_eq!(c.counter().current(), 4);

        let cycles: Vec<String> = display
            .frames()
            .iter()
            .map(|lines| line_starting(lines, "Cycle: ").to_string())
            .collect();
        assert_eq!(cycles, ["Cycle: 1", "Cycle: 2", "Cycle: 0", "Cycle: 3"]);

        // First cycle and the forced refresh clear the panel
        assert_eq!(display.clears(), [Color::White, Color::White]);
    }

    #[tokio::test]
    async fn test_healthy_cycle() {
        let (mut c, display, recorder) = controller(healthy_feed("1000"), Watchlist::default());
        let outcome = c.refresh(RefreshTrigger::Scheduled).await.unwrap();

        assert_eq!(outcome.report.status_slug, "OK");
        assert_eq!(outcome.emergencies, 0);
        assert_eq!(outcome.report.counts.all, 3);
        assert_eq!(outcome.report.counts.with_position, 2);
        assert_eq!(outcome.report.counts.mlat, 0);
        assert!(outcome.report.min_range_km.unwrap() <= outcome.report.max_range_km.unwrap());
        assert!(recorder.messages().is_empty());

        let ops = display.ops();
        assert_eq!(ops[0], SinkOp::Clear(Color::White));
        assert!(matches!(ops[1], SinkOp::Display(_)));
        assert_eq!(ops[2], SinkOp::Sleep);
    }

    #[tokio::test]
    async fn test_receiver_origin_fetched_once() {
        let (mut c, _, _) = controller(healthy_feed("1000"), Watchlist::default());
        c.refresh(RefreshTrigger::Scheduled).await.unwrap();
        c.refresh(RefreshTrigger::Scheduled).await.unwrap();
        assert_eq!(c.telemetry.transport().calls_to("receiver.json"), 1);
        assert_eq!(c.telemetry.transport().calls_to("aircraft.json"), 2);
    }

    #[tokio::test]
    async fn test_missing_gps_needs_attention() {
        let mut partial = status();
        partial.as_object_mut().unwrap().remove("gps");
        let transport = ScriptedTransport::new()
            .route("status.json", 200, partial)
            .route("receiver.json", 200, json!({"lat": 51.2895, "lon": 6.7668}))
            .route("aircraft.json", 200, aircraft("1000"));

        let (mut c, display, _) = controller(transport, Watchlist::default());
        let outcome = c.refresh(RefreshTrigger::Scheduled).await.unwrap();

        assert_eq!(outcome.report.gps, "!!! Failed to get GPS Status");
        assert_eq!(outcome.report.status_slug, "NEEDS ATTENTION");
        let frame = &display.frames()[0];
        assert_eq!(frame[0], "Status (NEEDS ATTENTION)");
        assert!(frame.contains(&"!!! Failed to get GPS Status".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_aircraft_reports_telemetry_loss() {
        let transport = ScriptedTransport::new()
            .route("status.json", 200, status())
            .route("receiver.json", 200, json!({"lat": 51.2895, "lon": 6.7668}));

        let (mut c, display, recorder) = controller(transport, Watchlist::default());
        let outcome = c.refresh(RefreshTrigger::Scheduled).await.unwrap();

        assert_eq!(outcome.report.counts, AircraftCounts::default());
        assert_eq!(outcome.emergencies, 666);
        assert_eq!(outcome.report.status_slug, "!!! SQUAWK 7x00 (Count: 666) !!!");
        assert_ne!(outcome.report.status_slug, "NEEDS ATTENTION");
        assert_eq!(outcome.report.min_range_km, None);
        assert!(recorder.messages().is_empty());

        let frame = &display.frames()[0];
        assert!(frame.contains(&"Min Range: n/a".to_string()));
    }

    #[tokio::test]
    async fn test_emergency_squawk_notifies_once_per_cycle() {
        let (mut c, _, recorder) = controller(healthy_feed("7700"), Watchlist::default());

        let outcome = c.refresh(RefreshTrigger::Scheduled).await.unwrap();
        assert_eq!(outcome.emergencies, 1);
        assert_eq!(outcome.notifications_sent, 1);
        assert_eq!(outcome.report.status_slug, "!!! SQUAWK 7x00 (Count: 1) !!!");

        let sent = recorder.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].summary, "ICAO Emergency Squawk 7700");
        assert_eq!(sent[0].fields[1].1, "DLH9U");

        c.refresh(RefreshTrigger::Scheduled).await.unwrap();
        assert_eq!(recorder.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_watchlist_hit_notifies() {
        let watchlist = Watchlist::new(
            BTreeMap::from([("4B1805".to_string(), "Swiss test frame".to_string())]),
            BTreeMap::new(),
        );
        let (mut c, _, recorder) = controller(healthy_feed("1000"), watchlist);
        let outcome = c.refresh(RefreshTrigger::Scheduled).await.unwrap();

        assert_eq!(outcome.alerts, 1);
        let sent = recorder.messages();
        assert_eq!(sent[0].summary, "Flight of Special Interest SWR1AB");
        assert_eq!(sent[0].description, "Swiss test frame");
    }

    /// Controller without notification credentials
    fn unnotified_controller(transport: ScriptedTransport, display: MockDisplay) -> TestController {
        let host = Url::parse("http://piaware.local:8080").unwrap();
        let telemetry = TelemetryClient::new(
            transport,
            &host,
            &host,
            RetryPolicy {
                retries: 0,
                backoff_factor: 0.0,
            },
            false,
        )
        .unwrap();
        let watchlist = Arc::new(Watchlist::default());
        let notifier = Notifier::new(None, host, watchlist.clone());
        RefreshController::new(telemetry, notifier, display, watchlist, 120.0, false)
    }

    #[tokio::test]
    async fn test_emergency_counted_without_credentials() {
        let display = MockDisplay::new();
        let mut c = unnotified_controller(healthy_feed("7700"), display.clone());

        let outcome = c.refresh(RefreshTrigger::Scheduled).await.unwrap();
        assert_eq!(outcome.emergencies, 1);
        assert_eq!(outcome.alerts, 1);
        assert_eq!(outcome.notifications_sent, 0);
        assert_eq!(outcome.report.status_slug, "!!! SQUAWK 7x00 (Count: 1) !!!");
        assert_eq!(display.frames()[0][0], "Status (!!! SQUAWK 7x00 (Count: 1) !!!)");
    }

    #[tokio::test]
    async fn test_display_failure_is_returned() {
        let mut c = unnotified_controller(healthy_feed("1000"), MockDisplay::broken());

        let err = c.refresh(RefreshTrigger::Scheduled).await.unwrap_err();
        assert!(matches!(err, DisplayError::Io(_)));
        assert_eq!(c.counter().current(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_sequence() {
        let (mut c, display, _) = controller(healthy_feed("1000"), Watchlist::default());
        c.clear(Color::Black).unwrap();
        c.shutdown().unwrap();
        assert_eq!(
            display.ops(),
            [
                SinkOp::Clear(Color::Black),
                SinkOp::Clear(Color::White),
                SinkOp::Sleep,
                SinkOp::Release
            ]
        );
    }
}
