//! Main loop: refresh, drain queued actions, sleep until the next cycle
//!
//! Events are only looked at between phases. A refresh request arriving
//! mid-cycle is queued and runs as a forced refresh once the cycle is done.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::display::DisplaySink;
use crate::events::{route, Action, InputEvent, PendingActions};
use crate::notify::MessageTransport;
use crate::refresh::{RefreshController, RefreshTrigger};
use crate::telemetry::HttpTransport;

/// Progress is logged this many times per sleep
const SLEEP_PINGS: u32 = 10;

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Shutdown button or termination signal
    Requested,
    /// The display could not be written
    DisplayFailure,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Requested => f.write_str("requested"),
            ShutdownReason::DisplayFailure => f.write_str("display failure"),
        }
    }
}

enum Step {
    Sleep,
    Refresh,
    Shutdown(ShutdownReason),
}

pub struct Runner<T, M, D> {
    controller: RefreshController<T, M, D>,
    events: mpsc::Receiver<InputEvent>,
    interval: Duration,
    events_open: bool,
}

impl<T, M, D> Runner<T, M, D>
where
    T: HttpTransport,
    M: MessageTransport,
    D: DisplaySink,
{
    pub fn new(
        controller: RefreshController<T, M, D>,
        events: mpsc::Receiver<InputEvent>,
        interval: Duration,
    ) -> Self {
        Self {
            controller,
            events,
            interval,
            events_open: true,
        }
    }

    /// Run until shutdown
    ///
    /// Scheduled cycles start `interval` after the previous scheduled one.
    /// Forced refreshes run in between without moving that deadline.
    pub async fn run(mut self) -> ShutdownReason {
        let mut trigger = RefreshTrigger::Scheduled;
        let mut next_scheduled = Instant::now();

        let reason = loop {
            let cycle = match self.controller.refresh(trigger).await {
                Ok(report) => {
                    debug!(
                        trigger = ?report.trigger,
                        emergencies = report.emergencies,
                        alerts = report.alerts,
                        sent = report.notifications_sent,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "Cycle {} status: {}",
                        report.cycle,
                        report.report.status_slug
                    );
                    report.cycle
                }
                Err(e) => {
                    error!("{}", e);
                    break ShutdownReason::DisplayFailure;
                }
            };
            if trigger == RefreshTrigger::Scheduled {
                next_scheduled = Instant::now() + self.interval;
            }

            let step = match self.apply(None) {
                Step::Sleep => self.sleep(next_scheduled, cycle).await,
                step => step,
            };
            trigger = match step {
                Step::Sleep => RefreshTrigger::Scheduled,
                Step::Refresh => RefreshTrigger::Forced,
                Step::Shutdown(reason) => break reason,
            };
        };

        self.shutdown(reason);
        reason
    }

    /// Drain queued events and apply them
    ///
    /// Clears run immediately. Shutdown or refresh is returned to the loop.
    fn apply(&mut self, first: Option<Action>) -> Step {
        let mut actions: Vec<Action> = first.into_iter().collect();
        while let Ok(event) = self.events.try_recv() {
            actions.push(route(event));
        }

        let pending = PendingActions::coalesce(actions);
        if pending.shutdown {
            return Step::Shutdown(ShutdownReason::Requested);
        }
        for color in pending.clears {
            if let Err(e) = self.controller.clear(color) {
                error!("{}", e);
                return Step::Shutdown(ShutdownReason::DisplayFailure);
            }
        }
        if pending.refresh {
            Step::Refresh
        } else {
            Step::Sleep
        }
    }

    /// Wait for the deadline, waking early for queued events
    ///
    /// Returns `Step::Sleep` once the deadline passed.
    async fn sleep(&mut self, deadline: Instant, cycle: u64) -> Step {
        let start = Instant::now();
        let total = deadline.saturating_duration_since(start);
        let ping = (self.interval / SLEEP_PINGS).max(Duration::from_secs(1));
        info!(
            "Sleeping for {} seconds after refresh cycle {} (Ping every {}s)",
            total.as_secs(),
            cycle,
            ping.as_secs()
        );

        let mut pings = interval_at(start + ping, ping);
        pings.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = sleep_until(deadline) => return Step::Sleep,

                event = self.events.recv(), if self.events_open => {
                    let Some(event) = event else {
                        self.events_open = false;
                        continue;
                    };
                    match self.apply(Some(route(event))) {
                        Step::Sleep => {}
                        step => return step,
                    }
                }

                _ = pings.tick() => {
                    info!(
                        "Slept {}/{} seconds after refresh cycle {}",
                        start.elapsed().as_secs(),
                        total.as_secs(),
                        cycle
                    );
                }
            }
        }
    }

    /// Blank and release the display; failures are logged only
    fn shutdown(&mut self, reason: ShutdownReason) {
        info!("Shutting down ({})", reason);
        if let Err(e) = self.controller.shutdown() {
            error!("Display shutdown failed: {}", e);
        }
        info!("Shutdown complete.");
    }
}
