//! Maps buttons and OS signals to runner actions

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use crate::display::Color;

/// Minimum time between two accepted presses of the same button
pub const DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("Unexpected Pin: {0}")]
    UnexpectedPin(u8),
}

/// The four front-panel buttons, by BCM pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    ClearBlack,
    ClearWhite,
    Refresh,
    Shutdown,
}

impl Button {
    pub fn pin(self) -> u8 {
        match self {
            Button::ClearBlack => 5,
            Button::ClearWhite => 6,
            Button::Refresh => 13,
            Button::Shutdown => 19,
        }
    }

    pub fn from_pin(pin: u8) -> Result<Self, EventError> {
        match pin {
            5 => Ok(Button::ClearBlack),
            6 => Ok(Button::ClearWhite),
            13 => Ok(Button::Refresh),
            19 => Ok(Button::Shutdown),
            other => Err(EventError::UnexpectedPin(other)),
        }
    }
}

/// OS signals the process reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsSignal {
    HangUp,
    Interrupt,
    Quit,
    Terminate,
}

impl OsSignal {
    pub const ALL: [OsSignal; 4] = [
        OsSignal::HangUp,
        OsSignal::Interrupt,
        OsSignal::Quit,
        OsSignal::Terminate,
    ];

    pub fn number(self) -> i32 {
        match self {
            OsSignal::HangUp => 1,
            OsSignal::Interrupt => 2,
            OsSignal::Quit => 3,
            OsSignal::Terminate => 15,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OsSignal::HangUp => "SIGHUP",
            OsSignal::Interrupt => "SIGINT",
            OsSignal::Quit => "SIGQUIT",
            OsSignal::Terminate => "SIGTERM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Button(Button),
    Signal(OsSignal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Refresh,
    Clear(Color),
    Shutdown,
    Ignore,
}

/// Decide what an input event does
pub fn route(event: InputEvent) -> Action {
    match event {
        InputEvent::Button(button) => {
            let pin = button.pin();
            match button {
                Button::ClearBlack => {
                    info!("Received Event on Pin {} - Clearing Display (Black).", pin);
                    Action::Clear(Color::Black)
                }
                Button::ClearWhite => {
                    info!("Received Event on Pin {} - Clearing Display (White).", pin);
                    Action::Clear(Color::White)
                }
                Button::Refresh => {
                    info!("Received Event on Pin {} - Executing Refresh.", pin);
                    Action::Refresh
                }
                Button::Shutdown => {
                    info!("Received Event on Pin {} - Executing Shutdown.", pin);
                    Action::Shutdown
                }
            }
        }
        InputEvent::Signal(OsSignal::HangUp) => {
            info!("Received {}, ignoring.", OsSignal::HangUp.name());
            Action::Ignore
        }
        InputEvent::Signal(signal) => {
            info!("Shutting down on Signal {} ({}).", signal.number(), signal.name());
            Action::Shutdown
        }
    }
}

/// Actions collected between two cycle phases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingActions {
    pub shutdown: bool,
    pub refresh: bool,
    /// Clears in arrival order
    pub clears: Vec<Color>,
}

impl PendingActions {
    /// Fold queued actions: shutdown wins, refreshes coalesce into one
    pub fn coalesce(actions: impl IntoIterator<Item = Action>) -> Self {
        let mut pending = Self::default();
        for action in actions {
            match action {
                Action::Shutdown => pending.shutdown = true,
                Action::Refresh => pending.refresh = true,
                Action::Clear(color) => pending.clears.push(color),
                Action::Ignore => {}
            }
        }
        if pending.shutdown {
            pending.refresh = false;
            pending.clears.clear();
        }
        pending
    }
}

/// Drops presses arriving within the debounce window of the last accepted press
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: HashMap<Button, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    pub fn accept(&mut self, button: Button, now: Instant) -> bool {
        match self.last.get(&button) {
            Some(last) if now.saturating_duration_since(*last) < self.window => false,
            _ => {
                self.last.insert(button, now);
                true
            }
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE)
    }
}
