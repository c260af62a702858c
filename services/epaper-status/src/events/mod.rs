//! Button and signal handling
//!
//! Every source pushes [`InputEvent`]s into one channel. The runner consumes
//! it between cycle phases, so no handler ever runs concurrently with a
//! refresh.

mod input;
mod router;

pub use input::{spawn_button_reader, spawn_signal_listener};
pub use router::{route, Action, InputEvent, PendingActions};

#[cfg(test)]
pub use router::{Button, OsSignal};
