//! Display frames and rendering sinks

mod frame;
mod sink;

#[cfg(test)]
pub(crate) use sink::testing;

pub use frame::{Color, Frame};
pub use sink::{DisplayError, DisplaySink, TextDisplay};
