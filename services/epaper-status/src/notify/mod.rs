//! Alert notifications

mod dispatcher;
mod slack;

#[cfg(test)]
pub(crate) use dispatcher::testing;

pub use dispatcher::{MessageTransport, Notifier};
pub use slack::SlackTransport;
