//! Event sources feeding the runner's channel

use std::time::Instant;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::SignalStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, warn};

use super::router::{Button, Debouncer, InputEvent, OsSignal};

fn signal_kind(signal: OsSignal) -> SignalKind {
    match signal {
        OsSignal::HangUp => SignalKind::hangup(),
        OsSignal::Interrupt => SignalKind::interrupt(),
        OsSignal::Quit => SignalKind::quit(),
        OsSignal::Terminate => SignalKind::terminate(),
    }
}

/// Forward SIGHUP, SIGINT, SIGQUIT and SIGTERM into the event channel
///
/// Handlers are installed before this returns; the forwarding task ends when
/// the receiver is dropped.
pub fn spawn_signal_listener(tx: mpsc::Sender<InputEvent>) -> std::io::Result<JoinHandle<()>> {
    let mut streams = StreamMap::new();
    for kind in OsSignal::ALL {
        streams.insert(kind, SignalStream::new(signal(signal_kind(kind))?));
    }

    Ok(tokio::spawn(async move {
        while let Some((kind, ())) = streams.next().await {
            debug!("Caught {}", kind.name());
            if tx.send(InputEvent::Signal(kind)).await.is_err() {
                break;
            }
        }
    }))
}

/// Forward button presses read line by line, one BCM pin number per line
///
/// Stands in for the GPIO edge detector: unknown pins are logged and
/// dropped, presses are debounced per pin.
pub fn spawn_button_reader<R>(reader: R, tx: mpsc::Sender<InputEvent>) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut debouncer = Debouncer::default();
        let mut lines = reader.lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Button input failed: {}", e);
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let button = match line.parse::<u8>() {
                Ok(pin) => match Button::from_pin(pin) {
                    Ok(button) => button,
                    Err(e) => {
                        warn!("{}", e);
                        continue;
                    }
                },
                Err(_) => {
                    warn!("Ignoring button input {:?}", line);
                    continue;
                }
            };

            if !debouncer.accept(button, Instant::now()) {
                debug!("Debounced press on pin {}", button.pin());
                continue;
            }
            if tx.send(InputEvent::Button(button)).await.is_err() {
                break;
            }
        }
        debug!("Button input closed");
    })
}
