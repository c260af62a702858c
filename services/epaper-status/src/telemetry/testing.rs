//! Scripted HTTP transport for tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use reqwest::Url;
use serde_json::Value;

use super::transport::{HttpResponse, HttpTransport, TransportError};

type Reply = Result<HttpResponse, TransportError>;

/// Transport replaying scripted replies
///
/// Replies registered for a path suffix are served to matching URLs; every
/// other request pops the shared queue. An exhausted script answers with a
/// connection error.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Reply>>,
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: AtomicU32,
    urls: Mutex<Vec<Url>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(self, status: u16, body: Value) -> Self {
        self.raw(status, body.to_string().into_bytes())
    }

    pub fn raw(self, status: u16, body: Vec<u8>) -> Self {
        self.push(Ok(HttpResponse { status, body }))
    }

    pub fn connection_error(self) -> Self {
        self.push(Err(TransportError("connection refused".to_string())))
    }

    fn push(self, reply: Reply) -> Self {
        self.queue.lock().unwrap().push_back(reply);
        self
    }

    /// Serve `body` to every request whose path ends with `suffix`
    pub fn route(self, suffix: &str, status: u16, body: Value) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(suffix.to_string())
            .or_default()
            .push_back(Ok(HttpResponse {
                status,
                body: body.to_string().into_bytes(),
            }));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, suffix: &str) -> usize {
        self.urls()
            .iter()
            .filter(|u| u.path().ends_with(suffix))
            .count()
    }
}

impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.clone());

        {
            let mut routes = self.routes.lock().unwrap();
            if let Some(replies) = routes
                .iter_mut()
                .find(|(suffix, _)| url.path().ends_with(suffix.as_str()))
                .map(|(_, replies)| replies)
            {
                // The last reply of a route keeps being served
                if replies.len() > 1 {
                    return replies.pop_front().unwrap();
                }
                if let Some(reply) = replies.front() {
                    return reply.clone();
                }
            }
        }

        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("connection refused".to_string())))
    }
}
