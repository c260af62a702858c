//! Slack `chat.postMessage` transport

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::dispatcher::{Message, MessageTransport, NotifyError};
use crate::config::SlackCredentials;

const SLACK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts messages as Block Kit payloads with a bot token
pub struct SlackTransport {
    client: reqwest::Client,
    credentials: SlackCredentials,
}

impl SlackTransport {
    pub fn new(credentials: SlackCredentials) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(SLACK_TIMEOUT).build()?;
        Ok(Self {
            client,
            credentials,
        })
    }
}

/// Render a message as a `chat.postMessage` request body
pub fn slack_payload(message: &Message, channel: &str) -> Value {
    let fields: Vec<Value> = message
        .fields
        .iter()
        .map(|(key, value)| json!({"type": "mrkdwn", "text": format!("*{}:*\n{}", key, value)}))
        .collect();

    json!({
        "channel": channel,
        "text": message.summary,
        "blocks": [
            {"type": "header", "text": {"type": "plain_text", "text": message.header}},
            {"type": "section", "text": {"type": "mrkdwn", "text": message.description}},
            {"type": "divider"},
            {"type": "section", "fields": fields},
        ],
    })
}

impl MessageTransport for SlackTransport {
    async fn send(&self, message: &Message) -> Result<bool, NotifyError> {
        let payload = slack_payload(message, &self.credentials.channel);

        let response = self
            .client
            .post(self.credentials.api_url.clone())
            .bearer_auth(&self.credentials.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        let body: SlackResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Malformed(e.to_string()))?;

        if !body.ok {
            warn!(
                "Slack rejected message: {}",
                body.error.as_deref().unwrap_or("no error given")
            );
        }
        Ok(body.ok)
    }
}
