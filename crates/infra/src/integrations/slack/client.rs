//! Slack Web API client
//!
//! Thin wrapper over `chat.postMessage` and `users.info`. Slack reports
//! request failures as HTTP 200 with `ok: false`, so the envelope is checked
//! on every call.

use std::sync::Arc;

use async_trait::async_trait;
use dakoku_core::Notifier;
use dakoku_domain::{DakokuError, Result};
use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::HttpClient;

/// Error type for Slack API calls
#[derive(Debug, Error)]
pub enum SlackError {
    /// Network-level failure.
    #[error("Slack transport error: {0}")]
    Transport(String),

    /// Non-2xx HTTP response.
    #[error("Slack HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    /// `ok: false` envelope with Slack's error code.
    #[error("Slack API error: {0}")]
    Api(String),

    /// Unparseable response body.
    #[error("malformed Slack response: {0}")]
    Decode(String),
}

impl From<SlackError> for DakokuError {
    fn from(err: SlackError) -> Self {
        Self::Network(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<UserObject>,
}

#[derive(Debug, Deserialize)]
struct UserObject {
    #[serde(default)]
    profile: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    #[serde(default)]
    email: Option<String>,
}

/// Slack Web API client.
pub struct SlackClient {
    base_url: String,
    bot_token: String,
    http: HttpClient,
}

impl SlackClient {
    pub fn new(base_url: impl Into<String>, bot_token: impl Into<String>, http: HttpClient) -> Self {
        Self { base_url: base_url.into(), bot_token: bot_token.into(), http }
    }

    /// Post a message, optionally threaded under `thread_ts`.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> std::result::Result<(), SlackError> {
        let mut body = serde_json::json!({
            "channel": channel,
            "text": text,
        });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = serde_json::Value::String(ts.to_string());
        }

        let envelope: Envelope = self.call("chat.postMessage", body).await?;
        if !envelope.ok {
            return Err(SlackError::Api(envelope.error.unwrap_or_else(|| "unknown".to_string())));
        }

        debug!(channel, "posted Slack message");
        Ok(())
    }

    /// The email on a user's profile, if visible to the bot.
    pub async fn user_email(&self, user_id: &str) -> std::result::Result<Option<String>, SlackError> {
        let body = serde_json::json!({ "user": user_id });
        let response: UserInfoResponse = self.call("users.info", body).await?;

        if !response.ok {
            return Err(SlackError::Api(response.error.unwrap_or_else(|| "unknown".to_string())));
        }

        Ok(response.user.and_then(|u| u.profile).and_then(|p| p.email))
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        api_method: &str,
        body: serde_json::Value,
    ) -> std::result::Result<T, SlackError> {
        let url = format!("{}/{}", self.base_url, api_method);
        let request = self
            .http
            .request(Method::POST, &url)
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .header("Content-Type", "application/json; charset=utf-8")
            .json(&body);

        let response = self
            .http
            .send(request)
            .await
            .map_err(|err| SlackError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Http { status: status.as_u16(), body });
        }

        response.json().await.map_err(|err| SlackError::Decode(err.to_string()))
    }
}

/// [`Notifier`] bound to a fixed channel, used by the schedulers.
pub struct ChannelNotifier {
    slack: Arc<SlackClient>,
    channel: String,
}

impl ChannelNotifier {
    pub fn new(slack: Arc<SlackClient>, channel: impl Into<String>) -> Self {
        Self { slack, channel: channel.into() }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        self.slack.post_message(&self.channel, text, None).await.map_err(|err| {
            warn!(error = %err, "notification delivery failed");
            DakokuError::from(err)
        })
    }
}
