use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::hooks::action::{Action, SlackAction};
use crate::hooks::actions::{expand_env, ActionExecutor};
use crate::hooks::WorkflowEvent;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Incoming-webhook payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(rename = "ts", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Why a single delivery attempt failed; decides whether to retry.
#[derive(Debug)]
enum SendError {
    RateLimited(String),
    Transient(String),
    Rejected(String),
}

impl SendError {
    fn message(&self) -> &str {
        match self {
            SendError::RateLimited(m) | SendError::Transient(m) | SendError::Rejected(m) => m,
        }
    }
}

/// Posts rendered messages to a Slack incoming webhook.
pub struct SlackExecutor {
    client: Client,
}

impl SlackExecutor {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    async fn send_once(&self, webhook_url: &str, payload: &SlackPayload) -> std::result::Result<(), SendError> {
        let response = match self.client.post(webhook_url).json(payload).send().await {
            Ok(response) => response,
            // The reqwest error embeds the URL; keep it out of logs.
            Err(e) => return Err(SendError::Transient(redact_reqwest_error(e))),
        };

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("slack webhook returned status {}: {}", status.as_u16(), body.trim());

        if status == StatusCode::TOO_MANY_REQUESTS {
            Err(SendError::RateLimited(message))
        } else if status.is_client_error() {
            Err(SendError::Rejected(message))
        } else {
            Err(SendError::Transient(message))
        }
    }
}

impl Default for SlackExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for SlackExecutor {
    fn kind(&self) -> &'static str {
        "slack"
    }

    async fn execute(&self, action: &Action, event: &WorkflowEvent) -> Result<()> {
        let Action::Slack(slack) = action else {
            return Err(AppError::Internal(format!(
                "slack executor cannot run a {} action",
                action.kind()
            )));
        };

        let webhook_url = expand_env(&slack.webhook_url);
        if webhook_url.trim().is_empty() {
            return Err(AppError::Action("webhook URL is empty after expansion".to_string()));
        }
        let masked = mask_webhook_url(&webhook_url);
        let payload = build_payload(slack, event);

        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!(webhook = %masked, attempt, "Sending Slack notification");

            let err = match self.send_once(&webhook_url, &payload).await {
                Ok(()) => {
                    tracing::debug!(webhook = %masked, attempt, "Slack notification sent");
                    return Ok(());
                }
                Err(e) => e,
            };

            let delay = match &err {
                // 1s, then 2s.
                SendError::RateLimited(_) if attempt < MAX_ATTEMPTS => {
                    Some(RETRY_DELAY * 2u32.pow(attempt - 1))
                }
                SendError::Transient(_) if attempt == 1 => Some(RETRY_DELAY),
                _ => None,
            };

            match delay {
                Some(delay) => {
                    tracing::warn!(
                        webhook = %masked,
                        attempt,
                        backoff = ?delay,
                        error = err.message(),
                        "Slack notification failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(AppError::Action(format!(
                        "failed to send slack notification to {masked} after {attempt} attempt(s): {}",
                        err.message()
                    )));
                }
            }
        }
    }
}

/// Build the webhook payload. With a colour, the text moves into an attachment.
pub fn build_payload(slack: &SlackAction, event: &WorkflowEvent) -> SlackPayload {
    let text = slack.message.render(event);

    let mut payload = SlackPayload {
        text,
        username: slack.username.clone().filter(|s| !s.is_empty()),
        icon_emoji: slack.icon_emoji.clone().filter(|s| !s.is_empty()),
        attachments: Vec::new(),
    };

    if let Some(color) = slack.color.as_ref().filter(|c| !c.is_empty()) {
        payload.attachments.push(Attachment {
            color: Some(color.clone()),
            text: Some(std::mem::take(&mut payload.text)),
            footer: Some(format!("octap - {}", event.repository)),
            timestamp: Some(Utc::now().timestamp()),
        });
    }

    payload
}

/// Mask a webhook URL so it can be logged.
///
/// Slack URLs keep their shape with each token segment cut to two characters;
/// anything else keeps only its first 20 characters.
pub fn mask_webhook_url(url: &str) -> String {
    if url.contains("hooks.slack.com") {
        let mut parts: Vec<String> = url.split('/').map(str::to_string).collect();
        if parts.len() > 3 {
            let len = parts.len();
            for part in &mut parts[len - 3..] {
                if part.chars().count() > 4 {
                    *part = format!("{}***", part.chars().take(2).collect::<String>());
                }
            }
            return parts.join("/");
        }
    }

    if url.chars().count() > 20 {
        format!("{}***", url.chars().take(20).collect::<String>())
    } else {
        "***".to_string()
    }
}

fn redact_reqwest_error(e: reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        "request timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    format!("{kind}: {}", e.without_url())
}
