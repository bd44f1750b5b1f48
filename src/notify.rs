//! Notification Side-Channel
//! Mission: Fire-and-forget user notifications, never load-bearing

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Outbound notification seam. Callers spawn sends and move on; a failed
/// notification is logged, never surfaced to the request.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Posts notifications as JSON to a configured webhook (mail relay, Slack
/// bridge, whatever is on the other end).
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({
                "to": to,
                "subject": subject,
                "body": body,
            }))
            .send()
            .await
            .context("Failed to reach notification webhook")?;

        if !resp.status().is_success() {
            bail!("Notification webhook returned {}", resp.status());
        }

        Ok(())
    }
}

/// Fallback when no webhook is configured: the notification becomes a log
/// line. Keeps development flows (e.g. grabbing a reset token) workable.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(to = to, subject = subject, body = body, "📨 Notification (no webhook configured)");
        Ok(())
    }
}

/// Pick the notifier implied by configuration.
pub fn from_config(client: &reqwest::Client, webhook_url: Option<&str>) -> Arc<dyn Notifier> {
    match webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(client.clone(), url.to_string())),
        None => Arc::new(LogNotifier),
    }
}
