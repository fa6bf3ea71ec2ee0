//! Discord webhook client

use std::time::Duration;

use async_trait::async_trait;
use prwatch_core::config::DiscordSettings;
use prwatch_core::{DeliveryOutcome, Notifier, PullRequestRecord};
use reqwest::Client;
use tracing::{debug, error, info};
use url::Url;

use crate::embed::{pr_embed, WebhookPayload};
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts merged-PR notifications to a Discord webhook
#[derive(Clone)]
pub struct DiscordNotifier {
    client: Client,
    webhook_url: Url,
    username: String,
    avatar_url: String,
}

impl DiscordNotifier {
    pub fn new(
        webhook_url: Url,
        username: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("prwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            webhook_url,
            username: username.into(),
            avatar_url: avatar_url.into(),
        })
    }

    pub fn from_settings(settings: &DiscordSettings) -> Result<Self> {
        Self::new(
            settings.webhook_url.clone(),
            settings.username.clone(),
            settings.avatar_url.clone(),
        )
    }

    /// Payload announcing `pr`
    pub fn pr_payload(&self, pr: &PullRequestRecord) -> WebhookPayload {
        WebhookPayload {
            content: None,
            embeds: vec![pr_embed(pr, &self.avatar_url)],
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }

    /// Payload for a connectivity check
    pub fn test_payload(&self) -> WebhookPayload {
        WebhookPayload {
            content: Some("🧪 GitHub PR Monitor test message - service is running!".to_string()),
            embeds: Vec::new(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }

    /// POST `payload`, treating anything but 200/204 as failure
    pub async fn send(&self, payload: &WebhookPayload) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::NO_CONTENT {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Send a test message to verify webhook connectivity
    pub async fn send_test_message(&self) -> Result<()> {
        self.send(&self.test_payload()).await?;
        info!("Discord test message sent successfully");
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, record: &PullRequestRecord) -> DeliveryOutcome {
        debug!(number = record.number, "Sending Discord notification");

        match self.send(&self.pr_payload(record)).await {
            Ok(()) => {
                debug!(number = record.number, "Discord notification delivered");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                let reason = e.reason();
                error!(number = record.number, error = %reason, "Discord notification failed");
                DeliveryOutcome::failed(reason)
            }
        }
    }
}

impl std::fmt::Debug for DiscordNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordNotifier")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
