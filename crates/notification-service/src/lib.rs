mod render;
mod telegram;

pub use render::render_dip_alert;
pub use telegram::TelegramNotifier;

use async_trait::async_trait;

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Telegram error: {0}")]
    Telegram(String),
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Configuration for the notification service.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub discord_username: Option<String>,
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let get = |key: &str| std::env::var(key).ok().filter(|s| !s.is_empty());
        Self {
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: get("TELEGRAM_CHAT_ID"),
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            discord_username: get("DISCORD_USERNAME"),
        }
    }
}

/// Dispatches rendered alerts to all configured channels.
pub struct NotificationService {
    channels: std::sync::Arc<Vec<Box<dyn NotificationChannel>>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if let (Some(token), Some(chat_id)) = (
            config.telegram_bot_token.clone(),
            config.telegram_chat_id.clone(),
        ) {
            channels.push(Box::new(TelegramNotifier::new(token, chat_id)));
            tracing::info!("Telegram notifications enabled");
        }

        if let Some(ref webhook_url) = config.discord_webhook_url {
            channels.push(Box::new(DiscordWebhookNotifier {
                webhook_url: webhook_url.clone(),
                username: config
                    .discord_username
                    .clone()
                    .unwrap_or_else(|| "Dipwatch".to_string()),
                client: reqwest::Client::new(),
            }));
            tracing::info!("Discord webhook notifications enabled");
        }

        if channels.is_empty() {
            tracing::info!(
                "No notification channels configured (set TELEGRAM_BOT_TOKEN or DISCORD_WEBHOOK_URL)"
            );
        }

        Self {
            channels: std::sync::Arc::new(channels),
        }
    }

    /// Send a message to all channels, awaiting completion. A failing
    /// channel is logged and never aborts the others.
    pub async fn send(&self, message: &str) {
        for channel in self.channels.iter() {
            match channel.send(message).await {
                Ok(()) => tracing::debug!("Sent notification via {}", channel.name()),
                Err(e) => {
                    tracing::warn!("Failed to send notification via {}: {}", channel.name(), e)
                }
            }
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[async_trait]
impl scanner_core::AlertSink for NotificationService {
    async fn deliver(&self, message: &str) -> Result<(), scanner_core::ScanError> {
        self.send(message).await;
        Ok(())
    }
}

/// Discord webhook notifier.
struct DiscordWebhookNotifier {
    webhook_url: String,
    username: String,
    client: reqwest::Client,
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, message: &str) -> Result<(), NotificationError> {
        let payload = serde_json::json!({
            "content": message,
            "username": self.username,
        });

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}
