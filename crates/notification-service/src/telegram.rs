use async_trait::async_trait;

use crate::{NotificationChannel, NotificationError};

/// Telegram bot notifier using the sendMessage API.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token)
    }
}

#[async_trait]
impl NotificationChannel for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotificationError> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message,
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.api_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Telegram(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Telegram(format!(
                "HTTP {status}: {body}"
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_embeds_token() {
        let notifier = TelegramNotifier::new("123:abc".to_string(), "42".to_string());
        assert_eq!(
            notifier.api_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }
}
