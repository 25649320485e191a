use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use super::Notifier;

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
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            .context("failed to reach Telegram")?
            .error_for_status()
            .context("Telegram API returned error status")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("failed to parse Telegram response")?;
        anyhow::ensure!(
            body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "Telegram rejected the message: {body}"
        );

        Ok(())
    }
}
