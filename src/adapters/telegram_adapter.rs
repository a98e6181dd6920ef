//! Telegram Bot API notifier.

use crate::domain::config_validation::telegram_enabled;
use crate::domain::error::YenesisError;
use crate::ports::config_port::ConfigPort;
use crate::ports::notifier_port::{Notification, NotifierPort};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

fn telegram_err(reason: impl ToString) -> YenesisError {
    YenesisError::Notification {
        channel: "telegram".into(),
        reason: reason.to_string(),
    }
}

pub struct TelegramAdapter {
    api_base: String,
    bot_token: String,
    chat_id: String,
    client: Client,
}

impl TelegramAdapter {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str) -> Result<Self, YenesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(telegram_err)?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            client,
        })
    }

    /// `None` when Telegram is disabled.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Option<Self>, YenesisError> {
        if !telegram_enabled(config) {
            return Ok(None);
        }
        let get = |key: &str| {
            config
                .get_string("telegram", key)
                .ok_or_else(|| YenesisError::ConfigMissing {
                    section: "telegram".into(),
                    key: key.into(),
                })
        };
        let api_base = config
            .get_string("telegram", "api_base")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::new(&api_base, &get("bot_token")?, &get("chat_id")?).map(Some)
    }

    pub fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    fn post(&self, payload: &Value) -> Result<(u16, String), YenesisError> {
        let response = self
            .client
            .post(self.send_url())
            .json(payload)
            .send()
            .map_err(telegram_err)?;
        let status = response.status().as_u16();
        Ok((status, response.text().unwrap_or_default()))
    }

    pub fn send_text(&self, text: &str) -> Result<(), YenesisError> {
        let (status, body) = self.post(&message_payload(&self.chat_id, text, true))?;
        if (200..300).contains(&status) {
            tracing::info!("Telegram message sent");
            return Ok(());
        }

        // Unbalanced Markdown in tickers or reasons makes Telegram reject the message.
        if status == 400 && body.contains("parse entities") {
            tracing::warn!("Telegram Markdown parsing failed, retrying as plain text");
            let (status, body) = self.post(&message_payload(&self.chat_id, text, false))?;
            if (200..300).contains(&status) {
                return Ok(());
            }
            return Err(telegram_err(format!("sendMessage failed ({}): {}", status, body)));
        }
        Err(telegram_err(format!("sendMessage failed ({}): {}", status, body)))
    }
}

pub fn message_payload(chat_id: &str, text: &str, markdown: bool) -> Value {
    if markdown {
        json!({ "chat_id": chat_id, "text": text, "parse_mode": "Markdown" })
    } else {
        json!({ "chat_id": chat_id, "text": text })
    }
}

/// Chat text when given, otherwise the subject in bold above the body.
pub fn render(notification: &Notification) -> String {
    if let Some(text) = &notification.chat_text {
        text.clone()
    } else if notification.subject.is_empty() {
        notification.body.clone()
    } else {
        format!("*{}*\n\n{}", notification.subject, notification.body)
    }
}

impl NotifierPort for TelegramAdapter {
    fn send(&self, notification: &Notification) -> Result<(), YenesisError> {
        self.send_text(&render(notification))
    }
}
