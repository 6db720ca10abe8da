use alert_core::{AlertMessage, DeliveryError, NotificationChannel};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TelegramConfig;

/// Telegram chat target: numeric chat id or `@channelusername`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl FromStr for ChatId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("chat id must not be empty".to_string());
        }
        Ok(s.parse::<i64>()
            .map(ChatId::Id)
            .unwrap_or_else(|_| ChatId::Username(s.to_string())))
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatId::Id(id) => write!(f, "{}", id),
            ChatId::Username(name) => f.write_str(name),
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a ChatId,
    text: &'a str,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Bot API `sendMessage` to a single chat.
///
/// The client keeps no idle connections, so each send opens its own
/// connection and drops it before returning.
pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
        };

        // The URL embeds the bot token; keep it out of error text.
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;
        let parsed: Option<SendMessageResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(r) if status.is_success() && r.ok => Ok(()),
            other => {
                let description = other
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| body.chars().take(200).collect());
                Err(DeliveryError::Rejected {
                    status: status.as_u16(),
                    description,
                })
            }
        }
    }
}

#[async_trait]
impl NotificationChannel for TelegramNotifier {
    async fn send(&self, message: &AlertMessage) -> Result<(), DeliveryError> {
        match self.send_text(message.text()).await {
            Ok(()) => {
                tracing::debug!("Telegram message delivered to {}", self.chat_id);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error sending Telegram message to {}: {}", self.chat_id, e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
