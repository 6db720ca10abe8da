mod telegram;
mod templates;

pub use telegram::{ChatId, TelegramNotifier};
pub use templates::AlertTemplate;

use std::time::Duration;

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Settings for the Telegram channel.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: ChatId,
    pub api_url: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: String, chat_id: ChatId) -> Self {
        Self {
            bot_token,
            chat_id,
            api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}
