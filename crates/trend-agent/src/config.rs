use alert_core::Symbol;
use finnhub_client::RetryPolicy;
use notification_service::{ChatId, TelegramConfig};
use perplexity_client::PerplexityConfig;
use rust_decimal::Decimal;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const REQUIRED: [&str; 4] = [
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
    "PPLX_API_KEY",
    "FINNHUB_API_KEY",
];

const REDACTED: &str = "<redacted>";

const DEFAULT_WATCHLIST: &str = "BINANCE:BTCUSDT,BINANCE:ETHUSDT,AAPL,NVDA";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variables: {}. Set {}.", .0.join(", "), REQUIRED.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process-wide settings, loaded once at startup. `Debug` output hides the
/// credentials.
#[derive(Clone)]
pub struct AgentConfig {
    // Credentials
    pub telegram_bot_token: String,
    pub telegram_chat_id: ChatId,
    pub pplx_api_key: String,
    pub finnhub_api_key: String,

    // Monitoring
    pub watchlist: Vec<Symbol>,
    pub poll_interval: Duration,       // 300s
    pub min_abs_pct_move: Decimal,     // 1.5%
    pub fetch_concurrency: usize,      // 4
    pub metrics_log_interval_cycles: u64,

    // Quote source
    pub finnhub_base_url: String,
    pub quote_retry: RetryPolicy,

    // Analysis service
    pub perplexity: PerplexityConfig,

    // Notifications
    pub telegram_api_url: String,
    pub notify_timeout: Duration,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<&'static str> = REQUIRED.iter().copied().filter(|k| get(*k).is_none()).collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(vec![key]));

        let chat_raw = required("TELEGRAM_CHAT_ID")?;
        let telegram_chat_id = chat_raw.parse::<ChatId>().map_err(|reason| ConfigError::Invalid {
            key: "TELEGRAM_CHAT_ID",
            value: chat_raw.clone(),
            reason,
        })?;

        let watchlist = parse_watchlist(&get("WATCHLIST").unwrap_or_else(|| DEFAULT_WATCHLIST.to_string()))?;

        let poll_secs: u64 = parse_or(&get, "POLL_INTERVAL", 300)?;
        let min_abs_pct_move: Decimal = parse_or(&get, "MIN_ABS_PCT_MOVE", Decimal::new(15, 1))?;
        let fetch_concurrency: usize = parse_or(&get, "FETCH_CONCURRENCY", 4)?;
        let quote_timeout_secs: u64 = parse_or(&get, "QUOTE_TIMEOUT_SECS", 20)?;
        let quote_max_attempts: u32 = parse_or(&get, "QUOTE_MAX_ATTEMPTS", 3)?;
        let quote_backoff_ms: u64 = parse_or(&get, "QUOTE_RETRY_BACKOFF_MS", 1000)?;
        let analysis_timeout_secs: u64 = parse_or(&get, "ANALYSIS_TIMEOUT_SECS", 30)?;
        let notify_timeout_secs: u64 = parse_or(&get, "NOTIFY_TIMEOUT_SECS", 15)?;
        let metrics_log_interval_cycles: u64 = parse_or(&get, "METRICS_LOG_INTERVAL_CYCLES", 12)?;

        positive("POLL_INTERVAL", poll_secs)?;
        positive("FETCH_CONCURRENCY", fetch_concurrency as u64)?;
        positive("QUOTE_TIMEOUT_SECS", quote_timeout_secs)?;
        positive("QUOTE_MAX_ATTEMPTS", quote_max_attempts as u64)?;
        positive("ANALYSIS_TIMEOUT_SECS", analysis_timeout_secs)?;
        positive("NOTIFY_TIMEOUT_SECS", notify_timeout_secs)?;
        if min_abs_pct_move.is_sign_negative() {
            return Err(ConfigError::Invalid {
                key: "MIN_ABS_PCT_MOVE",
                value: min_abs_pct_move.to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        let perplexity_defaults = PerplexityConfig::default();

        Ok(Self {
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id,
            pplx_api_key: required("PPLX_API_KEY")?,
            finnhub_api_key: required("FINNHUB_API_KEY")?,

            watchlist,
            poll_interval: Duration::from_secs(poll_secs),
            min_abs_pct_move,
            fetch_concurrency,
            metrics_log_interval_cycles,

            finnhub_base_url: get("FINNHUB_BASE_URL")
                .unwrap_or_else(|| finnhub_client::DEFAULT_BASE_URL.to_string()),
            quote_retry: RetryPolicy {
                max_attempts: quote_max_attempts,
                backoff: Duration::from_millis(quote_backoff_ms),
                timeout: Duration::from_secs(quote_timeout_secs),
            },

            perplexity: PerplexityConfig {
                base_url: get("PPLX_BASE_URL").unwrap_or(perplexity_defaults.base_url),
                model: get("PPLX_MODEL").unwrap_or(perplexity_defaults.model),
                timeout: Duration::from_secs(analysis_timeout_secs),
                ..perplexity_defaults
            },

            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| notification_service::DEFAULT_TELEGRAM_API_URL.to_string()),
            notify_timeout: Duration::from_secs(notify_timeout_secs),
        })
    }

    pub fn telegram(&self) -> TelegramConfig {
        TelegramConfig {
            bot_token: self.telegram_bot_token.clone(),
            chat_id: self.telegram_chat_id.clone(),
            api_url: self.telegram_api_url.clone(),
            timeout: self.notify_timeout,
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("telegram_bot_token", &REDACTED)
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("pplx_api_key", &REDACTED)
            .field("finnhub_api_key", &REDACTED)
            .field("watchlist", &self.watchlist)
            .field("poll_interval", &self.poll_interval)
            .field("min_abs_pct_move", &self.min_abs_pct_move)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("metrics_log_interval_cycles", &self.metrics_log_interval_cycles)
            .field("finnhub_base_url", &self.finnhub_base_url)
            .field("quote_retry", &self.quote_retry)
            .field("perplexity", &self.perplexity)
            .field("telegram_api_url", &self.telegram_api_url)
            .field("notify_timeout", &self.notify_timeout)
            .finish()
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn positive(key: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Comma-separated symbols, order kept, duplicates dropped.
fn parse_watchlist(raw: &str) -> Result<Vec<Symbol>, ConfigError> {
    let mut watchlist: Vec<Symbol> = Vec::new();
    for symbol in raw.split(',').filter_map(|s| Symbol::new(s).ok()) {
        if !watchlist.contains(&symbol) {
            watchlist.push(symbol);
        }
    }

    if watchlist.is_empty() {
        return Err(ConfigError::Invalid {
            key: "WATCHLIST",
            value: raw.to_string(),
            reason: "no symbols".to_string(),
        });
    }
    Ok(watchlist)
}
