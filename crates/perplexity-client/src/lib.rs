mod parse;
mod prompt;

pub use parse::{extract_content, parse_decisions, parse_response};

use alert_core::{AlertDecision, AnalysisError, Snapshot, TrendAnalysis};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

/// Model and generation settings for the analysis call.
#[derive(Debug, Clone)]
pub struct PerplexityConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for PerplexityConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "sonar-pro".to_string(),
            max_tokens: 512,
            temperature: 0.2,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Asks Perplexity which snapshot moves deserve an alert.
#[derive(Clone)]
pub struct TrendAnalyzer {
    client: Client,
    api_key: String,
    config: PerplexityConfig,
}

impl TrendAnalyzer {
    pub fn new(api_key: String, config: PerplexityConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalysisError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// One chat completion for the whole snapshot.
    ///
    /// Errors only when the call itself fails. Content that does not parse
    /// as a decision list yields an empty list.
    pub async fn analyze_snapshot(
        &self,
        snapshot: &Snapshot,
    ) -> Result<Vec<AlertDecision>, AnalysisError> {
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let request = prompt::build_request(
            &self.config.model,
            self.config.max_tokens,
            self.config.temperature,
            snapshot,
        )
        .map_err(|e| AnalysisError::InvalidRequest(e.to_string()))?;

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        tracing::debug!(
            "Requesting trend analysis for {} symbols ({})",
            snapshot.len(),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AnalysisError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await.map_err(classify)?;

        let decisions = match parse_response(&body) {
            Ok(decisions) => decisions,
            Err(e) => {
                tracing::warn!("Discarding unparsable analysis response: {}", e);
                return Ok(Vec::new());
            }
        };

        for decision in &decisions {
            if !snapshot.contains(&decision.symbol) {
                tracing::warn!(
                    "Analysis returned a decision for {} which was not in the snapshot",
                    decision.symbol
                );
            }
        }

        Ok(decisions)
    }
}

#[async_trait]
impl TrendAnalysis for TrendAnalyzer {
    async fn analyze(&self, snapshot: &Snapshot) -> Result<Vec<AlertDecision>, AnalysisError> {
        self.analyze_snapshot(snapshot).await
    }
}

fn classify(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::Timeout
    } else {
        AnalysisError::Unreachable(e.without_url().to_string())
    }
}
