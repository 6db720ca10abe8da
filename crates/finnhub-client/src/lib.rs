mod retry;

pub use retry::{with_retry, RetryPolicy};

use alert_core::{Quote, QuoteError, QuoteSource, Symbol};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::io;

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Finnhub `/quote` payload. `c` is the current price, `pc` the previous close.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    c: Option<f64>,
    #[serde(default)]
    pc: Option<f64>,
}

#[derive(Clone)]
pub struct FinnhubClient {
    api_key: String,
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl FinnhubClient {
    pub fn new(api_key: String) -> Result<Self, QuoteError> {
        Self::with_options(api_key, DEFAULT_BASE_URL, RetryPolicy::default())
    }

    pub fn with_options(
        api_key: String,
        base_url: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, QuoteError> {
        let client = Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(|e| QuoteError::Request(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            retry,
        })
    }

    /// Latest quote for `symbol`, retrying connection and timeout failures.
    ///
    /// Returns `Ok(None)` when Finnhub answers without a usable price or
    /// previous close (unknown symbols come back as all zeros).
    pub async fn get_quote(&self, symbol: &Symbol) -> Result<Option<Quote>, QuoteError> {
        with_retry(&self.retry, symbol.as_str(), || self.get_quote_once(symbol)).await
    }

    async fn get_quote_once(&self, symbol: &Symbol) -> Result<Option<Quote>, QuoteError> {
        let url = format!("{}/quote", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.as_str()), ("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            return Err(QuoteError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await.map_err(classify)?;
        parse_quote(symbol, &body)
    }
}

#[async_trait]
impl QuoteSource for FinnhubClient {
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Option<Quote>, QuoteError> {
        self.get_quote(symbol).await
    }
}

/// Decode a `/quote` body. A body that is not the expected JSON object is an
/// error; zero or missing figures are `Ok(None)`.
pub fn parse_quote(symbol: &Symbol, body: &str) -> Result<Option<Quote>, QuoteError> {
    let data: QuoteResponse =
        serde_json::from_str(body).map_err(|e| QuoteError::InvalidResponse(e.to_string()))?;

    match (data.c, data.pc) {
        (Some(price), Some(prev_close)) => Ok(Quote::new(symbol.clone(), price, prev_close)),
        _ => Ok(None),
    }
}

// The request URL carries the API token, so it is stripped before the error
// is rendered into a log line.
fn classify(e: reqwest::Error) -> QuoteError {
    let e = e.without_url();
    if e.is_timeout() {
        QuoteError::Timeout(e.to_string())
    } else if e.is_connect() || is_dropped_connection(&e) {
        QuoteError::Connect(e.to_string())
    } else if e.is_decode() {
        QuoteError::InvalidResponse(e.to_string())
    } else {
        QuoteError::Request(e.to_string())
    }
}

/// Peer closed or reset the connection after it was established.
///
/// A send that fails before any response arrives (`is_request`) is a
/// transport failure too: hyper reports a peer that hangs up without
/// answering as an incomplete message with no io source.
fn is_dropped_connection(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<io::Error>() {
            if matches!(
                io.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = err.source();
    }
    e.is_request()
}
