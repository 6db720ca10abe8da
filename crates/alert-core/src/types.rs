use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal places kept for snapshot prices.
pub const PRICE_DECIMALS: u32 = 4;
/// Decimal places kept for snapshot percent changes.
pub const PCT_DECIMALS: u32 = 3;

/// Ticker or exchange-qualified pair, e.g. `AAPL` or `BINANCE:BTCUSDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidSymbol> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidSymbol);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = InvalidSymbol;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Symbol {
    type Err = InvalidSymbol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSymbol;

impl fmt::Display for InvalidSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("symbol must be a non-empty string")
    }
}

impl std::error::Error for InvalidSymbol {}

/// Latest price for a symbol alongside the previous session close.
///
/// Only constructible from strictly positive, finite values; a source that
/// reports zero or missing fields yields no `Quote` at all.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    symbol: Symbol,
    price: f64,
    previous_close: f64,
}

impl Quote {
    pub fn new(symbol: Symbol, price: f64, previous_close: f64) -> Option<Self> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(price) || !usable(previous_close) {
            return None;
        }
        Some(Self {
            symbol,
            price,
            previous_close,
        })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn previous_close(&self) -> f64 {
        self.previous_close
    }

    /// Percent change vs previous close, unrounded.
    pub fn pct_change(&self) -> f64 {
        (self.price - self.previous_close) / self.previous_close * 100.0
    }
}

/// One symbol's rounded figures as handed to the analysis service.
///
/// Figures serialize as JSON numbers, not strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub symbol: Symbol,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub pct_change: Decimal,
}

impl SnapshotEntry {
    /// Rounds the quote's figures. Returns `None` if a value is out of
    /// `Decimal` range.
    pub fn from_quote(quote: &Quote) -> Option<Self> {
        Some(Self {
            symbol: quote.symbol().clone(),
            price: round_to(quote.price(), PRICE_DECIMALS)?,
            pct_change: round_to(quote.pct_change(), PCT_DECIMALS)?,
        })
    }

    pub fn meets_threshold(&self, min_abs_pct_move: Decimal) -> bool {
        self.pct_change.abs() >= min_abs_pct_move
    }
}

fn round_to(value: f64, dp: u32) -> Option<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
}

/// Ordered set of entries that cleared the movement pre-filter this cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.entries.iter().any(|e| &e.symbol == symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter().map(|e| &e.symbol)
    }
}

impl FromIterator<SnapshotEntry> for Snapshot {
    fn from_iter<I: IntoIterator<Item = SnapshotEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Direction the analysis service assigned to a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Sentiment {
    Bullish,
    Bearish,
    #[default]
    Unclear,
}

impl Sentiment {
    pub fn marker(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "🟢",
            Sentiment::Bearish => "🔴",
            Sentiment::Unclear => "⚪️",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
            Sentiment::Unclear => "unclear",
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullish" => Ok(Sentiment::Bullish),
            "bearish" => Ok(Sentiment::Bearish),
            "unclear" => Ok(Sentiment::Unclear),
            other => Err(format!("unknown sentiment '{}'", other)),
        }
    }
}

impl TryFrom<String> for Sentiment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Verdict from the analysis service for one symbol.
///
/// Deserializes with the strict decision schema: `symbol` and `should_alert`
/// are required, `reason` defaults to empty and `sentiment` to unclear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDecision {
    pub symbol: Symbol,
    pub should_alert: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub sentiment: Sentiment,
}

/// Formatted alert text. Always carries at least one alert line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    text: String,
    alert_count: usize,
}

impl AlertMessage {
    /// Returns `None` when `alert_count` is zero.
    pub fn new(text: String, alert_count: usize) -> Option<Self> {
        (alert_count > 0).then_some(Self { text, alert_count })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn alert_count(&self) -> usize {
        self.alert_count
    }
}

impl fmt::Display for AlertMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
