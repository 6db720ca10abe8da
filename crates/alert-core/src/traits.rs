use async_trait::async_trait;
use crate::{AlertDecision, AlertMessage, AnalysisError, DeliveryError, Quote, QuoteError, Snapshot, Symbol};

/// Source of current quotes.
///
/// `Ok(None)` means the source answered but had no usable price data for
/// the symbol; the caller skips it for this cycle.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Option<Quote>, QuoteError>;
}

/// External reasoning service that decides which moves deserve an alert.
#[async_trait]
pub trait TrendAnalysis: Send + Sync {
    async fn analyze(&self, snapshot: &Snapshot) -> Result<Vec<AlertDecision>, AnalysisError>;
}

/// Delivery channel for formatted alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, message: &AlertMessage) -> Result<(), DeliveryError>;
    fn name(&self) -> &str;
}
