use alert_core::{QuoteSource, Snapshot, SnapshotEntry, Symbol};
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Result of one pass over the watchlist.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuild {
    pub snapshot: Snapshot,
    /// Symbols whose fetch failed after retries.
    pub fetch_errors: usize,
    /// Symbols with no usable quote.
    pub absent: usize,
    /// Symbols that moved less than the threshold.
    pub below_threshold: usize,
}

pub struct SnapshotBuilder {
    source: Arc<dyn QuoteSource>,
    min_abs_pct_move: Decimal,
    concurrency: usize,
}

impl SnapshotBuilder {
    pub fn new(source: Arc<dyn QuoteSource>, min_abs_pct_move: Decimal, concurrency: usize) -> Self {
        Self {
            source,
            min_abs_pct_move,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch every symbol and keep the ones that moved at least the
    /// threshold, in watchlist order.
    ///
    /// Up to `concurrency` fetches are in flight at once. A failed fetch is
    /// logged and that symbol is left out; it never aborts the build.
    pub async fn build(&self, watchlist: &[Symbol]) -> SnapshotBuild {
        let fetches: Vec<_> = watchlist
            .iter()
            .map(|symbol| async move { (symbol, self.source.fetch_quote(symbol).await) })
            .collect();
        let results: Vec<_> = stream::iter(fetches)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut build = SnapshotBuild::default();
        let mut entries = Vec::new();

        for (symbol, result) in results {
            let quote = match result {
                Ok(Some(quote)) => quote,
                Ok(None) => {
                    tracing::debug!("No usable price data for {}, skipping", symbol);
                    build.absent += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!("Error fetching {}: {}", symbol, e);
                    build.fetch_errors += 1;
                    continue;
                }
            };

            let Some(entry) = SnapshotEntry::from_quote(&quote) else {
                tracing::warn!(
                    "Quote for {} out of range (price={}, prev_close={}), skipping",
                    symbol,
                    quote.price(),
                    quote.previous_close()
                );
                build.absent += 1;
                continue;
            };

            if !entry.meets_threshold(self.min_abs_pct_move) {
                tracing::debug!(
                    "{} moved {}% (< {}%), filtered out",
                    symbol,
                    entry.pct_change,
                    self.min_abs_pct_move
                );
                build.below_threshold += 1;
                continue;
            }

            entries.push(entry);
        }

        build.snapshot = Snapshot::new(entries);
        build
    }
}
