use std::sync::Arc;

use anyhow::{Context, Result};
use finnhub_client::FinnhubClient;
use notification_service::TelegramNotifier;
use perplexity_client::TrendAnalyzer;
use tokio::signal::unix::SignalKind;

mod config;
mod metrics;
mod scheduler;
mod snapshot_builder;

use config::AgentConfig;
use metrics::CycleMetrics;
use scheduler::{AlertPipeline, Scheduler};
use snapshot_builder::SnapshotBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting market trend agent");

    // 2. Configuration; missing credentials stop the process here
    let config = AgentConfig::from_env().context("Failed to load configuration")?;
    let watchlist: Vec<&str> = config.watchlist.iter().map(|s| s.as_str()).collect();
    tracing::info!("Configuration loaded");
    tracing::info!("  Watchlist: {}", watchlist.join(", "));
    tracing::info!("  Poll interval: {}s", config.poll_interval.as_secs());
    tracing::info!("  Min move: {}%", config.min_abs_pct_move);
    tracing::info!(
        "  Quote fetch: concurrency {}, {} attempts, {}s timeout",
        config.fetch_concurrency,
        config.quote_retry.max_attempts,
        config.quote_retry.timeout.as_secs()
    );
    tracing::info!(
        "  Analysis model: {} ({}s timeout)",
        config.perplexity.model,
        config.perplexity.timeout.as_secs()
    );
    tracing::info!("  Telegram chat: {}", config.telegram_chat_id);

    // 3. Collaborators
    let quotes = Arc::new(
        FinnhubClient::with_options(
            config.finnhub_api_key.clone(),
            config.finnhub_base_url.clone(),
            config.quote_retry.clone(),
        )
        .context("Failed to build Finnhub client")?,
    );
    let analyzer = Arc::new(
        TrendAnalyzer::new(config.pplx_api_key.clone(), config.perplexity.clone())
            .context("Failed to build Perplexity client")?,
    );
    let notifier = Arc::new(
        TelegramNotifier::new(&config.telegram()).context("Failed to build Telegram notifier")?,
    );

    let builder = SnapshotBuilder::new(quotes, config.min_abs_pct_move, config.fetch_concurrency);
    let pipeline = AlertPipeline::new(config.watchlist.clone(), builder, analyzer, notifier);
    let scheduler = Scheduler::new(
        pipeline,
        config.poll_interval,
        CycleMetrics::new(config.metrics_log_interval_cycles),
    );

    // 4. Main loop with graceful shutdown (SIGINT + SIGTERM)
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };

    let metrics = scheduler.run(shutdown).await;
    tracing::info!(
        "Market trend agent stopped after {} cycles ({} alerts sent)",
        metrics.cycles_run,
        metrics.alerts_sent
    );

    Ok(())
}
