use alert_core::{NotificationChannel, Symbol, TrendAnalysis};
use notification_service::AlertTemplate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::metrics::CycleMetrics;
use crate::snapshot_builder::SnapshotBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No symbol passed the movement threshold; nothing was analyzed.
    NoMovers,
    /// Analysis ran but flagged nothing.
    NoAlerts,
    AlertSent,
    AnalysisFailed,
    DeliveryFailed,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub fetch_errors: usize,
    pub snapshot_len: usize,
    pub alert_lines: usize,
}

/// One fetch → filter → analyze → format → notify pass.
pub struct AlertPipeline {
    watchlist: Vec<Symbol>,
    builder: SnapshotBuilder,
    analyzer: Arc<dyn TrendAnalysis>,
    notifier: Arc<dyn NotificationChannel>,
}

impl AlertPipeline {
    pub fn new(
        watchlist: Vec<Symbol>,
        builder: SnapshotBuilder,
        analyzer: Arc<dyn TrendAnalysis>,
        notifier: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            watchlist,
            builder,
            analyzer,
            notifier,
        }
    }

    /// Run a single cycle. Every failure is logged and folded into the
    /// returned outcome; nothing propagates.
    pub async fn run_cycle(&self) -> CycleReport {
        let build = self.builder.build(&self.watchlist).await;
        let mut report = CycleReport {
            outcome: CycleOutcome::NoMovers,
            fetch_errors: build.fetch_errors,
            snapshot_len: build.snapshot.len(),
            alert_lines: 0,
        };

        if build.snapshot.is_empty() {
            tracing::info!(
                "No symbols passed movement threshold ({} fetch errors, {} below threshold)",
                build.fetch_errors,
                build.below_threshold
            );
            return report;
        }

        tracing::info!(
            "{} of {} symbols passed movement threshold, requesting analysis",
            build.snapshot.len(),
            self.watchlist.len()
        );

        let decisions = match self.analyzer.analyze(&build.snapshot).await {
            Ok(decisions) => decisions,
            Err(e) => {
                tracing::error!("Error in analysis: {}", e);
                report.outcome = CycleOutcome::AnalysisFailed;
                return report;
            }
        };

        let Some(message) = AlertTemplate::render_now(&decisions) else {
            tracing::info!(
                "No meaningful alerts this cycle ({} decisions returned)",
                decisions.len()
            );
            report.outcome = CycleOutcome::NoAlerts;
            return report;
        };

        report.alert_lines = message.alert_count();
        match self.notifier.send(&message).await {
            Ok(()) => {
                tracing::info!("Sent alert via {}:\n{}", self.notifier.name(), message);
                report.outcome = CycleOutcome::AlertSent;
            }
            Err(e) => {
                tracing::error!("Failed to deliver alert via {}: {}", self.notifier.name(), e);
                report.outcome = CycleOutcome::DeliveryFailed;
            }
        }

        report
    }
}

/// Fixed-interval driver. Cycles never overlap: the next one starts
/// `poll_interval` after the previous one finished. Each cycle runs as its
/// own task, so a panic inside a collaborator ends that cycle only.
pub struct Scheduler {
    pipeline: Arc<AlertPipeline>,
    poll_interval: Duration,
    metrics: CycleMetrics,
}

impl Scheduler {
    pub fn new(pipeline: AlertPipeline, poll_interval: Duration, metrics: CycleMetrics) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            poll_interval,
            metrics,
        }
    }

    /// Loop until `shutdown` resolves, then return the final counters.
    pub async fn run<F>(mut self, shutdown: F) -> CycleMetrics
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let cycle = self.metrics.cycles_run + 1;
            let cycle_start = CycleMetrics::start_timer();
            let span = tracing::info_span!("cycle", n = cycle);

            let pipeline = Arc::clone(&self.pipeline);
            let mut task =
                tokio::spawn(async move { pipeline.run_cycle().await }.instrument(span));

            tokio::select! {
                joined = &mut task => match joined {
                    Ok(report) => {
                        tracing::debug!("Cycle #{} finished: {:?}", cycle, report.outcome);
                        self.metrics.record_cycle(&report, cycle_start);
                    }
                    Err(e) => {
                        tracing::error!("Cycle #{} aborted: {}", cycle, e);
                        self.metrics.record_panic(cycle_start);
                    }
                },
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested during cycle #{}", cycle);
                    task.abort();
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping scheduler");
                    break;
                }
            }
        }

        self.metrics.log_metrics();
        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_core::{
        AlertDecision, AlertMessage, AnalysisError, DeliveryError, Quote, QuoteError, QuoteSource,
        Sentiment, Snapshot,
    };
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct FakeQuotes(HashMap<String, Result<(f64, f64), ()>>);

    #[async_trait]
    impl QuoteSource for FakeQuotes {
        async fn fetch_quote(&self, symbol: &Symbol) -> Result<Option<Quote>, QuoteError> {
            match self.0.get(symbol.as_str()) {
                Some(Ok((price, prev))) => Ok(Quote::new(symbol.clone(), *price, *prev)),
                Some(Err(())) => Err(QuoteError::Connect("connection refused".into())),
                None => Ok(None),
            }
        }
    }

    /// Replays queued responses, then repeats the last one.
    struct FakeAnalyzer {
        responses: Mutex<VecDeque<Result<Vec<AlertDecision>, AnalysisError>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Snapshot>>,
    }

    impl FakeAnalyzer {
        fn new(responses: Vec<Result<Vec<AlertDecision>, AnalysisError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TrendAnalysis for FakeAnalyzer {
        async fn analyze(&self, snapshot: &Snapshot) -> Result<Vec<AlertDecision>, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(snapshot.clone());
            let mut queue = self.responses.lock().unwrap();
            match queue.pop_front() {
                Some(r) => r,
                None => Ok(Vec::new()),
            }
        }
    }

    struct FakeNotifier {
        fail: bool,
        sent: Mutex<Vec<String>>,
        delivered: Notify,
    }

    impl FakeNotifier {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                sent: Mutex::new(Vec::new()),
                delivered: Notify::new(),
            })
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NotificationChannel for FakeNotifier {
        async fn send(&self, message: &AlertMessage) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(message.text().to_string());
            self.delivered.notify_one();
            if self.fail {
                return Err(DeliveryError::Transport("connection reset".into()));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn alert(symbol: &str, reason: &str, sentiment: Sentiment) -> AlertDecision {
        AlertDecision {
            symbol: Symbol::new(symbol).unwrap(),
            should_alert: true,
            reason: reason.to_string(),
            sentiment,
        }
    }

    fn pipeline(
        quotes: &[(&str, Result<(f64, f64), ()>)],
        analyzer: Arc<FakeAnalyzer>,
        notifier: Arc<FakeNotifier>,
    ) -> AlertPipeline {
        let source = Arc::new(FakeQuotes(
            quotes.iter().map(|(s, q)| (s.to_string(), *q)).collect(),
        ));
        let watchlist = quotes.iter().map(|(s, _)| Symbol::new(*s).unwrap()).collect();
        AlertPipeline::new(
            watchlist,
            SnapshotBuilder::new(source, dec!(1.5), 4),
            analyzer,
            notifier,
        )
    }

    #[tokio::test]
    async fn test_big_move_with_alert_notifies_once() {
        let analyzer = FakeAnalyzer::new(vec![Ok(vec![alert("AAPL", "breakout", Sentiment::Bullish)])]);
        let notifier = FakeNotifier::new(false);
        let pipeline = pipeline(&[("AAPL", Ok((110.0, 100.0)))], analyzer.clone(), notifier.clone());

        let report = pipeline.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::AlertSent);
        assert_eq!(report.snapshot_len, 1);
        assert_eq!(analyzer.seen.lock().unwrap()[0].len(), 1);
        assert_eq!(notifier.count(), 1);
        assert!(notifier.sent.lock().unwrap()[0].contains("🟢 AAPL: breakout"));
    }

    #[tokio::test]
    async fn test_small_move_skips_analysis_and_notification() {
        let analyzer = FakeAnalyzer::new(vec![]);
        let notifier = FakeNotifier::new(false);
        let pipeline = pipeline(&[("AAPL", Ok((100.5, 100.0)))], analyzer.clone(), notifier.clone());

        let report = pipeline.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::NoMovers);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_failed_symbol_does_not_stop_cycle() {
        let analyzer = FakeAnalyzer::new(vec![Ok(vec![alert("NVDA", "selloff", Sentiment::Bearish)])]);
        let notifier = FakeNotifier::new(false);
        let pipeline = pipeline(
            &[("X", Err(())), ("NVDA", Ok((90.0, 100.0)))],
            analyzer.clone(),
            notifier.clone(),
        );

        let report = pipeline.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::AlertSent);
        assert_eq!(report.fetch_errors, 1);
        let seen = analyzer.seen.lock().unwrap();
        let symbols: Vec<&str> = seen[0].symbols().map(|s| s.as_str()).collect();
        assert_eq!(symbols, vec!["NVDA"]);
    }

    #[tokio::test]
    async fn test_no_actionable_decisions() {
        let mut quiet = alert("AAPL", "noise", Sentiment::Unclear);
        quiet.should_alert = false;
        let analyzer = FakeAnalyzer::new(vec![Ok(vec![quiet])]);
        let notifier = FakeNotifier::new(false);
        let pipeline = pipeline(&[("AAPL", Ok((110.0, 100.0)))], analyzer, notifier.clone());

        let report = pipeline.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::NoAlerts);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_analysis_failure_skips_notification() {
        let analyzer = FakeAnalyzer::new(vec![Err(AnalysisError::Timeout)]);
        let notifier = FakeNotifier::new(false);
        let pipeline = pipeline(&[("AAPL", Ok((110.0, 100.0)))], analyzer, notifier.clone());

        let report = pipeline.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::AnalysisFailed);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_contained() {
        let analyzer = FakeAnalyzer::new(vec![Ok(vec![alert("AAPL", "breakout", Sentiment::Bullish)])]);
        let notifier = FakeNotifier::new(true);
        let pipeline = pipeline(&[("AAPL", Ok((110.0, 100.0)))], analyzer, notifier.clone());

        let report = pipeline.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::DeliveryFailed);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_next_cycle_runs_after_analysis_timeout() {
        let analyzer = FakeAnalyzer::new(vec![
            Err(AnalysisError::Timeout),
            Ok(vec![alert("AAPL", "breakout", Sentiment::Bullish)]),
        ]);
        let notifier = FakeNotifier::new(false);
        let pipeline = pipeline(&[("AAPL", Ok((110.0, 100.0)))], analyzer.clone(), notifier.clone());
        let scheduler = Scheduler::new(pipeline, Duration::from_millis(20), CycleMetrics::new(0));

        let waiter = notifier.clone();
        let metrics = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run(async move { waiter.delivered.notified().await }),
        )
        .await
        .expect("scheduler did not reach a second cycle");

        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(notifier.count(), 1);
        assert_eq!(metrics.analysis_failures, 1);
    }

    /// Panics on its first call, then flags AAPL.
    struct PanicOnceAnalyzer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TrendAnalysis for PanicOnceAnalyzer {
        async fn analyze(&self, _snapshot: &Snapshot) -> Result<Vec<AlertDecision>, AnalysisError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("analysis service returned garbage");
            }
            Ok(vec![alert("AAPL", "breakout", Sentiment::Bullish)])
        }
    }

    #[tokio::test]
    async fn test_panicking_cycle_does_not_stop_scheduler() {
        let analyzer = Arc::new(PanicOnceAnalyzer {
            calls: AtomicUsize::new(0),
        });
        let notifier = FakeNotifier::new(false);
        let source = Arc::new(FakeQuotes(
            [("AAPL".to_string(), Ok((110.0, 100.0)))].into_iter().collect(),
        ));
        let pipeline = AlertPipeline::new(
            vec![Symbol::new("AAPL").unwrap()],
            SnapshotBuilder::new(source, dec!(1.5), 4),
            analyzer.clone(),
            notifier.clone(),
        );
        let scheduler = Scheduler::new(pipeline, Duration::from_millis(20), CycleMetrics::new(0));

        let waiter = notifier.clone();
        let metrics = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run(async move { waiter.delivered.notified().await }),
        )
        .await
        .expect("scheduler stopped after a panicking cycle");

        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(notifier.count(), 1);
        assert_eq!(metrics.cycle_panics, 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let analyzer = FakeAnalyzer::new(vec![]);
        let notifier = FakeNotifier::new(false);
        let pipeline = pipeline(&[("AAPL", Ok((100.1, 100.0)))], analyzer, notifier);
        let scheduler = Scheduler::new(pipeline, Duration::from_secs(3600), CycleMetrics::new(0));

        let metrics = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run(tokio::time::sleep(Duration::from_millis(50))),
        )
        .await
        .expect("shutdown did not stop the scheduler");

        assert_eq!(metrics.cycles_run, 1);
        assert_eq!(metrics.no_mover_cycles, 1);
    }
}
