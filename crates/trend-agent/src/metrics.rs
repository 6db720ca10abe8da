use std::time::Instant;

use crate::scheduler::{CycleOutcome, CycleReport};

/// Running counters for the monitoring loop, logged every
/// `log_interval_cycles` cycles.
#[derive(Debug, Default)]
pub struct CycleMetrics {
    pub cycles_run: u64,
    pub alerts_sent: u64,
    pub alert_lines_sent: u64,
    pub quiet_cycles: u64,
    pub no_mover_cycles: u64,
    pub analysis_failures: u64,
    pub delivery_failures: u64,
    pub cycle_panics: u64,
    pub symbol_errors: u64,
    pub symbols_analyzed: u64,
    pub last_cycle_duration_ms: u64,
    log_interval_cycles: u64,
}

impl CycleMetrics {
    pub fn new(log_interval_cycles: u64) -> Self {
        Self {
            log_interval_cycles,
            ..Self::default()
        }
    }

    pub fn start_timer() -> Instant {
        Instant::now()
    }

    pub fn record_cycle(&mut self, report: &CycleReport, cycle_start: Instant) {
        self.last_cycle_duration_ms = cycle_start.elapsed().as_millis() as u64;
        self.cycles_run += 1;
        self.symbol_errors += report.fetch_errors as u64;
        self.symbols_analyzed += report.snapshot_len as u64;

        match report.outcome {
            CycleOutcome::NoMovers => self.no_mover_cycles += 1,
            CycleOutcome::NoAlerts => self.quiet_cycles += 1,
            CycleOutcome::AlertSent => {
                self.alerts_sent += 1;
                self.alert_lines_sent += report.alert_lines as u64;
            }
            CycleOutcome::AnalysisFailed => self.analysis_failures += 1,
            CycleOutcome::DeliveryFailed => self.delivery_failures += 1,
        }

        if self.log_interval_cycles > 0 && self.cycles_run.is_multiple_of(self.log_interval_cycles) {
            self.log_metrics();
        }
    }

    /// A cycle that died before producing a report.
    pub fn record_panic(&mut self, cycle_start: Instant) {
        self.last_cycle_duration_ms = cycle_start.elapsed().as_millis() as u64;
        self.cycles_run += 1;
        self.cycle_panics += 1;
    }

    pub fn log_metrics(&self) {
        tracing::info!(
            cycles = self.cycles_run,
            alerts_sent = self.alerts_sent,
            alert_lines_sent = self.alert_lines_sent,
            quiet_cycles = self.quiet_cycles,
            no_mover_cycles = self.no_mover_cycles,
            analysis_failures = self.analysis_failures,
            delivery_failures = self.delivery_failures,
            cycle_panics = self.cycle_panics,
            symbol_errors = self.symbol_errors,
            symbols_analyzed = self.symbols_analyzed,
            last_cycle_ms = self.last_cycle_duration_ms,
            "Agent metrics summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: CycleOutcome, fetch_errors: usize, snapshot_len: usize, alert_lines: usize) -> CycleReport {
        CycleReport {
            outcome,
            fetch_errors,
            snapshot_len,
            alert_lines,
        }
    }

    #[test]
    fn test_counts_by_outcome() {
        let mut metrics = CycleMetrics::new(0);
        let start = CycleMetrics::start_timer();

        metrics.record_cycle(&report(CycleOutcome::AlertSent, 1, 3, 2), start);
        metrics.record_cycle(&report(CycleOutcome::NoMovers, 0, 0, 0), start);
        metrics.record_cycle(&report(CycleOutcome::AnalysisFailed, 2, 1, 0), start);
        metrics.record_cycle(&report(CycleOutcome::DeliveryFailed, 0, 2, 0), start);
        metrics.record_cycle(&report(CycleOutcome::NoAlerts, 0, 1, 0), start);

        assert_eq!(metrics.cycles_run, 5);
        assert_eq!(metrics.alerts_sent, 1);
        assert_eq!(metrics.alert_lines_sent, 2);
        assert_eq!(metrics.no_mover_cycles, 1);
        assert_eq!(metrics.analysis_failures, 1);
        assert_eq!(metrics.delivery_failures, 1);
        assert_eq!(metrics.quiet_cycles, 1);
        assert_eq!(metrics.symbol_errors, 3);
        assert_eq!(metrics.symbols_analyzed, 7);
        assert_eq!(metrics.cycle_panics, 0);

        metrics.record_panic(start);
        assert_eq!(metrics.cycles_run, 6);
        assert_eq!(metrics.cycle_panics, 1);
    }
}
