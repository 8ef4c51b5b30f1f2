// Fixed-cadence scheduler: run a cycle, then sleep whatever is left of the period.
// Cycles never overlap; a cycle longer than the period is followed immediately by the next.

use crate::cycle::CollectionCycle;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

pub struct SchedulerConfig {
    pub cycle_period: Duration,
}

/// Residual sleep after a cycle that took `elapsed`; never negative.
pub fn next_sleep(cycle_period: Duration, elapsed: Duration) -> Duration {
    cycle_period.saturating_sub(elapsed)
}

/// Spawns the sampling loop. Send on (or drop) the shutdown sender to stop it;
/// the handle resolves to the number of completed cycles.
pub fn spawn(
    cycle: CollectionCycle,
    config: SchedulerConfig,
    shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<u64> {
    tokio::spawn(run(cycle, config, shutdown_rx))
}

#[instrument(
    name = "scheduler",
    skip_all,
    fields(host_id = %cycle.host_id(), cycle_period_secs = config.cycle_period.as_secs())
)]
pub async fn run(
    cycle: CollectionCycle,
    config: SchedulerConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> u64 {
    let SchedulerConfig { cycle_period } = config;
    let mut completed: u64 = 0;

    loop {
        if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }

        let started = Instant::now();
        info!("Monitoring start");

        match cycle.store().register_host(cycle.host_id()).await {
            Ok(true) => info!(host_id = cycle.host_id(), "host registered"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, operation = "register_host", "host registration failed"),
        }

        let report = cycle.run().await;
        completed += 1;

        let elapsed = started.elapsed();
        let sleep_for = next_sleep(cycle_period, elapsed);
        info!(
            date = %report.date,
            records_stored = report.records_stored(),
            categories_failed = report.failed_count(),
            elapsed_ms = elapsed.as_millis() as u64,
            sleep_ms = sleep_for.as_millis() as u64,
            "Monitoring end"
        );

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = &mut shutdown_rx => {
                break;
            }
        }
    }

    info!(cycles = completed, "Scheduler shutting down");
    completed
}
