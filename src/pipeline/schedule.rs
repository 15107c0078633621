//! Periodic cycle driver.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::models::ScheduleConfig;

use super::broadcast::{Broadcaster, CycleOutcome};

/// Trigger a cycle every `interval_secs` after an initial delay, until `shutdown` resolves.
///
/// Each tick runs on its own task, so a tick that fires while a cycle is
/// still delivering hits the single-flight check and is skipped.
pub async fn run_scheduled<F>(broadcaster: Arc<Broadcaster>, schedule: &ScheduleConfig, shutdown: F)
where
    F: Future<Output = ()>,
{
    let period = Duration::from_secs(schedule.interval_secs.max(1));
    let start = Instant::now() + Duration::from_secs(schedule.initial_delay_secs);
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!(
        "Scheduler started: first cycle in {}s, then every {}s",
        schedule.initial_delay_secs,
        period.as_secs()
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let broadcaster = Arc::clone(&broadcaster);
                tokio::spawn(async move {
                    if let CycleOutcome::Aborted(reason) = broadcaster.run_cycle().await {
                        log::info!("Waiting for the next tick after aborted cycle: {}", reason);
                    }
                });
            }
            _ = &mut shutdown => {
                log::info!("Scheduler shutting down");
                break;
            }
        }
    }
}
