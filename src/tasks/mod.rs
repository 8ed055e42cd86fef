//! Background scheduled tasks for the application.
//!
//! Call `spawn_all` once during startup to launch them.

use crate::models::TickOutcome;
use crate::services::SchedulerService;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Spawn all background tasks.
///
/// Notes
/// - The scheduler ticks one full period after start-up, then on a fixed cadence;
///   the time a tick takes does not push later ticks back.
/// - A failed tick is logged and not retried; the next one runs on schedule.
/// - This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all(scheduler: SchedulerService, interval_secs: u64) {
    // 每个周期开放一个奖品并广播
    tokio::spawn(async move {
        let mut ticker = scheduler_interval(Duration::from_secs(interval_secs)).await;
        loop {
            ticker.tick().await;
            match scheduler.tick().await {
                Ok(TickOutcome::Broadcast { prize_id, report }) => log::info!(
                    "Scheduler broadcast prize {prize_id}: delivered={} failed={}",
                    report.delivered,
                    report.failed
                ),
                Ok(TickOutcome::NoPrizes) => log::debug!("Scheduler tick: no prizes left"),
                Err(e) => log::error!("Scheduler tick failed: {e:?}"),
            }
        }
    });
}

/// Fixed-rate ticker whose first tick is one `period` away.
async fn scheduler_interval(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval 的第一次 tick 立即完成
    ticker.tick().await;
    ticker
}
