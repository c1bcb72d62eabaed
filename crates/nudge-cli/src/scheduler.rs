//! Scheduled automation trigger
//!
//! Runs every known user at a fixed interval until interrupted. A scheduled
//! run has the same semantics as `nudge run-all`; a failed batch is logged
//! and the next tick proceeds normally.

use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::interval;
use tracing::{error, info, warn};

use nudge_core::AutomationEngine;

/// Configuration for the scheduled trigger
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Interval between batch runs in hours
    pub interval_hours: u64,
    /// Run a batch on startup instead of waiting one interval
    pub run_on_start: bool,
}

impl ScheduleConfig {
    pub fn new(interval_hours: u64, run_on_start: bool) -> Result<Self> {
        if interval_hours == 0 {
            bail!("--interval-hours must be at least 1");
        }
        Ok(Self {
            interval_hours,
            run_on_start,
        })
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }
}

/// Run the scheduler in the foreground until Ctrl-C
pub async fn run_scheduler(engine: AutomationEngine, config: ScheduleConfig) -> Result<()> {
    info!(
        interval_hours = config.interval_hours,
        run_on_start = config.run_on_start,
        "Starting automation scheduler"
    );

    let mut ticker = interval(config.period());

    // The first tick completes immediately
    if !config.run_on_start {
        ticker.tick().await;
    }

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_scheduled_batch(&engine).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, stopping scheduler");
                return Ok(());
            }
        }
    }
}

/// Run one scheduled batch, returning the number of completed users
pub async fn run_scheduled_batch(engine: &AutomationEngine) -> usize {
    info!("Running scheduled automation batch...");

    match engine.run_all().await {
        Ok(batch) => {
            for (user_id, e) in &batch.failed {
                warn!(user_id = %user_id, error = %e, "Scheduled run failed for user");
            }
            info!(
                completed = batch.completed.len(),
                failed = batch.failed.len(),
                "Scheduled batch completed"
            );
            batch.completed.len()
        }
        Err(e) => {
            error!(error = %e, "Scheduled batch failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_rejected() {
        let err = ScheduleConfig::new(0, false).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_period_in_hours() {
        let config = ScheduleConfig::new(6, true).unwrap();
        assert_eq!(config.period(), Duration::from_secs(6 * 3600));
        assert!(config.run_on_start);
    }
}
