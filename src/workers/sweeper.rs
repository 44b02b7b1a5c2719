use std::time::Duration;

use anyhow::anyhow;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::services::recycle::{PurgeReport, RecycleBin};

/// Periodically purges recycle bin entries whose retention has elapsed.
pub struct RecycleSweeper {
    recycle: RecycleBin,
    period: Duration,
}

impl RecycleSweeper {
    pub fn new(recycle: RecycleBin, period: Duration) -> Self {
        Self { recycle, period }
    }

    pub async fn run(&self) {
        info!(period_secs = self.period.as_secs(), "recycle sweeper started");
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.tick().await {
                error!(error = %err, "recycle sweep failed");
            }
        }
    }

    pub async fn tick(&self) -> anyhow::Result<PurgeReport> {
        let recycle = self.recycle.clone();
        let report = tokio::task::spawn_blocking(move || recycle.purge_expired())
            .await
            .map_err(|err| anyhow!("recycle sweep panicked: {err}"))??;
        if report.purged > 0 || report.failed > 0 {
            info!(
                purged = report.purged,
                failed = report.failed,
                "recycle sweep finished"
            );
        }
        Ok(report)
    }
}
