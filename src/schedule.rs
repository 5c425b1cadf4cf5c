use crate::orchestrator::Orchestrator;
use crate::settings::SettingsStore;
use crate::types::{BriefingSchedule, Result};
use chrono::{DateTime, Days, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How long the scheduler dozes before re-reading a schedule that is
/// switched off or has no computable fire time.
const RECHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Next UTC instant at which one of the configured local times occurs in
/// the schedule's zone, strictly after `now`.
///
/// Checking today and tomorrow covers every case; local times skipped or
/// doubled by DST transitions resolve to the earliest valid instant.
pub fn next_fire_time(schedule: &BriefingSchedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let now_local = now.with_timezone(&schedule.timezone);

    let mut next: Option<DateTime<Utc>> = None;
    for day_offset in 0..2u64 {
        let date = now_local.date_naive().checked_add_days(Days::new(day_offset))?;

        for time in schedule.times {
            let Some(local) = date.and_time(time).and_local_timezone(schedule.timezone).earliest()
            else {
                // This wall-clock time does not exist on this date (DST gap).
                continue;
            };

            let candidate = local.with_timezone(&Utc);
            if candidate > now && next.map_or(true, |best| candidate < best) {
                next = Some(candidate);
            }
        }
    }

    next
}

/// Timer-driven trigger: sleeps until the next configured local time and
/// fires a run of all enabled categories. Manual runs bypass this
/// entirely. The schedule is re-read every cycle so admin edits take
/// effect without a restart.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    settings: Arc<dyn SettingsStore>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            orchestrator,
            settings,
        }
    }

    pub async fn run_forever(&self) -> Result<()> {
        info!("Scheduler started");

        loop {
            let schedule = self.settings.schedule().await?;

            if !schedule.auto_generate {
                tokio::time::sleep(RECHECK_INTERVAL).await;
                continue;
            }

            let now = Utc::now();
            let Some(fire_at) = next_fire_time(&schedule, now) else {
                warn!("No computable fire time, rechecking in {:?}", RECHECK_INTERVAL);
                tokio::time::sleep(RECHECK_INTERVAL).await;
                continue;
            };

            let wait = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
            info!(
                "Next scheduled generation at {} ({}s from now)",
                fire_at,
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;

            // Re-read at fire time: auto-generate may have been switched
            // off while we slept.
            let schedule = self.settings.schedule().await?;
            if !schedule.auto_generate {
                info!("Auto-generation disabled while waiting, skipping run");
                continue;
            }

            match self.orchestrator.run_all().await {
                Ok(reports) => {
                    for report in &reports {
                        info!(
                            "Scheduled run for {}: {:?} in {:?}",
                            report.category, report.outcome, report.elapsed
                        );
                    }
                }
                Err(e) => error!("Scheduled run-all failed: {}", e),
            }
        }
    }
}
