use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};

use super::tasks::{run_role_sync, run_verification_pass, run_voice_reconcile};
use super::{Schedule, ScheduleType};
use crate::models::{Data, Error};

/// Start the schedule manager that runs the background jobs on their cron
pub fn start_schedule_manager(http: Arc<serenity::Http>, cache: Arc<serenity::Cache>, data: Data) {
    let schedules = Schedule::from_config(&data.config);
    let tz = data.config.schedule_timezone;

    tokio::spawn(async move {
        info!("Schedule manager started ({} jobs, timezone {})", schedules.len(), tz);

        loop {
            let Some((schedule, wait_duration)) = find_next_schedule(&schedules, tz, Utc::now())
            else {
                warn!("No upcoming schedule found, schedule manager stopping");
                break;
            };

            info!(
                "Next {:?} job will run in {} minutes",
                schedule.schedule_type,
                wait_duration.as_secs() / 60
            );

            sleep(wait_duration).await;

            if let Err(e) = run_schedule(&http, &cache, &data, schedule.schedule_type).await {
                error!("Failed to run {:?} job: {}", schedule.schedule_type, e);
            }
        }

        info!("Schedule manager stopped");
    });
}

/// Find the next schedule to run and how long to wait for it
fn find_next_schedule(
    schedules: &[Schedule],
    tz: Tz,
    now: DateTime<Utc>,
) -> Option<(&Schedule, Duration)> {
    let local_now = now.with_timezone(&tz);

    schedules
        .iter()
        .filter_map(|schedule| {
            let next_time = schedule.cron.after(&local_now).next().or_else(|| {
                warn!("No upcoming time found for {:?} job", schedule.schedule_type);
                None
            })?;

            let wait_duration = (next_time.with_timezone(&Utc) - now)
                .to_std()
                .unwrap_or(Duration::ZERO);

            Some((schedule, wait_duration))
        })
        .min_by_key(|(_, duration)| *duration)
}

/// Run a scheduled job based on its type
async fn run_schedule(
    http: &Arc<serenity::Http>,
    cache: &Arc<serenity::Cache>,
    data: &Data,
    schedule_type: ScheduleType,
) -> Result<(), Error> {
    match schedule_type {
        ScheduleType::VerificationPass => run_verification_pass(data).await,
        ScheduleType::RoleSync => run_role_sync(http, cache, data).await,
        ScheduleType::VoiceReconcile => run_voice_reconcile(http, cache, data).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn schedule(schedule_type: ScheduleType, cron: &str) -> Schedule {
        Schedule {
            schedule_type,
            cron: cron::Schedule::from_str(cron).unwrap(),
        }
    }

    #[test]
    fn test_picks_earliest_job() {
        let schedules = vec![
            schedule(ScheduleType::VerificationPass, "0 0 */6 * * *"),
            schedule(ScheduleType::VoiceReconcile, "0 */15 * * * *"),
        ];
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 5, 0).unwrap();

        let (next, wait) = find_next_schedule(&schedules, Tz::UTC, now).unwrap();
        assert_eq!(next.schedule_type, ScheduleType::VoiceReconcile);
        assert_eq!(wait, Duration::from_secs(10 * 60));
    }

    #[test]
    fn test_evaluates_cron_in_timezone() {
        // 03:00 in Paris is 02:00 UTC in winter
        let schedules = vec![schedule(ScheduleType::RoleSync, "0 0 3 * * *")];
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap();

        let (_, wait) = find_next_schedule(&schedules, Tz::Europe__Paris, now).unwrap();
        assert_eq!(wait, Duration::from_secs(60 * 60));
    }

    #[test]
    fn test_no_schedules() {
        assert!(find_next_schedule(&[], Tz::UTC, Utc::now()).is_none());
    }
}
