//! Recurring jobs.
//!
//! Registers the daily broadcast with a [`JobScheduler`] running in the
//! configured home timezone.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use weather_mailer_core::{NotificationScheduler, config::ScheduleConfig};

/// Builds and starts the job scheduler with the daily broadcast registered.
///
/// The returned handle must be kept alive for the lifetime of the process;
/// dropping it stops the job.
pub async fn build_job_scheduler(
    scheduler: Arc<NotificationScheduler>,
    schedule: &ScheduleConfig,
) -> anyhow::Result<JobScheduler> {
    let cron = schedule.daily_cron()?;
    let jobs = JobScheduler::new().await?;

    let job = Job::new_async_tz(cron.as_str(), schedule.timezone, move |_uuid, _lock| {
        let scheduler = Arc::clone(&scheduler);

        Box::pin(async move {
            tracing::info!("scheduler: starting daily broadcast");
            let report = scheduler.run_daily_broadcast().await;
            tracing::info!(?report, "scheduler: daily broadcast finished");
        })
    })?;

    jobs.add(job).await?;
    jobs.start().await?;

    tracing::info!(
        time = %schedule.daily_time,
        timezone = %schedule.timezone,
        "daily broadcast registered"
    );
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weather_mailer_core::{
        ForecastClient, SchedulerSettings, SubscriberList,
        testing::{FakeGeocoder, FakeProvider, MemoryStore, RecordingMailer},
    };

    fn scheduler() -> Arc<NotificationScheduler> {
        Arc::new(NotificationScheduler::new(
            Arc::new(SubscriberList::new(Arc::new(MemoryStore::default()))),
            ForecastClient::new(Arc::new(FakeProvider::failing()), Arc::new(FakeGeocoder::failing())),
            Arc::new(RecordingMailer::default()),
            SchedulerSettings::default(),
        ))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn daily_job_registers_with_default_schedule() {
        let mut jobs = build_job_scheduler(scheduler(), &ScheduleConfig::default())
            .await
            .expect("job scheduler should start");
        jobs.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn invalid_daily_time_is_rejected() {
        let schedule = ScheduleConfig { daily_time: "25:99".into(), ..Default::default() };
        assert!(build_job_scheduler(scheduler(), &schedule).await.is_err());
    }
}
