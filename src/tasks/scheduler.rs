use std::sync::Arc;

use chrono_tz::Tz;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use crate::domain::SendingTime;

pub type ScheduledJob = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Error)]
#[error("schedule engine failure: {0}")]
pub struct ScheduleError(#[from] JobSchedulerError);

/// Fires registered jobs once a day at their wall-clock time, interpreted in
/// the configured timezone.
#[derive(Clone)]
pub struct DailyScheduler {
    engine: JobScheduler,
    timezone: Tz,
}

impl DailyScheduler {
    pub async fn new(timezone: Tz) -> Result<Self, ScheduleError> {
        let engine = JobScheduler::new().await?;
        Ok(Self { engine, timezone })
    }

    pub async fn start(&self) -> Result<(), ScheduleError> {
        self.engine.start().await?;
        Ok(())
    }

    /// Registers a daily job and returns the handle needed to cancel it later.
    pub async fn register(
        &self,
        time: SendingTime,
        job: ScheduledJob,
    ) -> Result<Uuid, ScheduleError> {
        let spec = daily_cron_spec(time);
        let cron_job = Job::new_async_tz(spec.as_str(), self.timezone, move |_id, _l| {
            let job = job.clone();
            Box::pin(async move {
                job().await;
            })
        })?;
        let handle = self.engine.add(cron_job).await?;
        tracing::info!(target: "scheduler", cron = %spec, %handle, "daily job registered");
        Ok(handle)
    }

    pub async fn cancel(&self, handle: Uuid) -> Result<(), ScheduleError> {
        self.engine.remove(&handle).await?;
        tracing::info!(target: "scheduler", %handle, "daily job cancelled");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), ScheduleError> {
        self.engine.shutdown().await?;
        Ok(())
    }
}

/// Six-field cron line firing once a day at `time`.
fn daily_cron_spec(time: SendingTime) -> String {
    format!("0 {} {} * * *", time.minute, time.hour)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_daily_cron_line() {
        let time: SendingTime = "09:30".parse().unwrap();
        assert_eq!(daily_cron_spec(time), "0 30 9 * * *");
    }

    #[test]
    fn midnight_maps_to_all_zero_fields() {
        let time: SendingTime = "00:00".parse().unwrap();
        assert_eq!(daily_cron_spec(time), "0 0 0 * * *");
    }

    #[tokio::test]
    async fn register_and_cancel_round_trip() {
        let scheduler = DailyScheduler::new(chrono_tz::UTC).await.unwrap();
        let job: ScheduledJob = Arc::new(|| Box::pin(async {}));

        let handle = scheduler
            .register("23:59".parse().unwrap(), job)
            .await
            .unwrap();
        scheduler.cancel(handle).await.unwrap();
    }
}
