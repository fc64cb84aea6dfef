use std::sync::Arc;

use thiserror::Error;

use crate::domain::{Subscription, SubscriptionKey};
use crate::store::{StoreError, SubscriptionStore};
use crate::tasks::{run_digest, DailyScheduler, DigestContext, ScheduleError, ScheduledJob};
use crate::telegram::ChannelResolver;
use crate::validation::{run_chain, standard_chain, Validate, ValidationError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("no subscription matches the given channel and time")]
    UnknownSubscription,
    #[error("validation finished without a resolved channel")]
    Incomplete,
}

/// Orchestrates the subscription lifecycle: validated registration, daily
/// digest scheduling, listing and removal.
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    scheduler: DailyScheduler,
    validators: Vec<Box<dyn Validate>>,
    digest: Arc<DigestContext>,
}

impl SubscriptionService {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        scheduler: DailyScheduler,
        resolver: Arc<dyn ChannelResolver>,
        digest: Arc<DigestContext>,
    ) -> Self {
        Self {
            store,
            scheduler,
            validators: standard_chain(resolver),
            digest,
        }
    }

    /// Handles `/monitor <channel> <HH:MM>`: validate, persist, schedule.
    pub async fn monitor(&self, chat_id: i64, command: &str) -> Result<Subscription, ServiceError> {
        let draft = run_chain(&self.validators, command).await?;
        let mut subscription = draft.finish(chat_id).ok_or(ServiceError::Incomplete)?;
        let key = subscription.key();

        self.store.add(&subscription).await?;

        let handle = match self
            .scheduler
            .register(subscription.sending_time, self.digest_job(key))
            .await
        {
            Ok(handle) => handle,
            Err(err) => {
                if let Err(cleanup) = self.store.delete(key).await {
                    tracing::warn!(
                        target: "subscriptions",
                        error = %cleanup,
                        "failed to drop record after a scheduling error"
                    );
                }
                return Err(err.into());
            }
        };
        subscription.schedule_handle = Some(handle);
        if let Err(err) = self.store.set_schedule_handle(key, handle).await {
            if let Err(cancel) = self.scheduler.cancel(handle).await {
                tracing::warn!(
                    target: "subscriptions",
                    error = %cancel,
                    %handle,
                    "failed to cancel the schedule after a handle persist error"
                );
            }
            if let Err(cleanup) = self.store.delete(key).await {
                tracing::warn!(
                    target: "subscriptions",
                    error = %cleanup,
                    "failed to drop record after a handle persist error"
                );
            }
            return Err(err.into());
        }

        tracing::info!(
            target: "subscriptions",
            chat_id,
            channel = %subscription.channel_username,
            time = %subscription.sending_time,
            "subscription added"
        );
        Ok(subscription)
    }

    /// Handles `/unmonitor <channel> <HH:MM>`: cancel the schedule, then drop
    /// the record.
    pub async fn unmonitor(
        &self,
        chat_id: i64,
        command: &str,
    ) -> Result<Subscription, ServiceError> {
        let draft = run_chain(&self.validators, command).await?;
        let probe = draft.finish(chat_id).ok_or(ServiceError::Incomplete)?;
        let key = probe.key();

        let Some(existing) = self.store.find(key).await? else {
            return Err(ServiceError::UnknownSubscription);
        };

        if let Some(handle) = existing.schedule_handle {
            if let Err(err) = self.scheduler.cancel(handle).await {
                tracing::warn!(
                    target: "subscriptions",
                    error = %err,
                    %handle,
                    "failed to cancel the schedule, removing the record anyway"
                );
            }
        }
        self.store.delete(key).await?;

        tracing::info!(
            target: "subscriptions",
            chat_id,
            channel = %existing.channel_username,
            time = %existing.sending_time,
            "subscription removed"
        );
        Ok(existing)
    }

    pub async fn list(&self, chat_id: i64) -> Result<Vec<Subscription>, ServiceError> {
        Ok(self.store.list_by_chat(chat_id).await?)
    }

    /// Re-registers the daily job of every stored subscription. Called once
    /// at startup; broken records are logged and skipped.
    pub async fn restore_schedules(&self) -> Result<usize, ServiceError> {
        let subscriptions = self.store.list_all().await?;
        let mut restored = 0;
        for subscription in subscriptions {
            let key = subscription.key();
            match self
                .scheduler
                .register(subscription.sending_time, self.digest_job(key))
                .await
            {
                Ok(handle) => {
                    if let Err(err) = self.store.set_schedule_handle(key, handle).await {
                        tracing::warn!(
                            target: "subscriptions",
                            error = %err,
                            channel = %subscription.channel_username,
                            "failed to persist a restored schedule handle"
                        );
                    }
                    restored += 1;
                }
                Err(err) => {
                    tracing::error!(
                        target: "subscriptions",
                        error = %err,
                        chat_id = key.chat_id,
                        channel = %subscription.channel_username,
                        "failed to restore a schedule"
                    );
                }
            }
        }
        Ok(restored)
    }

    fn digest_job(&self, key: SubscriptionKey) -> ScheduledJob {
        let ctx = self.digest.clone();
        Arc::new(move || {
            let ctx = ctx.clone();
            Box::pin(run_digest(ctx, key))
        })
    }
}
