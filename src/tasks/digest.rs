use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::ai::{Summarizer, SummaryError};
use crate::domain::SubscriptionKey;
use crate::store::{StoreError, SubscriptionStore};
use crate::telegram::{FetchError, Notifier, NotifyError, PostFetcher};

/// Upper bound on one digest run, fetch to delivery.
pub const DIGEST_DEADLINE: Duration = Duration::from_secs(120);

const DIGEST_HEADER: &str = "Самые важные новости таковы:\n\n";

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("subscription record disappeared")]
    Gone,
    #[error("post fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("summarization failed: {0}")]
    Summarize(#[from] SummaryError),
    #[error("delivery failed: {0}")]
    Notify(#[from] NotifyError),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, PartialEq, Eq)]
enum DigestOutcome {
    Delivered { posts: usize, watermark: i64 },
    NoNewPosts,
}

/// Collaborators a digest run needs, shared by every scheduled job.
pub struct DigestContext {
    store: Arc<dyn SubscriptionStore>,
    fetcher: Arc<dyn PostFetcher>,
    summarizer: Arc<dyn Summarizer>,
    notifier: Arc<dyn Notifier>,
    in_flight: Mutex<HashSet<SubscriptionKey>>,
}

impl DigestContext {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        fetcher: Arc<dyn PostFetcher>,
        summarizer: Arc<dyn Summarizer>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            fetcher,
            summarizer,
            notifier,
            in_flight: Mutex::new(HashSet::new()),
        })
    }
}

/// Scheduler entry point: one watermarked fetch-summarize-deliver pass.
///
/// Runs for the same subscription never overlap; a trigger that finds the
/// previous run still going returns immediately. Failures are logged and
/// swallowed, leaving the watermark where it was so the next trigger covers
/// the same span again.
pub async fn run_digest(ctx: Arc<DigestContext>, key: SubscriptionKey) {
    let Some(_guard) = RunGuard::acquire(&ctx, key) else {
        tracing::warn!(
            target: "digest",
            chat_id = key.chat_id,
            channel_id = key.channel_id,
            "previous digest run still in flight, skipping"
        );
        return;
    };

    match tokio::time::timeout(DIGEST_DEADLINE, digest_once(&ctx, key)).await {
        Ok(Ok(DigestOutcome::Delivered { posts, watermark })) => {
            tracing::info!(
                target: "digest",
                chat_id = key.chat_id,
                channel_id = key.channel_id,
                posts,
                watermark,
                "digest delivered"
            );
        }
        Ok(Ok(DigestOutcome::NoNewPosts)) => {
            tracing::info!(
                target: "digest",
                chat_id = key.chat_id,
                channel_id = key.channel_id,
                "no new posts since last check"
            );
        }
        Ok(Err(err)) => {
            tracing::error!(
                target: "digest",
                chat_id = key.chat_id,
                channel_id = key.channel_id,
                error = %err,
                "digest run failed"
            );
        }
        Err(_) => {
            tracing::error!(
                target: "digest",
                chat_id = key.chat_id,
                channel_id = key.channel_id,
                deadline_secs = DIGEST_DEADLINE.as_secs(),
                "digest run exceeded its deadline"
            );
        }
    }
}

async fn digest_once(
    ctx: &DigestContext,
    key: SubscriptionKey,
) -> Result<DigestOutcome, DigestError> {
    // Re-read the record so a run scheduled long ago sees current state.
    let Some(subscription) = ctx.store.find(key).await? else {
        return Err(DigestError::Gone);
    };

    let posts = ctx
        .fetcher
        .posts_since(
            &subscription.channel_username,
            subscription.last_checked_post_id,
        )
        .await?;
    let Some(newest) = posts.first() else {
        return Ok(DigestOutcome::NoNewPosts);
    };
    let watermark = newest.id;

    let mut combined = String::new();
    for post in &posts {
        combined.push_str(&post.text);
        combined.push('\n');
    }

    let summary = ctx.summarizer.summarize(&combined).await?;
    ctx.notifier
        .send_text(subscription.chat_id, &format!("{DIGEST_HEADER}{summary}"))
        .await?;

    // The watermark moves only once the user has the summary in hand.
    ctx.store.advance_watermark(key, watermark).await?;

    Ok(DigestOutcome::Delivered {
        posts: posts.len(),
        watermark,
    })
}

struct RunGuard<'a> {
    in_flight: &'a Mutex<HashSet<SubscriptionKey>>,
    key: SubscriptionKey,
}

impl<'a> RunGuard<'a> {
    fn acquire(ctx: &'a DigestContext, key: SubscriptionKey) -> Option<Self> {
        ctx.in_flight.lock().insert(key).then(|| Self {
            in_flight: &ctx.in_flight,
            key,
        })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}
