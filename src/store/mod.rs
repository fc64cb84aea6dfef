pub mod snapshot;
pub mod sqlite;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Subscription, SubscriptionKey};

pub use snapshot::SnapshotStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("subscription already exists")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Durable subscription records, keyed by (chat, channel, sending time).
///
/// `advance_watermark` never moves `last_checked_post_id` backwards, so a
/// late writer racing a newer one cannot undo delivered progress.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn add(&self, subscription: &Subscription) -> Result<(), StoreError>;
    async fn find(&self, key: SubscriptionKey) -> Result<Option<Subscription>, StoreError>;
    async fn list_by_chat(&self, chat_id: i64) -> Result<Vec<Subscription>, StoreError>;
    async fn list_all(&self) -> Result<Vec<Subscription>, StoreError>;
    async fn advance_watermark(&self, key: SubscriptionKey, post_id: i64)
        -> Result<(), StoreError>;
    async fn set_schedule_handle(
        &self,
        key: SubscriptionKey,
        handle: Uuid,
    ) -> Result<(), StoreError>;
    /// Returns `false` when no record matched the key.
    async fn delete(&self, key: SubscriptionKey) -> Result<bool, StoreError>;
    async fn close(&self);
}
