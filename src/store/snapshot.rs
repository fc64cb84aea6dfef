use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Subscription, SubscriptionKey};

use super::{StoreError, SubscriptionStore};

/// File-backed store: the full record set lives in memory and every mutation
/// rewrites the snapshot through a temp file, fsync and rename, so a crash
/// leaves either the old or the new file, never a torn one. Mutations hold
/// the record lock across the rewrite, which keeps snapshots on disk in
/// mutation order; the write itself runs on the blocking pool.
pub struct SnapshotStore {
    path: PathBuf,
    records: Mutex<Vec<Subscription>>,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let records = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    async fn persist(&self, records: &[Subscription]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &bytes))
            .await
            .map_err(|err| StoreError::Io(std::io::Error::other(err)))?
    }
}

fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[async_trait]
impl SubscriptionStore for SnapshotStore {
    async fn add(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if records.iter().any(|existing| existing.key() == subscription.key()) {
            return Err(StoreError::Duplicate);
        }
        // Keep usernames in step with the latest resolution of the channel.
        for existing in records.iter_mut() {
            if existing.channel_id == subscription.channel_id {
                existing.channel_username = subscription.channel_username.clone();
            }
        }
        records.push(subscription.clone());
        self.persist(&records).await
    }

    async fn find(&self, key: SubscriptionKey) -> Result<Option<Subscription>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.iter().find(|sub| sub.key() == key).cloned())
    }

    async fn list_by_chat(&self, chat_id: i64) -> Result<Vec<Subscription>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|sub| sub.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.clone())
    }

    async fn advance_watermark(
        &self,
        key: SubscriptionKey,
        post_id: i64,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|sub| sub.key() == key) else {
            return Ok(());
        };
        if record.last_checked_post_id >= post_id {
            return Ok(());
        }
        record.last_checked_post_id = post_id;
        self.persist(&records).await
    }

    async fn set_schedule_handle(
        &self,
        key: SubscriptionKey,
        handle: Uuid,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|sub| sub.key() == key) else {
            return Ok(());
        };
        record.schedule_handle = Some(handle);
        self.persist(&records).await
    }

    async fn delete(&self, key: SubscriptionKey) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|sub| sub.key() != key);
        if records.len() == before {
            return Ok(false);
        }
        self.persist(&records).await?;
        Ok(true)
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NO_POSTS_CHECKED;
    use chrono::Utc;

    fn subscription(chat_id: i64, channel_id: i64, username: &str, time: &str) -> Subscription {
        Subscription {
            chat_id,
            channel_id,
            channel_username: username.to_string(),
            sending_time: time.parse().unwrap(),
            last_checked_post_id: NO_POSTS_CHECKED,
            schedule_handle: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn add_find_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&dir.path().join("subs.json")).unwrap();

        let sub = subscription(1, 100, "news_channel", "09:30");
        store.add(&sub).await.unwrap();

        let found = store.find(sub.key()).await.unwrap().unwrap();
        assert_eq!(found.channel_username, "news_channel");

        assert!(store.delete(sub.key()).await.unwrap());
        assert!(!store.delete(sub.key()).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&dir.path().join("subs.json")).unwrap();

        let sub = subscription(1, 100, "news_channel", "09:30");
        store.add(&sub).await.unwrap();
        let err = store.add(&sub).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn watermark_only_moves_forward() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&dir.path().join("subs.json")).unwrap();

        let sub = subscription(1, 100, "news_channel", "09:30");
        store.add(&sub).await.unwrap();

        store.advance_watermark(sub.key(), 105).await.unwrap();
        store.advance_watermark(sub.key(), 101).await.unwrap();

        let found = store.find(sub.key()).await.unwrap().unwrap();
        assert_eq!(found.last_checked_post_id, 105);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.json");

        {
            let store = SnapshotStore::open(&path).unwrap();
            let sub = subscription(1, 100, "news_channel", "09:30");
            store.add(&sub).await.unwrap();
            store.advance_watermark(sub.key(), 42).await.unwrap();
        }

        let reopened = SnapshotStore::open(&path).unwrap();
        let all = reopened.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].last_checked_post_id, 42);
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&dir.path().join("absent.json")).unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
