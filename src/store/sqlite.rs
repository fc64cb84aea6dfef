use std::{path::Path, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{query, query_as, FromRow, Row};
use uuid::Uuid;

use crate::domain::{SendingTimeError, Subscription, SubscriptionKey};

use super::{StoreError, SubscriptionStore};

const SELECT_COLUMNS: &str = "s.chat_id, s.channel_id, c.username AS channel_username, \
     s.sending_time, s.last_checked_post_id, s.schedule_handle, s.created_at";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        query(
            r#"
            CREATE TABLE IF NOT EXISTS channel (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id INTEGER NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&pool)
        .await?;

        query(
            r#"
            CREATE TABLE IF NOT EXISTS subscription (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                last_checked_post_id INTEGER NOT NULL DEFAULT -1,
                sending_time TEXT NOT NULL,
                schedule_handle TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (chat_id, channel_id, sending_time),
                FOREIGN KEY (channel_id) REFERENCES channel (channel_id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn add(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO channel (channel_id, username)
            VALUES (?1, ?2)
            ON CONFLICT (channel_id) DO UPDATE SET username = excluded.username
            "#,
        )
        .bind(subscription.channel_id)
        .bind(&subscription.channel_username)
        .execute(&mut *tx)
        .await?;

        query(
            r#"
            INSERT INTO subscription
                (chat_id, channel_id, last_checked_post_id, sending_time, schedule_handle, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(subscription.chat_id)
        .bind(subscription.channel_id)
        .bind(subscription.last_checked_post_id)
        .bind(subscription.sending_time.to_string())
        .bind(subscription.schedule_handle.map(|handle| handle.to_string()))
        .bind(subscription.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, key: SubscriptionKey) -> Result<Option<Subscription>, StoreError> {
        let row = query_as::<_, Subscription>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM subscription s INNER JOIN channel c USING (channel_id)
            WHERE s.chat_id = ?1 AND s.channel_id = ?2 AND s.sending_time = ?3
            "#,
        ))
        .bind(key.chat_id)
        .bind(key.channel_id)
        .bind(key.sending_time.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_by_chat(&self, chat_id: i64) -> Result<Vec<Subscription>, StoreError> {
        let rows = query_as::<_, Subscription>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM subscription s INNER JOIN channel c USING (channel_id)
            WHERE s.chat_id = ?1
            ORDER BY c.username, s.sending_time
            "#,
        ))
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, StoreError> {
        let rows = query_as::<_, Subscription>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM subscription s INNER JOIN channel c USING (channel_id)
            ORDER BY s.id
            "#,
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn advance_watermark(
        &self,
        key: SubscriptionKey,
        post_id: i64,
    ) -> Result<(), StoreError> {
        query(
            r#"
            UPDATE subscription SET last_checked_post_id = ?4
            WHERE chat_id = ?1 AND channel_id = ?2 AND sending_time = ?3
                AND last_checked_post_id < ?4
            "#,
        )
        .bind(key.chat_id)
        .bind(key.channel_id)
        .bind(key.sending_time.to_string())
        .bind(post_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_schedule_handle(
        &self,
        key: SubscriptionKey,
        handle: Uuid,
    ) -> Result<(), StoreError> {
        query(
            r#"
            UPDATE subscription SET schedule_handle = ?4
            WHERE chat_id = ?1 AND channel_id = ?2 AND sending_time = ?3
            "#,
        )
        .bind(key.chat_id)
        .bind(key.channel_id)
        .bind(key.sending_time.to_string())
        .bind(handle.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: SubscriptionKey) -> Result<bool, StoreError> {
        let affected = query(
            r#"
            DELETE FROM subscription
            WHERE chat_id = ?1 AND channel_id = ?2 AND sending_time = ?3
            "#,
        )
        .bind(key.chat_id)
        .bind(key.channel_id)
        .bind(key.sending_time.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
        _ => StoreError::Database(err),
    }
}

impl<'r> FromRow<'r, SqliteRow> for Subscription {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let raw_time: String = row.try_get("sending_time")?;
        let sending_time = raw_time
            .parse()
            .map_err(|err: SendingTimeError| sqlx::Error::ColumnDecode {
                index: "sending_time".into(),
                source: Box::new(err),
            })?;

        let raw_handle: Option<String> = row.try_get("schedule_handle")?;
        let schedule_handle = raw_handle
            .map(|raw| raw.parse::<Uuid>())
            .transpose()
            .map_err(|err| sqlx::Error::ColumnDecode {
                index: "schedule_handle".into(),
                source: Box::new(err),
            })?;

        let created_at: DateTime<Utc> = row.try_get("created_at")?;

        Ok(Self {
            chat_id: row.try_get("chat_id")?,
            channel_id: row.try_get("channel_id")?,
            channel_username: row.try_get("channel_username")?,
            sending_time,
            last_checked_post_id: row.try_get("last_checked_post_id")?,
            schedule_handle,
            created_at,
        })
    }
}
