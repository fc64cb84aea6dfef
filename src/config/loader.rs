use std::env;
use std::time::Duration;

use chrono_tz::Tz;

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, LoggingConfig, OpenRouterConfig, PreviewConfig,
    StorageBackend, StorageConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let openrouter = OpenRouterConfig {
            api_key: env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?,
            model: env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| "deepseek/deepseek-chat-v3.1:free".to_string()),
            request_timeout: Duration::from_millis(parse_u64("OPENROUTER_TIMEOUT").unwrap_or(60_000)),
        };

        let backend = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("snapshot") => StorageBackend::Snapshot,
            Ok("sqlite") | Err(_) => StorageBackend::Sqlite,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let storage = StorageConfig {
            backend,
            db_filename: env::var("DB_FILENAME").unwrap_or_else(|_| "subscriptions.db".to_string()),
            snapshot_filename: env::var("SNAPSHOT_FILENAME")
                .unwrap_or_else(|_| "subscriptions.json".to_string()),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let raw_timezone = env::var("BOT_TIMEZONE").unwrap_or_else(|_| "Europe/Moscow".to_string());
        let timezone = raw_timezone.parse::<Tz>().map_err(|_| ConfigError::Invalid {
            key: "BOT_TIMEZONE",
            value: raw_timezone,
        })?;

        let preview = PreviewConfig {
            fetch_timeout: Duration::from_millis(parse_u64("PREVIEW_FETCH_TIMEOUT").unwrap_or(30_000)),
            max_posts: parse_u64("PREVIEW_MAX_POSTS").unwrap_or(30) as usize,
        };

        Ok(Self {
            telegram_bot_token,
            openrouter,
            storage,
            directories,
            logging,
            timezone,
            preview,
        })
    }
}

fn parse_u64(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
}
