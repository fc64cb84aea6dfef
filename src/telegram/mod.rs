pub mod bot_api;
pub mod channel_preview;
pub mod handler;
pub mod types;

pub use bot_api::BotApiClient;
pub use channel_preview::PreviewClient;
pub use handler::TelegramService;

use async_trait::async_trait;

use crate::domain::{ChannelIdentity, ChannelPost};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no public channel named @{0}")]
    NotFound(String),
    #[error("channel lookup failed: {0}")]
    Api(#[from] teloxide::RequestError),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("preview request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("preview page returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("message delivery failed: {0}")]
    Api(#[from] teloxide::RequestError),
}

/// Resolves a public channel handle to its identity.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    async fn resolve(&self, username: &str) -> Result<ChannelIdentity, ResolveError>;
}

/// Reads channel posts strictly newer than a watermark, most recent first,
/// with empty-text posts dropped.
#[async_trait]
pub trait PostFetcher: Send + Sync {
    async fn posts_since(
        &self,
        username: &str,
        after_post_id: i64,
    ) -> Result<Vec<ChannelPost>, FetchError>;
}

/// Delivers a text message to a chat, returning the platform message id.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i32, NotifyError>;
}
