pub mod client;
mod inference;

pub use client::OpenRouterClient;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("summarization request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("summarization service returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("summarization service returned no choices")]
    Empty,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, SummaryError>;
}
