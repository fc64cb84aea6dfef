use async_trait::async_trait;
use reqwest::Client;

use crate::config::OpenRouterConfig;

use super::inference::{OPENROUTER_API_URL, build_request, parse_response};
use super::{Summarizer, SummaryError};

#[derive(Clone)]
pub struct OpenRouterClient {
    http: Client,
    config: OpenRouterConfig,
}

impl OpenRouterClient {
    pub fn new(http: Client, config: OpenRouterConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl Summarizer for OpenRouterClient {
    async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
        let request = build_request(self.config.model.clone(), text);
        let response = self
            .http
            .post(OPENROUTER_API_URL)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.request_timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SummaryError::Status(status));
        }

        parse_response(response).await
    }
}
