//! HTTP client for the chat endpoint.

use super::{ChatRequest, ChatService, extract_reply};
use crate::error::{Result, WidgetError};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest response body kept in an HTTP error.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Chat endpoint client.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    url: String,
    client: reqwest::Client,
}

impl HttpChatClient {
    /// Create a client posting to `url`, bounded by `timeout` per request.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            client,
        }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatService for HttpChatClient {
    async fn send(&self, request: &ChatRequest) -> Result<String> {
        let start = Instant::now();
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| WidgetError::from_reqwest("chat request failed", &e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| WidgetError::from_reqwest("chat response body", &e))?;

        if !status.is_success() {
            return Err(WidgetError::Http {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let json: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| WidgetError::Protocol(format!("chat response is not JSON: {e}")))?;
        let reply = extract_reply(&json)?;
        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            reply_chars = reply.chars().count(),
            "chat reply received"
        );
        Ok(reply)
    }
}
