//! HTTP client for the voice synthesis endpoint.

use super::{AudioClip, FallbackHint, SpeechSynthesizer, SynthesisOutcome, SynthesisRequest};
use crate::error::{Result, WidgetError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Longest response body kept in an HTTP error.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// JSON answer from the voice endpoint when it has no audio for us.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FallbackBody {
    voice_id: Option<String>,
    provider: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Audio,
    Json,
    Other,
}

fn classify_content_type(content_type: &str) -> BodyKind {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if mime.starts_with("audio/") || mime == "application/octet-stream" {
        BodyKind::Audio
    } else if mime == "application/json" || mime.ends_with("+json") {
        BodyKind::Json
    } else {
        BodyKind::Other
    }
}

/// Voice endpoint client.
#[derive(Debug, Clone)]
pub struct HttpVoiceClient {
    url: String,
    client: reqwest::Client,
}

impl HttpVoiceClient {
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
impl SpeechSynthesizer for HttpVoiceClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutcome> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| WidgetError::from_reqwest("voice request failed", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WidgetError::Http {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_owned();

        match classify_content_type(&content_type) {
            BodyKind::Audio => {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| WidgetError::from_reqwest("voice audio body", &e))?;
                debug!(content_type = %content_type, bytes = bytes.len(), "voice audio received");
                Ok(SynthesisOutcome::Audio(AudioClip {
                    bytes,
                    content_type,
                }))
            }
            BodyKind::Json => {
                let text = resp.text().await.unwrap_or_default();
                let body: FallbackBody = serde_json::from_str(&text).unwrap_or_else(|e| {
                    debug!(error = %e, "unparseable voice fallback body");
                    FallbackBody::default()
                });
                Ok(SynthesisOutcome::Fallback(FallbackHint {
                    voice_id: body.voice_id,
                    provider: body.provider,
                }))
            }
            BodyKind::Other => {
                debug!(content_type = %content_type, "voice response is not audio");
                Ok(SynthesisOutcome::Fallback(FallbackHint::default()))
            }
        }
    }
}
