//! Configuration types for the widget session core.
//!
//! Everything the orchestrator and controllers need is passed in through
//! [`WidgetConfig`] at construction time; nothing reads global state.

use crate::embed::EmbedConfig;
use crate::error::{Result, WidgetError};
use crate::playback::voice::VoiceSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level widget configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Tenant identifier. Required for every remote call.
    pub business_id: Option<String>,
    /// Remote chat / voice endpoints and their time bounds.
    pub endpoints: EndpointConfig,
    /// Turn-taking and transcript behavior.
    pub conversation: ConversationConfig,
    /// Speech capture gating thresholds.
    pub capture: CaptureConfig,
    /// Reply playback settings.
    pub playback: PlaybackConfig,
    /// Initial voice settings for synthesis.
    pub voice: VoiceSettings,
}

/// Remote endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Chat completion endpoint (receives `ChatRequest` as JSON).
    pub chat_url: String,
    /// Voice synthesis endpoint. `None` skips straight to on-device speech.
    pub voice_url: Option<String>,
    /// Upper bound for one chat round-trip, in milliseconds.
    pub chat_timeout_ms: u64,
    /// Upper bound for one synthesis round-trip, in milliseconds.
    pub voice_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            chat_url: "http://localhost:5000/api/chat".to_owned(),
            voice_url: Some("http://localhost:5000/api/voice".to_owned()),
            chat_timeout_ms: 15_000,
            voice_timeout_ms: 10_000,
        }
    }
}

impl EndpointConfig {
    /// Chat timeout as a [`Duration`].
    pub fn chat_timeout(&self) -> Duration {
        Duration::from_millis(self.chat_timeout_ms)
    }

    /// Voice timeout as a [`Duration`].
    pub fn voice_timeout(&self) -> Duration {
        Duration::from_millis(self.voice_timeout_ms)
    }
}

/// Which input channel the conversation is using.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationMode {
    /// Spoken input, spoken replies, capture re-armed after each reply.
    Voice,
    /// Typed input only.
    #[default]
    Text,
}

/// Conversation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Number of recent turns sent as `recentMessages` context.
    pub recent_messages_limit: usize,
    /// Clear the visible transcript when switching between voice and text.
    pub clear_transcript_on_mode_switch: bool,
    /// Speak assistant replies while in text mode.
    pub speak_replies_in_text_mode: bool,
    /// Mode the widget starts in.
    pub initial_mode: ConversationMode,
    /// Optional persona hint forwarded to the chat backend.
    pub persona: Option<String>,
    /// Optional language hint forwarded to the chat backend.
    pub language: Option<String>,
    /// Assistant turn appended to the transcript when a chat call fails.
    pub error_message: String,
    /// Phrase spoken when a chat call fails.
    pub apology_message: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            recent_messages_limit: 10,
            clear_transcript_on_mode_switch: false,
            speak_replies_in_text_mode: true,
            initial_mode: ConversationMode::Text,
            persona: None,
            language: None,
            error_message: "Sorry, I couldn't reach the assistant just now. Please try again."
                .to_owned(),
            apology_message: "I'm having trouble connecting right now. Please try again."
                .to_owned(),
        }
    }
}

/// Speech capture gating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Silence after the last transcript update that ends an utterance, in ms.
    pub silence_timeout_ms: u64,
    /// Minimum time spent listening before an utterance counts, in ms.
    pub min_listen_duration_ms: u64,
    /// Minimum trimmed transcript length, in characters.
    pub min_transcript_chars: usize,
    /// Consecutive engine auto-restarts allowed without any transcript.
    pub max_auto_restarts: u32,
    /// Recognition locale.
    pub language: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            silence_timeout_ms: 100,
            min_listen_duration_ms: 200,
            min_transcript_chars: 2,
            max_auto_restarts: 5,
            language: "en-US".to_owned(),
        }
    }
}

impl CaptureConfig {
    /// Silence timeout as a [`Duration`].
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    /// Minimum listen duration as a [`Duration`].
    pub fn min_listen_duration(&self) -> Duration {
        Duration::from_millis(self.min_listen_duration_ms)
    }
}

/// Reply playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Upper bound for playing one reply, in milliseconds.
    pub max_playback_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_playback_ms: 120_000,
        }
    }
}

impl PlaybackConfig {
    /// Playback bound as a [`Duration`].
    pub fn max_playback(&self) -> Duration {
        Duration::from_millis(self.max_playback_ms)
    }
}

impl WidgetConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| WidgetError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| WidgetError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file location.
    pub fn default_config_path() -> PathBuf {
        crate::widget_dirs::config_file()
    }

    /// The configured business id, if present and non-blank.
    pub fn business_id(&self) -> Option<&str> {
        self.business_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Overlay the host page's embed object on top of this config.
    pub fn apply_embed(&mut self, embed: &EmbedConfig) {
        self.business_id = Some(embed.business_id.clone());
        if let Some(ref url) = embed.backend_url {
            self.endpoints.chat_url = url.clone();
        }
        if let Some(ref url) = embed.voice_backend_url {
            self.endpoints.voice_url = Some(url.clone());
        }
        if embed.persona.is_some() {
            self.conversation.persona = embed.persona.clone();
        }
        if let Some(ref language) = embed.language {
            self.conversation.language = Some(language.clone());
            self.voice.language = language.clone();
        }
    }

    /// Check the config for problems that would doom every conversation.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::Config`] for a missing business id, an
    /// unparseable endpoint URL, or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.business_id().is_none() {
            return Err(WidgetError::Config(
                "businessId is required; the widget is not configured".to_owned(),
            ));
        }
        validate_url("chat_url", &self.endpoints.chat_url)?;
        if let Some(ref voice_url) = self.endpoints.voice_url {
            validate_url("voice_url", voice_url)?;
        }
        if self.endpoints.chat_timeout_ms == 0 || self.endpoints.voice_timeout_ms == 0 {
            return Err(WidgetError::Config(
                "endpoint timeouts must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

fn validate_url(field: &str, raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| WidgetError::Config(format!("{field} '{raw}' is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(WidgetError::Config(format!(
            "{field} must use http or https, got '{other}'"
        ))),
    }
}
