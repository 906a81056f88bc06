//! Reply playback: remote synthesis first, on-device speech as fallback.
//!
//! [`PlaybackController::speak`] asks the remote [`SpeechSynthesizer`] for
//! audio and plays it through an [`AudioSink`]. When the remote path yields
//! nothing playable (error, JSON answer, empty body, sink failure) the text
//! is spoken by the [`LocalSynthesizer`] instead. Every `speak` cancels the
//! one before it.

pub mod http;
#[cfg(feature = "native-audio")]
pub mod native;
pub mod system;
pub mod voice;

use crate::config::PlaybackConfig;
use crate::error::{Result, WidgetError};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use voice::{LocalVoiceParams, VoiceSettings};

/// Body of a synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub text: String,
    pub language: String,
    pub gender: String,
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaking_speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
}

impl SynthesisRequest {
    /// Build a request from the text and the current settings.
    pub fn new(text: impl Into<String>, settings: &VoiceSettings) -> Self {
        Self {
            text: text.into(),
            language: settings.language.clone(),
            gender: settings.gender.clone(),
            style: settings.style.clone(),
            speaking_speed: settings.speaking_speed,
            pitch: settings.pitch,
        }
    }
}

/// Encoded audio returned by the voice service.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub bytes: Bytes,
    /// MIME type as reported by the service (`audio/mpeg`).
    pub content_type: String,
}

/// Hints carried by a non-audio voice response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackHint {
    /// Locale the service suggests for on-device speech.
    pub voice_id: Option<String>,
    /// Provider the service would have used.
    pub provider: Option<String>,
}

/// What the voice service answered with.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    /// Playable audio.
    Audio(AudioClip),
    /// No audio; speak locally.
    Fallback(FallbackHint),
}

/// Remote text-to-speech service.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutcome>;
}

/// Output device for encoded audio.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play the clip, resolving once playback has finished.
    async fn play(&self, clip: &AudioClip) -> Result<()>;

    /// Halt whatever is currently playing.
    fn stop(&self);
}

/// On-device speech synthesizer.
#[async_trait]
pub trait LocalSynthesizer: Send + Sync {
    /// Speak the text, resolving once speech has finished.
    async fn speak(&self, text: &str, params: &LocalVoiceParams) -> Result<()>;

    /// Halt current speech.
    fn cancel(&self);
}

/// Which path produced the audible reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSource {
    Remote,
    Local,
}

/// Result of one [`PlaybackController::speak`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Playback ran to completion.
    Completed(PlaybackSource),
    /// Superseded by a newer `speak` or halted by `stop`.
    Cancelled,
    /// Neither path could produce audio.
    Failed(String),
}

/// Output slot handed out by [`PlaybackController::prepare`].
#[derive(Debug)]
pub struct PlaybackTicket {
    generation: u64,
    token: CancellationToken,
}

struct ActivePlayback {
    generation: u64,
    token: CancellationToken,
}

/// Owns the audio output. At most one utterance plays at a time.
pub struct PlaybackController {
    remote: Option<Arc<dyn SpeechSynthesizer>>,
    sink: Arc<dyn AudioSink>,
    local: Arc<dyn LocalSynthesizer>,
    voice_timeout: Duration,
    max_playback: Duration,
    generation: AtomicU64,
    active: Mutex<Option<ActivePlayback>>,
}

impl PlaybackController {
    /// Create a controller.
    ///
    /// `remote = None` skips the voice service and always speaks locally.
    pub fn new(
        remote: Option<Arc<dyn SpeechSynthesizer>>,
        sink: Arc<dyn AudioSink>,
        local: Arc<dyn LocalSynthesizer>,
        config: &PlaybackConfig,
        voice_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            sink,
            local,
            voice_timeout,
            max_playback: config.max_playback(),
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// Whether an utterance is currently playing.
    pub fn is_playing(&self) -> bool {
        self.active.lock().map(|a| a.is_some()).unwrap_or(false)
    }

    /// Speak `text`, cancelling anything already playing.
    pub async fn speak(&self, text: &str, settings: &VoiceSettings) -> PlaybackOutcome {
        let ticket = self.prepare();
        self.speak_prepared(ticket, text, settings).await
    }

    /// Reserve the output now, cancelling anything already playing.
    ///
    /// A [`stop`](Self::stop) between `prepare` and
    /// [`speak_prepared`](Self::speak_prepared) cancels the reserved
    /// utterance before any audio is produced.
    pub fn prepare(&self) -> PlaybackTicket {
        let (generation, token) = self.begin();
        PlaybackTicket { generation, token }
    }

    /// Speak `text` in a slot reserved by [`prepare`](Self::prepare).
    pub async fn speak_prepared(
        &self,
        ticket: PlaybackTicket,
        text: &str,
        settings: &VoiceSettings,
    ) -> PlaybackOutcome {
        let PlaybackTicket { generation, token } = ticket;
        debug!(generation, chars = text.chars().count(), "playback started");

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => PlaybackOutcome::Cancelled,
            rendered = tokio::time::timeout(self.max_playback, self.render(text, settings, &token)) => {
                match rendered {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(generation, "playback exceeded {:?}, halting", self.max_playback);
                        self.halt_output();
                        PlaybackOutcome::Failed("playback timed out".to_owned())
                    }
                }
            }
        };

        self.finish(generation);
        debug!(generation, ?outcome, "playback finished");
        outcome
    }

    /// Cancel current playback, if any.
    pub fn stop(&self) {
        let previous = match self.active.lock() {
            Ok(mut active) => active.take(),
            Err(_) => None,
        };
        if let Some(previous) = previous {
            debug!(generation = previous.generation, "playback stopped");
            previous.token.cancel();
            self.halt_output();
        }
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let previous = match self.active.lock() {
            Ok(mut active) => active.replace(ActivePlayback {
                generation,
                token: token.clone(),
            }),
            Err(_) => None,
        };
        if let Some(previous) = previous {
            debug!(
                superseded = previous.generation,
                generation, "cancelling previous playback"
            );
            previous.token.cancel();
            self.halt_output();
        }
        (generation, token)
    }

    fn finish(&self, generation: u64) {
        if let Ok(mut active) = self.active.lock() {
            if active.as_ref().is_some_and(|a| a.generation == generation) {
                *active = None;
            }
        }
    }

    fn halt_output(&self) {
        self.sink.stop();
        self.local.cancel();
    }

    async fn render(
        &self,
        text: &str,
        settings: &VoiceSettings,
        token: &CancellationToken,
    ) -> PlaybackOutcome {
        let hint = match self.fetch_remote(text, settings).await {
            Ok(SynthesisOutcome::Audio(clip)) => {
                match self.sink.play(&clip).await {
                    Ok(()) => return PlaybackOutcome::Completed(PlaybackSource::Remote),
                    Err(e) => {
                        warn!(error = %e, "remote audio failed to play, speaking locally");
                    }
                }
                FallbackHint::default()
            }
            Ok(SynthesisOutcome::Fallback(hint)) => {
                info!(
                    voice_id = hint.voice_id.as_deref().unwrap_or(""),
                    provider = hint.provider.as_deref().unwrap_or(""),
                    "voice service requested on-device speech"
                );
                hint
            }
            Err(e) => {
                warn!(error = %e, error_code = e.code(), "voice service unavailable, speaking locally");
                FallbackHint::default()
            }
        };

        if token.is_cancelled() {
            return PlaybackOutcome::Cancelled;
        }

        let params = LocalVoiceParams::from_settings(settings, hint.voice_id.as_deref());
        match self.local.speak(text, &params).await {
            Ok(()) => PlaybackOutcome::Completed(PlaybackSource::Local),
            Err(e) => {
                warn!(error = %e, "on-device speech failed");
                PlaybackOutcome::Failed(e.to_string())
            }
        }
    }

    async fn fetch_remote(&self, text: &str, settings: &VoiceSettings) -> Result<SynthesisOutcome> {
        let Some(remote) = &self.remote else {
            return Ok(SynthesisOutcome::Fallback(FallbackHint::default()));
        };
        let request = SynthesisRequest::new(text, settings);
        let outcome = tokio::time::timeout(self.voice_timeout, remote.synthesize(&request))
            .await
            .map_err(|_| {
                WidgetError::Timeout(format!(
                    "voice synthesis exceeded {} ms",
                    self.voice_timeout.as_millis()
                ))
            })??;
        match outcome {
            SynthesisOutcome::Audio(clip) if clip.bytes.is_empty() => {
                debug!("voice service returned an empty audio body");
                Ok(SynthesisOutcome::Fallback(FallbackHint::default()))
            }
            other => Ok(other),
        }
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("remote", &self.remote.is_some())
            .field("voice_timeout", &self.voice_timeout)
            .field("max_playback", &self.max_playback)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

/// Sink for builds without an audio device; always fails so speech goes local.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudioSink;

#[async_trait]
impl AudioSink for NullAudioSink {
    async fn play(&self, _clip: &AudioClip) -> Result<()> {
        Err(WidgetError::Unsupported(
            "no audio output device available".to_owned(),
        ))
    }

    fn stop(&self) {}
}
