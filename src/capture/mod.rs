//! Speech capture controller.
//!
//! Wraps a continuous speech recognition engine and turns its stream of
//! partial transcripts into at most one finalized utterance per listening
//! window, using a silence cutoff plus duration and length gates.
//!
//! State machine:
//!
//! ```text
//! Stopped ──activate──► Starting ──Started──► Active
//!    ▲                                          │ silence elapsed, transcript non-empty
//!    │                                          ▼
//!    └──────────── gates pass ◄──────────── Finalizing ──gates fail──► Active (discard)
//! ```
//!
//! Time is passed in explicitly (`now: Instant`) so the gate logic is
//! deterministic; the orchestrator's voice loop owns the real timers.
//!
//! Every engine start is tagged with a generation number. Events carrying an
//! older generation are ignored, so a late `Ended` from a stopped session can
//! never trigger a second start.

use crate::config::CaptureConfig;
use crate::error::{Result, WidgetError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Parameters handed to the engine on every start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Keep recognizing across pauses.
    pub continuous: bool,
    /// Emit partial transcripts.
    pub interim_results: bool,
    /// Recognition locale (e.g. `en-US`).
    pub language: String,
    /// Tag the engine must attach to every event of this session.
    pub generation: u64,
}

/// A continuous speech-to-text engine.
///
/// `start` and `stop` must not block; results arrive asynchronously as
/// [`RecognitionEvent`]s tagged with the generation passed to `start`.
pub trait RecognitionEngine: Send {
    /// Begin a recognition session.
    ///
    /// # Errors
    ///
    /// [`WidgetError::Permission`] when microphone access is denied,
    /// [`WidgetError::Unsupported`] when no engine exists on this platform.
    fn start(&mut self, options: &RecognitionOptions) -> Result<()>;

    /// End the current recognition session. Must be idempotent.
    fn stop(&mut self);
}

/// What the engine reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEventKind {
    /// Audio capture began.
    Started,
    /// Current transcript for the session (partial or final).
    Transcript {
        /// Full transcript text so far.
        text: String,
        /// Whether the engine considers it final.
        is_final: bool,
    },
    /// The engine stopped on its own (or after `stop`).
    Ended,
    /// The engine reported an error.
    Error(RecognitionErrorKind),
}

/// Engine-reported failure categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Nothing heard for a while. Transient.
    NoSpeech,
    /// Momentary audio capture glitch. Transient.
    AudioCapture,
    /// Microphone access denied.
    PermissionDenied,
    /// No recognition engine on this platform.
    Unsupported,
    /// Recognition service unreachable.
    Network,
    /// Anything else.
    Other(String),
}

/// An engine event tagged with the start generation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionEvent {
    /// Generation from [`RecognitionOptions::generation`].
    pub generation: u64,
    /// The event itself.
    pub kind: RecognitionEventKind,
}

impl RecognitionEvent {
    /// Tag an event kind with a generation.
    pub fn new(generation: u64, kind: RecognitionEventKind) -> Self {
        Self { generation, kind }
    }
}

/// Capture controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Not listening; engine events are ignored.
    Stopped,
    /// Engine start requested.
    Starting,
    /// Engine running and producing transcripts.
    Active,
    /// Silence elapsed; the pending transcript is being gated.
    Finalizing,
}

/// A transcript that passed every gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedUtterance {
    /// Trimmed transcript text.
    pub text: String,
    /// Time between listen start and finalization.
    pub listened_for: Duration,
}

/// Why a transcript was thrown away as noise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Listening window shorter than the minimum.
    TooShort {
        /// Time actually spent listening.
        elapsed: Duration,
        /// Configured minimum.
        minimum: Duration,
    },
    /// Transcript has fewer characters than the minimum.
    TooFewChars {
        /// Trimmed character count.
        chars: usize,
        /// Configured minimum.
        minimum: usize,
    },
}

/// Why capture is unavailable or halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Microphone permission denied.
    PermissionDenied,
    /// Platform has no recognition engine.
    Unsupported,
    /// Engine keeps stopping without producing speech.
    RestartLimit,
    /// Recognition service unreachable.
    Network,
    /// Other engine error.
    EngineError,
}

/// User-facing notice about capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureNotice {
    /// Category.
    pub kind: NoticeKind,
    /// Message suitable for the transcript.
    pub message: String,
}

impl CaptureNotice {
    fn new(kind: NoticeKind) -> Self {
        let message = match kind {
            NoticeKind::PermissionDenied => {
                "Microphone access denied. Please allow microphone access, or type your message instead."
            }
            NoticeKind::Unsupported => {
                "Speech recognition is not available here. Please use text input instead."
            }
            NoticeKind::RestartLimit => {
                "Voice input keeps stopping. Please use text input instead."
            }
            NoticeKind::Network => "Network error. Please check your connection and try again.",
            NoticeKind::EngineError => "Voice input stopped unexpectedly. Please try again.",
        };
        Self {
            kind,
            message: message.to_owned(),
        }
    }
}

/// What the controller wants the orchestrator to know after an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Partial transcript to mirror in the input box.
    Interim(String),
    /// A finalized utterance ready for submission. Capture is now stopped.
    Utterance(FinalizedUtterance),
    /// A transcript was rejected as noise; listening continues.
    Discarded(DiscardReason),
    /// The engine stopped on its own and was restarted.
    Restarted,
    /// Voice capture is permanently unavailable for this instance.
    Degraded(CaptureNotice),
    /// Capture stopped after an engine error; it may be reactivated.
    Halted(CaptureNotice),
}

/// Gates continuous recognition into finalized utterances.
pub struct CaptureController {
    engine: Box<dyn RecognitionEngine>,
    config: CaptureConfig,
    state: CaptureState,
    generation: u64,
    transcript: String,
    listen_started: Option<Instant>,
    silence_deadline: Option<Instant>,
    restarts_without_speech: u32,
    disabled: Option<CaptureNotice>,
}

impl CaptureController {
    /// Create a stopped controller around an engine.
    pub fn new(engine: Box<dyn RecognitionEngine>, config: CaptureConfig) -> Self {
        Self {
            engine,
            config,
            state: CaptureState::Stopped,
            generation: 0,
            transcript: String::new(),
            listen_started: None,
            silence_deadline: None,
            restarts_without_speech: 0,
            disabled: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether the microphone is (or is about to be) open.
    pub fn is_listening(&self) -> bool {
        matches!(
            self.state,
            CaptureState::Starting | CaptureState::Active | CaptureState::Finalizing
        )
    }

    /// The notice that disabled capture, if it has been disabled.
    pub fn disabled_notice(&self) -> Option<&CaptureNotice> {
        self.disabled.as_ref()
    }

    /// Generation of the most recent engine start.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the pending transcript will be finalized, if one is pending.
    pub fn silence_deadline(&self) -> Option<Instant> {
        self.silence_deadline
    }

    /// Current (unfinalized) transcript.
    pub fn pending_transcript(&self) -> &str {
        &self.transcript
    }

    /// Start listening.
    ///
    /// No-op while already listening or once capture has been disabled.
    /// Returns `Some(Degraded)` if the engine refuses to start because of
    /// permissions or platform support.
    pub fn activate(&mut self, now: Instant) -> Option<CaptureOutcome> {
        if self.disabled.is_some() {
            debug!("capture disabled, ignoring activate");
            return None;
        }
        if self.is_listening() {
            debug!(state = ?self.state, "capture already active");
            return None;
        }
        self.restarts_without_speech = 0;
        self.transcript.clear();
        self.silence_deadline = None;
        self.listen_started = Some(now);
        self.start_engine()
    }

    /// Stop listening immediately from any state.
    ///
    /// Clears the pending transcript and silence timer; engine events that
    /// arrive afterwards are ignored until the next [`activate`](Self::activate).
    pub fn stop(&mut self) {
        if self.state != CaptureState::Stopped {
            debug!(state = ?self.state, "stopping capture");
            self.engine.stop();
        }
        self.reset_to_stopped();
    }

    /// Feed one engine event.
    pub fn handle_event(&mut self, event: RecognitionEvent, now: Instant) -> Option<CaptureOutcome> {
        if event.generation != self.generation || self.state == CaptureState::Stopped {
            debug!(
                generation = event.generation,
                current = self.generation,
                state = ?self.state,
                "ignoring stale recognition event"
            );
            return None;
        }

        match event.kind {
            RecognitionEventKind::Started => {
                if self.state == CaptureState::Starting {
                    self.state = CaptureState::Active;
                }
                None
            }
            RecognitionEventKind::Transcript { text, is_final } => {
                if self.state == CaptureState::Finalizing {
                    return None;
                }
                self.state = CaptureState::Active;
                if !text.trim().is_empty() {
                    self.restarts_without_speech = 0;
                    self.silence_deadline = Some(now + self.config.silence_timeout());
                }
                debug!(is_final, chars = text.chars().count(), "transcript update");
                self.transcript = text.clone();
                Some(CaptureOutcome::Interim(text))
            }
            RecognitionEventKind::Ended => self.handle_engine_ended(),
            RecognitionEventKind::Error(kind) => self.handle_engine_error(kind),
        }
    }

    /// Check the silence timer. Call at or after [`silence_deadline`](Self::silence_deadline).
    pub fn poll(&mut self, now: Instant) -> Option<CaptureOutcome> {
        if !matches!(self.state, CaptureState::Starting | CaptureState::Active) {
            return None;
        }
        let deadline = self.silence_deadline?;
        if now < deadline {
            return None;
        }
        self.silence_deadline = None;

        let text = self.transcript.trim().to_owned();
        if text.is_empty() {
            return None;
        }

        self.state = CaptureState::Finalizing;
        let elapsed = self
            .listen_started
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        let chars = text.chars().count();

        let rejection = if elapsed < self.config.min_listen_duration() {
            Some(DiscardReason::TooShort {
                elapsed,
                minimum: self.config.min_listen_duration(),
            })
        } else if chars < self.config.min_transcript_chars {
            Some(DiscardReason::TooFewChars {
                chars,
                minimum: self.config.min_transcript_chars,
            })
        } else {
            None
        };

        if let Some(reason) = rejection {
            debug!(?reason, "discarding transcript as noise");
            self.transcript.clear();
            self.listen_started = Some(now);
            self.state = CaptureState::Active;
            return Some(CaptureOutcome::Discarded(reason));
        }

        info!(chars, listened_ms = elapsed.as_millis() as u64, "utterance finalized");
        self.engine.stop();
        self.reset_to_stopped();
        Some(CaptureOutcome::Utterance(FinalizedUtterance {
            text,
            listened_for: elapsed,
        }))
    }

    fn start_engine(&mut self) -> Option<CaptureOutcome> {
        self.generation += 1;
        let options = RecognitionOptions {
            continuous: true,
            interim_results: true,
            language: self.config.language.clone(),
            generation: self.generation,
        };
        match self.engine.start(&options) {
            Ok(()) => {
                self.state = CaptureState::Starting;
                None
            }
            Err(e) => {
                warn!(error = %e, "recognition engine failed to start");
                let kind = match e {
                    WidgetError::Permission(_) => NoticeKind::PermissionDenied,
                    WidgetError::Unsupported(_) => NoticeKind::Unsupported,
                    _ => NoticeKind::EngineError,
                };
                self.reset_to_stopped();
                if matches!(kind, NoticeKind::EngineError) {
                    Some(CaptureOutcome::Halted(CaptureNotice::new(kind)))
                } else {
                    Some(self.disable(kind))
                }
            }
        }
    }

    fn handle_engine_ended(&mut self) -> Option<CaptureOutcome> {
        if self.state == CaptureState::Finalizing {
            return None;
        }
        if self.restarts_without_speech >= self.config.max_auto_restarts {
            warn!(
                restarts = self.restarts_without_speech,
                "recognition engine keeps stopping, disabling capture"
            );
            self.reset_to_stopped();
            return Some(self.disable(NoticeKind::RestartLimit));
        }
        self.restarts_without_speech += 1;
        debug!(attempt = self.restarts_without_speech, "engine auto-stopped, restarting");
        match self.start_engine() {
            None => Some(CaptureOutcome::Restarted),
            failure => failure,
        }
    }

    fn handle_engine_error(&mut self, kind: RecognitionErrorKind) -> Option<CaptureOutcome> {
        match kind {
            RecognitionErrorKind::NoSpeech | RecognitionErrorKind::AudioCapture => {
                debug!(?kind, "transient recognition error, still listening");
                None
            }
            RecognitionErrorKind::PermissionDenied => {
                self.engine.stop();
                self.reset_to_stopped();
                Some(self.disable(NoticeKind::PermissionDenied))
            }
            RecognitionErrorKind::Unsupported => {
                self.engine.stop();
                self.reset_to_stopped();
                Some(self.disable(NoticeKind::Unsupported))
            }
            RecognitionErrorKind::Network => {
                warn!("recognition network error");
                self.engine.stop();
                self.reset_to_stopped();
                Some(CaptureOutcome::Halted(CaptureNotice::new(NoticeKind::Network)))
            }
            RecognitionErrorKind::Other(message) => {
                warn!(%message, "recognition engine error");
                self.engine.stop();
                self.reset_to_stopped();
                Some(CaptureOutcome::Halted(CaptureNotice::new(NoticeKind::EngineError)))
            }
        }
    }

    fn disable(&mut self, kind: NoticeKind) -> CaptureOutcome {
        let notice = CaptureNotice::new(kind);
        warn!(?kind, "voice capture disabled, text input remains available");
        self.disabled = Some(notice.clone());
        CaptureOutcome::Degraded(notice)
    }

    fn reset_to_stopped(&mut self) {
        self.state = CaptureState::Stopped;
        self.transcript.clear();
        self.silence_deadline = None;
        self.listen_started = None;
    }
}

impl std::fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureController")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("disabled", &self.disabled.is_some())
            .finish()
    }
}
