//! Conversation orchestrator: owns turn-taking state and sequences capture,
//! chat and playback.
//!
//! All mutable state sits behind one `std::sync::Mutex` that is never held
//! across an `.await`. Two counters keep late work from clobbering newer
//! state:
//!
//! - `in_flight` allows at most one chat request at a time;
//! - `turn_generation` is bumped by every accepted submission, mode switch,
//!   close and barge-in. A reply whose generation is stale is still recorded
//!   but never spoken, and never changes the conversation state.

use crate::capture::{CaptureController, CaptureOutcome, FinalizedUtterance, RecognitionEngine, RecognitionEvent};
use crate::chat::{ChatRequest, ChatService, HttpChatClient, RecentMessage};
use crate::config::{ConversationConfig, ConversationMode, WidgetConfig};
use crate::error::WidgetError;
use crate::pipeline::messages::{ConversationState, IgnoreReason, SubmitOutcome};
use crate::playback::http::HttpVoiceClient;
use crate::playback::{AudioSink, LocalSynthesizer, PlaybackController, SpeechSynthesizer, VoiceSettings};
use crate::runtime::{EVENT_CHANNEL_CAPACITY, WidgetEvent, WidgetNotice};
use crate::session::{KeyValueStorage, Role, RollingBuffer, SessionIdentityStore, Transcript, Turn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct Inner {
    state: ConversationState,
    mode: ConversationMode,
    open: bool,
    /// User asked for hands-free listening in voice mode.
    listening_wanted: bool,
    in_flight: bool,
    turn_generation: u64,
    degraded_notice_sent: bool,
    transcript: Transcript,
    buffer: RollingBuffer,
    voice: VoiceSettings,
    capture: CaptureController,
}

/// Sequences one conversation. Share it as `Arc<ConversationOrchestrator>`.
pub struct ConversationOrchestrator {
    business_id: Option<String>,
    session_id: String,
    conversation: ConversationConfig,
    chat_timeout: Duration,
    chat: Arc<dyn ChatService>,
    playback: PlaybackController,
    events: broadcast::Sender<WidgetEvent>,
    inner: Mutex<Inner>,
}

/// Current time on the tokio clock, so paused-time tests drive the capture
/// gates too.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl ConversationOrchestrator {
    /// Assemble an orchestrator from its parts.
    pub fn new(
        config: &WidgetConfig,
        session_id: String,
        chat: Arc<dyn ChatService>,
        playback: PlaybackController,
        engine: Box<dyn RecognitionEngine>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Inner {
            state: ConversationState::Idle,
            mode: config.conversation.initial_mode,
            open: true,
            listening_wanted: false,
            in_flight: false,
            turn_generation: 0,
            degraded_notice_sent: false,
            transcript: Transcript::new(),
            buffer: RollingBuffer::new(config.conversation.recent_messages_limit),
            voice: config.voice.clone(),
            capture: CaptureController::new(engine, config.capture.clone()),
        };
        if config.business_id().is_none() {
            warn!("no business id configured; messages will not be sent");
        }
        Self {
            business_id: config.business_id().map(str::to_owned),
            session_id,
            conversation: config.conversation.clone(),
            chat_timeout: config.endpoints.chat_timeout(),
            chat,
            playback,
            events,
            inner: Mutex::new(inner),
        }
    }

    /// Build an orchestrator talking HTTP to the configured endpoints.
    pub fn from_config(
        config: &WidgetConfig,
        storage: Arc<dyn KeyValueStorage>,
        engine: Box<dyn RecognitionEngine>,
        sink: Arc<dyn AudioSink>,
        local: Arc<dyn LocalSynthesizer>,
    ) -> Self {
        let endpoints = &config.endpoints;
        let chat = Arc::new(HttpChatClient::new(
            &endpoints.chat_url,
            endpoints.chat_timeout(),
        ));
        let remote = endpoints.voice_url.as_ref().map(|url| {
            Arc::new(HttpVoiceClient::new(url, endpoints.voice_timeout()))
                as Arc<dyn SpeechSynthesizer>
        });
        let playback = PlaybackController::new(
            remote,
            sink,
            local,
            &config.playback,
            endpoints.voice_timeout(),
        );
        let session_id = SessionIdentityStore::new(storage).get_or_create_session_id();
        info!(session_id = %session_id, chat_url = %endpoints.chat_url, "conversation ready");
        Self::new(config, session_id, chat, playback, engine)
    }

    /// Subscribe to [`WidgetEvent`]s.
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.events.subscribe()
    }

    /// Stable session identifier sent with every chat request.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ConversationState {
        self.lock().state
    }

    pub fn mode(&self) -> ConversationMode {
        self.lock().mode
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Visible transcript, oldest first.
    pub fn transcript(&self) -> Vec<Turn> {
        self.lock().transcript.turns().to_vec()
    }

    /// Rolling context buffer, oldest first.
    pub fn recent_turns(&self) -> Vec<Turn> {
        self.lock().buffer.to_vec()
    }

    pub fn voice_settings(&self) -> VoiceSettings {
        self.lock().voice.clone()
    }

    /// Replace the voice settings; the next synthesis uses them.
    pub fn set_voice_settings(&self, settings: VoiceSettings) {
        debug!(?settings, "voice settings updated");
        self.lock().voice = settings;
    }

    /// Notice that permanently disabled voice capture, if any.
    pub fn capture_disabled(&self) -> Option<WidgetNotice> {
        self.lock()
            .capture
            .disabled_notice()
            .cloned()
            .map(WidgetNotice::Capture)
    }

    /// When the pending transcript will be finalized, if one is pending.
    pub fn silence_deadline(&self) -> Option<Instant> {
        self.lock().capture.silence_deadline()
    }

    /// Send one user message and play the reply.
    ///
    /// Returns once the reply (or apology) has finished playing and the
    /// conversation has settled back to Idle or Listening.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let message = text.trim();
        if message.is_empty() {
            debug!("ignoring empty submission");
            return SubmitOutcome::Ignored(IgnoreReason::Empty);
        }
        let Some(business_id) = self.business_id.clone() else {
            warn!("submission refused: no business id configured");
            self.emit(WidgetEvent::Notice(WidgetNotice::NotConfigured));
            return SubmitOutcome::Ignored(IgnoreReason::NotConfigured);
        };

        let (request, generation) = {
            let mut inner = self.lock();
            if inner.in_flight {
                debug!("submission already in flight, ignoring");
                return SubmitOutcome::Ignored(IgnoreReason::Busy);
            }
            inner.in_flight = true;
            inner.turn_generation += 1;
            let generation = inner.turn_generation;

            inner.capture.stop();
            let turn = inner.transcript.append(Role::User, message);
            inner.buffer.push(turn.clone());
            self.emit(WidgetEvent::TurnAppended(turn));
            self.transition(&mut inner, ConversationState::Processing);

            let request = ChatRequest {
                session_id: self.session_id.clone(),
                business_id,
                message: message.to_owned(),
                recent_messages: inner.buffer.iter().map(RecentMessage::from).collect(),
                persona: self.conversation.persona.clone(),
                language: self.conversation.language.clone(),
            };
            (request, generation)
        };
        // Typed input while a reply is playing supersedes that reply.
        self.playback.stop();

        info!(
            session_id = %self.session_id,
            chars = request.message.chars().count(),
            context_turns = request.recent_messages.len(),
            "sending message"
        );
        let result = match tokio::time::timeout(self.chat_timeout, self.chat.send(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(WidgetError::Timeout(format!(
                "chat request exceeded {} ms",
                self.chat_timeout.as_millis()
            ))),
        };

        let (outcome, spoken) = {
            let mut inner = self.lock();
            inner.in_flight = false;
            match result {
                Ok(reply) => {
                    let turn = inner.transcript.append(Role::Assistant, reply.clone());
                    inner.buffer.push(turn.clone());
                    self.emit(WidgetEvent::TurnAppended(turn));
                    (SubmitOutcome::Replied { reply: reply.clone() }, reply)
                }
                Err(e) => {
                    if e.is_protocol() {
                        error!(error_code = e.code(), error = %e, "chat service returned an unusable response");
                    } else {
                        warn!(error_code = e.code(), error = %e, "chat request failed");
                    }
                    let turn = inner
                        .transcript
                        .append(Role::Assistant, self.conversation.error_message.clone());
                    self.emit(WidgetEvent::TurnAppended(turn));
                    self.emit(WidgetEvent::ChatFailed {
                        error_code: e.code(),
                        message: e.to_string(),
                    });
                    (
                        SubmitOutcome::Failed {
                            error_code: e.code(),
                        },
                        self.conversation.apology_message.clone(),
                    )
                }
            }
        };

        self.speak_and_settle(&spoken, generation).await;
        outcome
    }

    /// Switch between voice and text input.
    ///
    /// Stops capture and playback and returns to Idle. The rolling buffer is
    /// kept; the visible transcript is cleared only if configured.
    pub fn set_mode(&self, mode: ConversationMode) {
        {
            let mut inner = self.lock();
            inner.turn_generation += 1;
            inner.listening_wanted = false;
            inner.capture.stop();
            self.transition(&mut inner, ConversationState::Idle);
            if inner.mode != mode {
                info!(?mode, "conversation mode changed");
                inner.mode = mode;
                self.emit(WidgetEvent::ModeChanged(mode));
                if self.conversation.clear_transcript_on_mode_switch {
                    let removed = inner.transcript.clear();
                    self.emit(WidgetEvent::TranscriptCleared { removed });
                }
            }
        }
        self.playback.stop();
    }

    /// Open or close the widget. Closing stops capture and playback.
    pub fn set_open(&self, open: bool) {
        {
            let mut inner = self.lock();
            if inner.open == open {
                return;
            }
            inner.open = open;
            self.emit(WidgetEvent::OpenChanged { open });
            if open {
                return;
            }
            inner.turn_generation += 1;
            inner.listening_wanted = false;
            inner.capture.stop();
            self.transition(&mut inner, ConversationState::Idle);
        }
        self.playback.stop();
    }

    /// Microphone button: start or stop listening in voice mode.
    ///
    /// Interrupts a reply that is playing. Ignored in text mode, while
    /// closed, and while a request is in flight. Returns the resulting state.
    pub fn toggle_listening(&self) -> ConversationState {
        let mut inner = self.lock();
        if inner.mode != ConversationMode::Voice || !inner.open {
            debug!(mode = ?inner.mode, open = inner.open, "toggle_listening ignored");
            return inner.state;
        }
        match inner.state {
            ConversationState::Listening => {
                inner.listening_wanted = false;
                inner.capture.stop();
                self.transition(&mut inner, ConversationState::Idle);
            }
            ConversationState::Idle | ConversationState::Speaking => {
                if inner.capture.disabled_notice().is_some() {
                    self.notify_degraded(&mut inner);
                    return inner.state;
                }
                if inner.state == ConversationState::Speaking {
                    debug!("barge-in: stopping playback to listen");
                    inner.turn_generation += 1;
                    self.playback.stop();
                }
                inner.listening_wanted = true;
                self.start_listening(&mut inner);
            }
            ConversationState::Processing => {
                debug!("toggle_listening ignored while processing");
            }
        }
        inner.state
    }

    /// Feed one recognition engine event.
    ///
    /// Returns a finalized utterance the caller should [`submit`](Self::submit).
    pub fn handle_recognition_event(&self, event: RecognitionEvent) -> Option<FinalizedUtterance> {
        let mut inner = self.lock();
        let outcome = inner.capture.handle_event(event, now())?;
        self.apply_capture_outcome(&mut inner, outcome)
    }

    /// Check the capture silence timer.
    ///
    /// Returns a finalized utterance the caller should [`submit`](Self::submit).
    pub fn poll_capture(&self) -> Option<FinalizedUtterance> {
        let mut inner = self.lock();
        let outcome = inner.capture.poll(now())?;
        self.apply_capture_outcome(&mut inner, outcome)
    }

    /// Drive voice capture until `cancel` fires or `events` closes.
    ///
    /// Multiplexes engine events with the silence timer and submits every
    /// finalized utterance on its own task.
    pub async fn run_voice_loop(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<RecognitionEvent>,
        cancel: CancellationToken,
    ) {
        info!("voice loop started");
        loop {
            let deadline = self.silence_deadline();
            let silence = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let utterance = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_recognition_event(event),
                    None => {
                        debug!("recognition event channel closed");
                        break;
                    }
                },
                _ = silence => self.poll_capture(),
            };

            if let Some(utterance) = utterance {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let outcome = this.submit(&utterance.text).await;
                    debug!(?outcome, "voice submission finished");
                });
            }
        }

        let mut inner = self.lock();
        inner.capture.stop();
        if inner.state == ConversationState::Listening {
            self.transition(&mut inner, ConversationState::Idle);
        }
        info!("voice loop stopped");
    }

    async fn speak_and_settle(&self, text: &str, generation: u64) {
        // The output slot is reserved under the lock, so a barge-in, mode
        // switch or close that follows the Speaking transition cancels it.
        let (ticket, settings) = {
            let mut inner = self.lock();
            if inner.turn_generation != generation {
                debug!("reply superseded, not speaking");
                return;
            }
            let speak = inner.open
                && (inner.mode == ConversationMode::Voice
                    || self.conversation.speak_replies_in_text_mode);
            if !speak {
                self.settle(&mut inner);
                return;
            }
            inner.capture.stop();
            self.transition(&mut inner, ConversationState::Speaking);
            (self.playback.prepare(), inner.voice.clone())
        };

        let outcome = self.playback.speak_prepared(ticket, text, &settings).await;
        self.emit(WidgetEvent::PlaybackFinished(outcome));

        let mut inner = self.lock();
        if inner.turn_generation == generation {
            self.settle(&mut inner);
        }
    }

    /// Leave Processing/Speaking: re-arm listening in voice mode, else Idle.
    fn settle(&self, inner: &mut Inner) {
        let rearm = inner.mode == ConversationMode::Voice
            && inner.open
            && inner.listening_wanted
            && inner.capture.disabled_notice().is_none();
        if rearm {
            self.start_listening(inner);
        } else {
            self.transition(inner, ConversationState::Idle);
        }
    }

    fn start_listening(&self, inner: &mut Inner) {
        match inner.capture.activate(now()) {
            None => self.transition(inner, ConversationState::Listening),
            Some(outcome) => {
                // Only failures come back from activate.
                self.transition(inner, ConversationState::Idle);
                let _ = self.apply_capture_outcome(inner, outcome);
            }
        }
    }

    fn apply_capture_outcome(
        &self,
        inner: &mut Inner,
        outcome: CaptureOutcome,
    ) -> Option<FinalizedUtterance> {
        match outcome {
            CaptureOutcome::Interim(text) => {
                self.emit(WidgetEvent::InterimTranscript(text));
                None
            }
            CaptureOutcome::Utterance(utterance) => {
                if inner.state != ConversationState::Listening {
                    debug!(state = %inner.state, "dropping utterance finalized outside Listening");
                    return None;
                }
                self.transition(inner, ConversationState::Idle);
                Some(utterance)
            }
            CaptureOutcome::Discarded(reason) => {
                self.emit(WidgetEvent::UtteranceDiscarded(reason));
                None
            }
            CaptureOutcome::Restarted => None,
            CaptureOutcome::Degraded(_) => {
                inner.listening_wanted = false;
                if inner.state == ConversationState::Listening {
                    self.transition(inner, ConversationState::Idle);
                }
                self.notify_degraded(inner);
                None
            }
            CaptureOutcome::Halted(notice) => {
                inner.listening_wanted = false;
                if inner.state == ConversationState::Listening {
                    self.transition(inner, ConversationState::Idle);
                }
                self.emit(WidgetEvent::Notice(WidgetNotice::Capture(notice)));
                None
            }
        }
    }

    fn notify_degraded(&self, inner: &mut Inner) {
        if inner.degraded_notice_sent {
            return;
        }
        if let Some(notice) = inner.capture.disabled_notice().cloned() {
            inner.degraded_notice_sent = true;
            self.emit(WidgetEvent::Notice(WidgetNotice::Capture(notice)));
        }
    }

    fn transition(&self, inner: &mut Inner, to: ConversationState) {
        let from = inner.state;
        if from == to {
            return;
        }
        debug!(%from, %to, "conversation state");
        inner.state = to;
        self.emit(WidgetEvent::StateChanged { from, to });
    }

    fn emit(&self, event: WidgetEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConversationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationOrchestrator")
            .field("session_id", &self.session_id)
            .field("business_id", &self.business_id)
            .field("playback", &self.playback)
            .finish()
    }
}
