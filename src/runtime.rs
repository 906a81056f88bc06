//! Events emitted by the orchestrator for the presentation layer.
//!
//! Delivered over a `tokio::sync::broadcast` channel; slow receivers lag and
//! skip events rather than stalling the conversation.

use crate::capture::{CaptureNotice, DiscardReason};
use crate::config::ConversationMode;
use crate::pipeline::messages::ConversationState;
use crate::playback::PlaybackOutcome;
use crate::session::Turn;

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Non-fatal conditions the presentation layer should surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetNotice {
    /// No business id configured; submissions are refused.
    NotConfigured,
    /// Voice capture problem.
    Capture(CaptureNotice),
}

impl WidgetNotice {
    /// Text suitable for display.
    pub fn message(&self) -> &str {
        match self {
            Self::NotConfigured => "This widget is not configured. Missing business id.",
            Self::Capture(notice) => &notice.message,
        }
    }
}

/// What the conversation is doing "right now".
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// Conversation state transition.
    StateChanged {
        from: ConversationState,
        to: ConversationState,
    },
    /// Voice/text mode switched.
    ModeChanged(ConversationMode),
    /// Widget opened or closed.
    OpenChanged { open: bool },
    /// A turn was appended to the visible transcript.
    TurnAppended(Turn),
    /// The visible transcript was cleared.
    TranscriptCleared { removed: usize },
    /// Partial recognition result to mirror in the input box.
    InterimTranscript(String),
    /// A captured transcript was rejected as noise.
    UtteranceDiscarded(DiscardReason),
    /// A chat request failed; `error_code` is the stable error code.
    ChatFailed {
        error_code: &'static str,
        message: String,
    },
    /// Reply playback finished.
    PlaybackFinished(PlaybackOutcome),
    /// Something the user should be told about.
    Notice(WidgetNotice),
}
