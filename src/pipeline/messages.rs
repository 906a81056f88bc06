//! State and result types shared by the orchestrator and its callers.

use serde::Serialize;

/// Where the conversation is in its turn-taking cycle. Exactly one at a time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    /// Waiting for input.
    #[default]
    Idle,
    /// Microphone open, capturing an utterance.
    Listening,
    /// A chat request is in flight.
    Processing,
    /// A reply (or apology) is playing.
    Speaking,
}

impl ConversationState {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a submission was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Text was empty or whitespace.
    Empty,
    /// Another submission is still in flight.
    Busy,
    /// No business id is configured.
    NotConfigured,
}

/// Result of [`submit`](crate::pipeline::ConversationOrchestrator::submit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The assistant replied; the reply was appended to the transcript.
    Replied {
        /// Assistant reply text.
        reply: String,
    },
    /// The chat call failed; an apology was appended instead.
    Failed {
        /// Stable error code of the failure.
        error_code: &'static str,
    },
    /// Nothing was sent.
    Ignored(IgnoreReason),
}

impl SubmitOutcome {
    /// Whether a chat request was actually made.
    pub fn was_sent(&self) -> bool {
        !matches!(self, Self::Ignored(_))
    }
}
