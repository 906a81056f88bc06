//! Conversation sequencing: capture → chat → playback.

pub mod messages;
pub mod orchestrator;

pub use messages::{ConversationState, IgnoreReason, SubmitOutcome};
pub use orchestrator::ConversationOrchestrator;
