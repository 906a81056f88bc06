//! Conversational session core for an embeddable voice chat widget.
//!
//! Tracks turn-taking across text and voice input, keeps a bounded local
//! context buffer next to the server's durable history, and coordinates
//! listening, processing and speaking against two remote endpoints:
//!
//! Microphone → Capture → Chat endpoint → Voice endpoint → Speaker
//!
//! # Architecture
//!
//! - **Session**: stable session id, transcript, rolling context buffer
//! - **Capture**: gates a continuous recognizer into finalized utterances
//! - **Chat**: request/reply client for the chat endpoint
//! - **Playback**: remote synthesis with on-device speech as fallback
//! - **Pipeline**: the orchestrator that sequences all of the above and
//!   broadcasts [`WidgetEvent`]s to the presentation layer

pub mod capture;
pub mod chat;
pub mod config;
pub mod embed;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod runtime;
pub mod session;
pub mod widget_dirs;

pub use config::{ConversationMode, WidgetConfig};
pub use error::{Result, WidgetError};
pub use pipeline::{ConversationOrchestrator, ConversationState, SubmitOutcome};
pub use runtime::{WidgetEvent, WidgetNotice};
