//! Integration tests for the conversation core.
//!
//! Each module exercises one contract against wiremock servers; shared
//! fakes live in `helpers`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod helpers;

mod chat_contract;
mod embed_contract;
mod voice_contract;
