//! Host page embed contract.
//!
//! The host page sets a global object before loading the widget script:
//!
//! ```html
//! <script>
//!   window.AIVoiceWidgetConfig = { businessId: "acme" };
//! </script>
//! ```
//!
//! [`EmbedConfig::from_json`] parses that object; overlay it onto a base
//! config with [`WidgetConfig::apply_embed`](crate::config::WidgetConfig::apply_embed).

use crate::error::{Result, WidgetError};
use serde::{Deserialize, Serialize};

/// Name of the global the host page assigns.
pub const EMBED_GLOBAL: &str = "AIVoiceWidgetConfig";

/// The host-supplied embed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfig {
    /// Tenant identifier.
    pub business_id: String,
    /// Chat endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    /// Voice endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_backend_url: Option<String>,
    /// Persona hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    /// Language hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl EmbedConfig {
    /// Parse the embed object from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::Config`] if the JSON is malformed or
    /// `businessId` is missing or blank.
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(raw)
            .map_err(|e| WidgetError::Config(format!("invalid {EMBED_GLOBAL}: {e}")))?;
        if parsed.business_id.trim().is_empty() {
            return Err(WidgetError::Config(format!(
                "{EMBED_GLOBAL}.businessId must not be empty"
            )));
        }
        Ok(parsed)
    }
}
