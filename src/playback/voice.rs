//! Voice settings and their mapping onto on-device speech parameters.

use serde::{Deserialize, Serialize};

/// User-adjustable voice settings, read on every synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Language code or name (`en`, `en-US`, `spanish`, ...).
    pub language: String,
    /// `female` or `male`.
    pub gender: String,
    /// `calm`, `friendly`, or `professional`.
    pub style: String,
    /// Speaking rate multiplier (1.0 = normal).
    pub speaking_speed: Option<f32>,
    /// Pitch multiplier (1.0 = normal).
    pub pitch: Option<f32>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
            gender: "female".to_owned(),
            style: "calm".to_owned(),
            speaking_speed: None,
            pitch: None,
        }
    }
}

impl VoiceSettings {
    /// Canonical form: ISO language code, lowercase gender, known style.
    pub fn normalized(&self) -> Self {
        Self {
            language: normalize_language(&self.language),
            gender: self.gender.trim().to_lowercase(),
            style: normalize_style(&self.style).to_owned(),
            speaking_speed: self.speaking_speed,
            pitch: self.pitch,
        }
    }
}

/// Map a language name or tag to a bare ISO code.
///
/// `english` → `en`, `en-US` → `en`, `fr` → `fr`.
pub fn normalize_language(language: &str) -> String {
    let lower = language.trim().to_lowercase();
    let mapped = match lower.as_str() {
        "english" => "en",
        "spanish" => "es",
        "arabic" => "ar",
        "french" => "fr",
        "german" => "de",
        other => other.split(['-', '_']).next().unwrap_or(other),
    };
    if mapped.is_empty() {
        "en".to_owned()
    } else {
        mapped.to_owned()
    }
}

/// Map a style name onto one of `calm`, `friendly`, `professional`.
pub fn normalize_style(style: &str) -> &'static str {
    match style.trim().to_lowercase().as_str() {
        "friendly" => "friendly",
        "professional" => "professional",
        // neutral, default, calm and anything unknown
        _ => "calm",
    }
}

/// Locale used by on-device speech for a language.
pub fn fallback_locale(language: &str) -> &'static str {
    match normalize_language(language).as_str() {
        "en" => "en-US",
        "es" => "es-ES",
        "ar" => "ar",
        "fr" => "fr-FR",
        "de" => "de-DE",
        _ => "en-US",
    }
}

/// Parameters for the on-device synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVoiceParams {
    /// BCP-47 locale (`en-US`).
    pub locale: String,
    /// Rate multiplier in `[0.5, 2.0]`.
    pub rate: f32,
    /// Pitch multiplier in `[0.0, 2.0]`.
    pub pitch: f32,
    /// Preferred voice gender, lowercase.
    pub gender: String,
}

impl LocalVoiceParams {
    /// Map voice settings onto local parameters.
    ///
    /// A non-empty `locale_hint` (the `voiceId` from a fallback response)
    /// overrides the locale derived from the language.
    pub fn from_settings(settings: &VoiceSettings, locale_hint: Option<&str>) -> Self {
        let normalized = settings.normalized();
        let locale = locale_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| fallback_locale(&normalized.language).to_owned());
        Self {
            locale,
            rate: clamp_or_default(settings.speaking_speed, 0.5, 2.0),
            pitch: clamp_or_default(settings.pitch, 0.0, 2.0),
            gender: normalized.gender,
        }
    }
}

fn clamp_or_default(value: Option<f32>, min: f32, max: f32) -> f32 {
    match value {
        Some(v) if v.is_finite() => v.clamp(min, max),
        _ => 1.0,
    }
}
