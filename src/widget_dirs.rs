//! Platform directory paths for the widget.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data (session identity) | `~/Library/Application Support/voicewidget/` | `~/.local/share/voicewidget/` |
//! | Config | `~/Library/Application Support/voicewidget/` | `~/.config/voicewidget/` |
//!
//! # Environment Overrides
//!
//! - `VOICEWIDGET_DATA_DIR` overrides [`data_dir`]
//! - `VOICEWIDGET_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

const APP_DIR: &str = "voicewidget";

/// Durable client storage root.
///
/// Holds the session identity file. Resolves to `dirs::data_dir()/voicewidget/`
/// unless `VOICEWIDGET_DATA_DIR` is set.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("VOICEWIDGET_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| std::env::temp_dir().join("voicewidget-data"))
}

/// Configuration directory.
///
/// Resolves to `dirs::config_dir()/voicewidget/` unless
/// `VOICEWIDGET_CONFIG_DIR` is set.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("VOICEWIDGET_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| std::env::temp_dir().join("voicewidget-config"))
}

/// Key-value storage file used by the session identity store.
#[must_use]
pub fn storage_file() -> PathBuf {
    data_dir().join("storage.json")
}

/// Default `config.toml` location.
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
