//! Error types for the widget session core.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`WidgetError::code()`].

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid or missing configuration (e.g. no business id).
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Transport-level failure talking to a remote endpoint.
    pub const NETWORK_FAILED: &str = "NETWORK_FAILED";

    /// Request or playback exceeded its time bound.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// Remote endpoint answered with a non-2xx status.
    pub const HTTP_STATUS: &str = "HTTP_STATUS";

    /// Response body did not match the expected shape.
    pub const PROTOCOL_ERROR: &str = "PROTOCOL_ERROR";

    /// Microphone (or other device) access was denied.
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";

    /// The platform has no usable engine for the requested capability.
    pub const UNSUPPORTED: &str = "UNSUPPORTED";

    /// Audio could not be played.
    pub const PLAYBACK_FAILED: &str = "PLAYBACK_FAILED";

    /// Durable client storage could not be read or written.
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";

    /// Filesystem I/O error.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Top-level error type for the widget.
#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// Connection refused, DNS failure, reset, and similar.
    #[error("[{}] {}", error_codes::NETWORK_FAILED, .0)]
    Network(String),

    /// A bounded operation ran out of time.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    Timeout(String),

    /// Non-2xx HTTP status.
    #[error("[{}] status {status}: {body}", error_codes::HTTP_STATUS)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// Malformed or unexpected response shape.
    #[error("[{}] {}", error_codes::PROTOCOL_ERROR, .0)]
    Protocol(String),

    /// Device access denied by the user or platform.
    #[error("[{}] {}", error_codes::PERMISSION_DENIED, .0)]
    Permission(String),

    /// Capability not available on this platform.
    #[error("[{}] {}", error_codes::UNSUPPORTED, .0)]
    Unsupported(String),

    /// Playback could not start or failed midway.
    #[error("[{}] {}", error_codes::PLAYBACK_FAILED, .0)]
    Playback(String),

    /// Durable storage read/write failure.
    #[error("[{}] {}", error_codes::STORAGE_ERROR, .0)]
    Storage(String),

    /// I/O error.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(#[from] std::io::Error),
}

impl WidgetError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Network(_) => error_codes::NETWORK_FAILED,
            Self::Timeout(_) => error_codes::TIMEOUT_ERROR,
            Self::Http { .. } => error_codes::HTTP_STATUS,
            Self::Protocol(_) => error_codes::PROTOCOL_ERROR,
            Self::Permission(_) => error_codes::PERMISSION_DENIED,
            Self::Unsupported(_) => error_codes::UNSUPPORTED,
            Self::Playback(_) => error_codes::PLAYBACK_FAILED,
            Self::Storage(_) => error_codes::STORAGE_ERROR,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }

    /// Returns true for failures the user can fix by simply retrying.
    ///
    /// Network errors, timeouts, and 5xx/429 statuses are transient.
    /// Configuration, permission, and 4xx errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Protocol(_) | Self::Playback(_) => true,
            Self::Config(_)
            | Self::Permission(_)
            | Self::Unsupported(_)
            | Self::Storage(_)
            | Self::Io(_) => false,
        }
    }

    /// Returns true when the remote answered but with the wrong shape.
    ///
    /// Protocol errors look identical to network errors to the user but are
    /// logged separately for operators.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Map a reqwest transport error onto the taxonomy.
    pub(crate) fn from_reqwest(context: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("{context}: {err}"))
        } else if err.is_decode() {
            Self::Protocol(format!("{context}: {err}"))
        } else {
            Self::Network(format!("{context}: {err}"))
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, WidgetError>;
