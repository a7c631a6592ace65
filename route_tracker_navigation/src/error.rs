use thiserror::Error;

use crate::session::SessionState;

/// Failures of a location feed. These are sensor-level problems surfaced to
/// observers. A session only cancels on them under `LocationErrorPolicy::CancelOnUnrecoverable`.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location hardware unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("recording unavailable: {0}")]
    Recording(String),
    #[error("location stream failed: {0}")]
    Io(#[from] std::io::Error),
}

impl LocationError {
    /// Errors the feed cannot recover from without user action.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, LocationError::PermissionDenied | LocationError::Recording(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrackerError {
    #[error("tracker rejected fix: {0}")]
    RejectedFix(String),
    #[error("reroute failed: {0}")]
    RerouteFailed(String),
    #[error("rerouting is not supported by this tracker")]
    ReroutingUnsupported,
}

/// Precondition failures when starting a session. Nothing is initialized when one of these is returned.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("session already started (state: {0:?})")]
    AlreadyStarted(SessionState),
    #[error("route has no maneuvers")]
    EmptyRoute,
    #[error("failed to start location feed: {0}")]
    Feed(#[from] LocationError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("malformed config line: {0}")]
    MalformedLine(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}
