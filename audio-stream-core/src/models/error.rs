use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::grant::GrantDenial;

/// Errors that can occur while opening or running a capture session.
///
/// Hosts should branch on [`CaptureError::kind`] rather than on the
/// display text, which may carry platform detail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("playback capture is not supported on this platform")]
    NotSupported,

    #[error("permission denied")]
    PermissionDenied,

    #[error("audio init failed: {0}")]
    InitFailed(String),

    #[error("projection failed: {0}")]
    ProjectionFailed(String),

    #[error("read failure: {0}")]
    ReadFailure(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("capture grant denied: {0}")]
    GrantDenied(GrantDenial),
}

/// Stable, machine-readable failure reason reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotSupported,
    PermissionDenied,
    #[serde(rename = "audio_init_failed")]
    InitFailed,
    ProjectionFailed,
    #[serde(rename = "read_failed")]
    ReadFailure,
    CaptureFailed,
    InvalidConfig,
    GrantDenied,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotSupported => "not_supported",
            Self::PermissionDenied => "permission_denied",
            Self::InitFailed => "audio_init_failed",
            Self::ProjectionFailed => "projection_failed",
            Self::ReadFailure => "read_failed",
            Self::CaptureFailed => "capture_failed",
            Self::InvalidConfig => "invalid_config",
            Self::GrantDenied => "grant_denied",
        }
    }

    /// Whether the failure happened after a session was running.
    ///
    /// Mid-stream failures end the session but the host may `start` again
    /// with the same grant; the others need the host to change something first.
    pub fn is_mid_stream(&self) -> bool {
        matches!(self, Self::ReadFailure | Self::CaptureFailed)
    }
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotSupported => ErrorKind::NotSupported,
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::InitFailed(_) => ErrorKind::InitFailed,
            Self::ProjectionFailed(_) => ErrorKind::ProjectionFailed,
            Self::ReadFailure(_) => ErrorKind::ReadFailure,
            Self::CaptureFailed(_) => ErrorKind::CaptureFailed,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::GrantDenied(_) => ErrorKind::GrantDenied,
        }
    }
}
