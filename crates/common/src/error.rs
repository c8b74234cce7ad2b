//! Error types shared across Clipcast crates.

use serde::{Deserialize, Serialize};

/// Coarse classification of a [`ClipcastError`], used for retry decisions
/// and for user-facing failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionBlocked,
    DeviceBusy,
    DeviceNotFound,
    InsecureContext,
    UserCancelled,
    EncoderFailure,
    ExportFailure,
    InvalidTransition,
    ExportInProgress,
    Config,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::PermissionBlocked => "permission_blocked",
            ErrorKind::DeviceBusy => "device_busy",
            ErrorKind::DeviceNotFound => "device_not_found",
            ErrorKind::InsecureContext => "insecure_context",
            ErrorKind::UserCancelled => "user_cancelled",
            ErrorKind::EncoderFailure => "encoder_failure",
            ErrorKind::ExportFailure => "export_failure",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::ExportInProgress => "export_in_progress",
            ErrorKind::Config => "config",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Whether the user can reasonably retry after this failure.
    ///
    /// Insecure contexts and invalid transitions are programming or
    /// deployment problems; everything else may succeed on a second attempt.
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            ErrorKind::InsecureContext | ErrorKind::InvalidTransition | ErrorKind::Config
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for Clipcast operations.
#[derive(Debug, thiserror::Error)]
pub enum ClipcastError {
    #[error("Permission blocked: {message}")]
    PermissionBlocked { message: String },

    #[error("Device busy: {message}")]
    DeviceBusy { message: String },

    #[error("Device not found: {message}")]
    DeviceNotFound { message: String },

    #[error("Insecure context: {message}")]
    InsecureContext { message: String },

    #[error("Cancelled by user")]
    UserCancelled,

    #[error("Encoder failure: {message}")]
    EncoderFailure { message: String },

    #[error("Export failure: {message}")]
    ExportFailure { message: String },

    #[error("Illegal lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("An export is already running for artifact {artifact}")]
    ExportInProgress { artifact: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{message}")]
    Unknown { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClipcastError.
pub type ClipcastResult<T> = Result<T, ClipcastError>;

impl ClipcastError {
    pub fn permission_blocked(msg: impl Into<String>) -> Self {
        Self::PermissionBlocked {
            message: msg.into(),
        }
    }

    pub fn device_busy(msg: impl Into<String>) -> Self {
        Self::DeviceBusy {
            message: msg.into(),
        }
    }

    pub fn device_not_found(msg: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            message: msg.into(),
        }
    }

    pub fn insecure_context(msg: impl Into<String>) -> Self {
        Self::InsecureContext {
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::EncoderFailure {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::ExportFailure {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown {
            message: msg.into(),
        }
    }

    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionBlocked { .. } => ErrorKind::PermissionBlocked,
            Self::DeviceBusy { .. } => ErrorKind::DeviceBusy,
            Self::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Self::InsecureContext { .. } => ErrorKind::InsecureContext,
            Self::UserCancelled => ErrorKind::UserCancelled,
            Self::EncoderFailure { .. } => ErrorKind::EncoderFailure,
            Self::ExportFailure { .. } => ErrorKind::ExportFailure,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::ExportInProgress { .. } => ErrorKind::ExportInProgress,
            Self::Config { .. } => ErrorKind::Config,
            Self::Unknown { .. } | Self::Io(_) | Self::Json(_) | Self::Other(_) => {
                ErrorKind::Unknown
            }
        }
    }

    /// Re-create an equivalent error from a kind and message.
    ///
    /// Used where a failure has to be reported to more than one waiter.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::PermissionBlocked => Self::PermissionBlocked { message },
            ErrorKind::DeviceBusy => Self::DeviceBusy { message },
            ErrorKind::DeviceNotFound => Self::DeviceNotFound { message },
            ErrorKind::InsecureContext => Self::InsecureContext { message },
            ErrorKind::UserCancelled => Self::UserCancelled,
            ErrorKind::EncoderFailure => Self::EncoderFailure { message },
            ErrorKind::ExportFailure => Self::ExportFailure { message },
            ErrorKind::InvalidTransition => Self::InvalidTransition {
                from: "unknown".to_string(),
                to: message,
            },
            ErrorKind::ExportInProgress => Self::ExportInProgress { artifact: message },
            ErrorKind::Config => Self::Config { message },
            ErrorKind::Unknown => Self::Unknown { message },
        }
    }
}
