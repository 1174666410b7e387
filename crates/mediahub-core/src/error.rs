//! Error types and result aliases for mediahub.
//!
//! Component errors ([`CecError`], [`LaunchError`]) carry their own kinds and
//! convert into [`Error`] so the control server can map every failure onto a
//! single taxonomy.

use crate::cec::CecError;
use crate::supervisor::LaunchError;

/// The result type used throughout mediahub.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in orchestrator operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A persisted settings document exists but cannot be parsed.
    #[error("settings document {path} is corrupt: {message}")]
    ConfigCorrupt {
        /// Path of the unreadable document.
        path: String,
        /// Parser or I/O failure description.
        message: String,
    },

    /// A candidate settings document failed validation.
    #[error("invalid value for {field}: {reason}")]
    Validation {
        /// Dotted path of the offending field (e.g. `apps.youtube.url`).
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Writing the settings document failed; the in-memory snapshot is unchanged.
    #[error("failed to persist settings: {message}")]
    Persist {
        /// Description of the persistence failure.
        message: String,
        /// The underlying I/O error, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// The CEC remote power controller failed or is disabled.
    #[error(transparent)]
    Cec(#[from] CecError),

    /// The presented application could not be launched.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// No app with this key exists in the current settings.
    #[error("unknown app: {0}")]
    UnknownApp(String),

    /// The app exists but is disabled.
    #[error("app is disabled: {0}")]
    AppDisabled(String),

    /// The OS shutdown/reboot command failed.
    #[error("power command failed: {message}")]
    PowerCommand {
        /// Description of the failure.
        message: String,
    },

    /// Invalid process configuration (environment or CLI input).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a validation error for `field`.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a persistence error with an I/O cause.
    #[must_use]
    pub fn persist(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Persist {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cec::{AdapterError, AdapterErrorKind};

    #[test]
    fn validation_error_names_field() {
        let err = Error::validation("apps.yt.url", "must not be empty");
        assert_eq!(
            err.to_string(),
            "invalid value for apps.yt.url: must not be empty"
        );
    }

    #[test]
    fn adapter_error_converts_through_cec_error() {
        let err: Error = CecError::from(AdapterError::new(
            AdapterErrorKind::NotAvailable,
            "cec-client not installed",
        ))
        .into();
        assert!(matches!(err, Error::Cec(CecError::Adapter(_))));
        assert!(err.to_string().contains("not_available"));
    }
}
