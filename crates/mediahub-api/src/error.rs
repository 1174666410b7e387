//! API error types and HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use mediahub_core::cec::{AdapterError, CecError};
use mediahub_core::Error as CoreError;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Standard JSON error response body.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message (safe for clients).
    pub message: String,
    /// Offending settings field for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// HTTP API error with stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    field: Option<String>,
}

impl ApiError {
    /// Returns an error response for a rejected settings candidate.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_field(field)
    }

    /// Returns an error response for a failed settings write.
    pub fn persist_failed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "PERSIST_FAILED", message)
    }

    /// Returns an error response for an unknown app key.
    pub fn unknown_app(key: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "UNKNOWN_APP",
            format!("unknown app: {key}"),
        )
    }

    /// Returns an error response for a disabled app.
    pub fn app_disabled(key: &str) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "APP_DISABLED",
            format!("app is disabled: {key}"),
        )
    }

    /// Returns an error response for a failed launch.
    pub fn launch_failed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "LAUNCH_FAILED", message)
    }

    /// Returns an error response for a failed CEC adapter call.
    pub fn adapter(error: &AdapterError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "ADAPTER_ERROR", error.to_string())
    }

    /// Returns an error response when CEC control is switched off.
    #[must_use]
    pub fn cec_disabled() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "CEC_DISABLED",
            "CEC control is disabled in settings",
        )
    }

    /// Returns an error response for a failed shutdown/reboot command.
    pub fn power_command_failed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "POWER_COMMAND_FAILED", message)
    }

    /// Returns an error response for invalid request input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Returns an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    /// Attaches the offending field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Returns the offending field, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            field: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "Request failed");
        }
        (
            self.status,
            Json(ApiErrorBody {
                code: self.code.to_string(),
                message: self.message,
                field: self.field,
            }),
        )
            .into_response()
    }
}

impl From<CecError> for ApiError {
    fn from(value: CecError) -> Self {
        match value {
            CecError::Disabled => Self::cec_disabled(),
            CecError::Adapter(e) => Self::adapter(&e),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::Validation { field, reason } => Self::validation(field, reason),
            e @ CoreError::Persist { .. } => Self::persist_failed(e.to_string()),
            CoreError::UnknownApp(key) => Self::unknown_app(&key),
            CoreError::AppDisabled(key) => Self::app_disabled(&key),
            CoreError::Launch(e) => Self::launch_failed(e.to_string()),
            CoreError::Cec(e) => e.into(),
            CoreError::PowerCommand { message } => Self::power_command_failed(message),
            CoreError::InvalidInput(message) => Self::bad_request(message),
            e @ (CoreError::ConfigCorrupt { .. } | CoreError::Internal { .. }) => {
                Self::internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mediahub_core::cec::AdapterErrorKind;
    use mediahub_core::supervisor::{LaunchError, LaunchErrorKind};

    use super::*;

    #[test]
    fn core_errors_map_to_stable_codes() {
        let cases = [
            (
                CoreError::validation("apps.yt.url", "must not be empty"),
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
            ),
            (
                CoreError::persist("write", std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSIST_FAILED",
            ),
            (
                CoreError::UnknownApp("x".into()),
                StatusCode::NOT_FOUND,
                "UNKNOWN_APP",
            ),
            (
                CoreError::AppDisabled("x".into()),
                StatusCode::CONFLICT,
                "APP_DISABLED",
            ),
            (
                LaunchError::new(LaunchErrorKind::BinaryMissing, "no browser").into(),
                StatusCode::BAD_GATEWAY,
                "LAUNCH_FAILED",
            ),
            (
                LaunchError::new(LaunchErrorKind::TerminateFailed, "pid 42 survived SIGKILL")
                    .into(),
                StatusCode::BAD_GATEWAY,
                "LAUNCH_FAILED",
            ),
            (
                CecError::Disabled.into(),
                StatusCode::CONFLICT,
                "CEC_DISABLED",
            ),
            (
                CecError::from(AdapterError::new(AdapterErrorKind::Timeout, "slow")).into(),
                StatusCode::BAD_GATEWAY,
                "ADAPTER_ERROR",
            ),
            (
                CoreError::PowerCommand {
                    message: "sudo failed".into(),
                },
                StatusCode::BAD_GATEWAY,
                "POWER_COMMAND_FAILED",
            ),
            (
                CoreError::internal("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
            ),
        ];

        for (error, status, code) in cases {
            let api = ApiError::from(error);
            assert_eq!(api.status(), status, "{code}");
            assert_eq!(api.code(), code);
        }
    }

    #[test]
    fn validation_error_carries_field() {
        let api = ApiError::from(CoreError::validation("startup.boot_delay_s", "too large"));
        assert_eq!(api.field(), Some("startup.boot_delay_s"));
        assert_eq!(api.message(), "too large");
    }

    #[tokio::test]
    async fn body_omits_absent_field() {
        let response = ApiError::unknown_app("nope").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"code": "UNKNOWN_APP", "message": "unknown app: nope"})
        );
    }
}
