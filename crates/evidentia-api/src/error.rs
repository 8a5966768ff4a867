//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from evidentia-core and evidentia-state to HTTP status
//! codes. Every error body has the shape `{"error": "<message>"}`. Internal
//! error details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use evidentia_core::{EvidentiaError, ValidationError};
use evidentia_state::{EvidenceError, ReportError, SeatLimitError};

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource absent or owned by another tenant (404).
    #[error("{0}")]
    NotFound(String),

    /// Input failed a business rule (400).
    #[error("{0}")]
    Validation(String),

    /// Seat limit, export ceiling, or similar quota (400).
    #[error("{0}")]
    Capacity(String),

    /// Request could not be parsed (400).
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Caller lacks the capability or the token lacks claims (403).
    #[error("{0}")]
    Forbidden(String),

    /// Resource is in the wrong state or already exists (409).
    #[error("{0}")]
    Conflict(String),

    /// Internal failure (500). Logged, never returned.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Capacity(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for the not-found error of a resource kind.
    pub fn not_found(kind: &str) -> Self {
        Self::NotFound(format!("{kind} not found"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "internal server error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<EvidentiaError> for AppError {
    fn from(err: EvidentiaError) -> Self {
        match err {
            EvidentiaError::Validation(v) => v.into(),
            denied @ EvidentiaError::AccessDenied { .. } => Self::Forbidden(denied.to_string()),
        }
    }
}

impl From<EvidenceError> for AppError {
    fn from(err: EvidenceError) -> Self {
        Self::Conflict(err.to_string())
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidType(_) => Self::Validation(err.to_string()),
            ReportError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            ReportError::NotReady => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<SeatLimitError> for AppError {
    fn from(err: SeatLimitError) -> Self {
        Self::Capacity(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidentia_core::{Capability, Role};
    use evidentia_state::{EvidenceStatus, ReportStatus};
    use http_body_util::BodyExt;

    #[test]
    fn status_codes() {
        assert_eq!(AppError::not_found("evidence").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Capacity("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_kind() {
        assert_eq!(AppError::not_found("requirement").to_string(), "requirement not found");
    }

    #[test]
    fn domain_conversions() {
        let e: AppError = EvidenceError::InvalidTransition {
            expected: EvidenceStatus::Uploading,
            actual: EvidenceStatus::Active,
        }
        .into();
        assert_eq!(e.status(), StatusCode::CONFLICT);

        let e: AppError = ReportError::NotReady.into();
        assert_eq!(e.to_string(), "report is not ready for download");
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e: AppError = ReportError::InvalidTransition {
            from: ReportStatus::Completed,
            to: ReportStatus::Pending,
        }
        .into();
        assert_eq!(e.status(), StatusCode::CONFLICT);

        let e: AppError = SeatLimitError::LimitReached { limit: 10 }.into();
        assert!(matches!(e, AppError::Capacity(_)));

        let e: AppError = EvidentiaError::AccessDenied {
            role: Role::Viewer,
            capability: Capability::ManageEvidence,
        }
        .into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);
    }

    // ── into_response tests ──────────────────────────────────────

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn validation_message_is_returned_verbatim() {
        let (status, body) =
            response_parts(AppError::Validation("invalid evidence date format".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "invalid evidence date format");
    }

    #[tokio::test]
    async fn internal_detail_is_hidden() {
        let (status, body) =
            response_parts(AppError::Internal("connection refused to 10.0.0.5".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "internal server error");
    }

    #[tokio::test]
    async fn conflict_body_shape() {
        let (status, body) = response_parts(AppError::Conflict("email already registered".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "email already registered");
    }
}
