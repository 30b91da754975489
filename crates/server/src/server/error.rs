//! Request-scoped errors and their hand-off to the terminal error translator.
//!
//! Handlers and middleware return [`ApiError`]. Its response carries only a
//! status and an [`ErrorReport`] extension; the body is written once, by
//! [`super::middleware::render_errors`], which knows the request id and the
//! process mode.

use std::any::Any;
use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::ServiceError;

use crate::store::StoreError;

/// Error returned by handlers and middleware.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(ServiceError::BadRequest(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self(ServiceError::NotFound(message.into()))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let inner = match e {
            StoreError::NotFound { .. } => ServiceError::NotFound(e.to_string()),
            StoreError::AlreadyExists { .. } => ServiceError::Conflict(e.to_string()),
            other => ServiceError::internal("data access failed", other),
        };
        Self(inner)
    }
}

/// Failure details attached to an error response for the translator.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Message exposed to the client.
    pub message: String,
    /// Error and its source chain; exposed outside production only.
    pub trace: String,
}

impl ErrorReport {
    fn from_error(err: &ServiceError) -> Self {
        Self {
            message: err.to_string(),
            trace: diagnostic_trace(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response
            .extensions_mut()
            .insert(ErrorReport::from_error(&self.0));
        response
    }
}

/// Debug form of `err` followed by one `caused by:` line per source.
pub fn diagnostic_trace(err: &(dyn StdError + 'static)) -> String {
    let mut trace = format!("{err:?}");
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push_str("\ncaused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    trace
}

/// Response for a panic caught in the pipeline.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    ApiError(ServiceError::internal("Internal server error", format!("panic: {detail}")))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_carries_report_and_no_body_yet() {
        let response = ApiError::not_found("sleep record 9 not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.message, "sleep record 9 not found");
        assert!(report.trace.starts_with("NotFound("));
    }

    #[test]
    fn explicit_status_is_used() {
        let e = ApiError(ServiceError::with_status(429, "slow down"));
        assert_eq!(e.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let nf = ApiError::from(StoreError::NotFound {
            collection: "users".into(),
            id: "u1".into(),
        });
        assert_eq!(nf.status(), StatusCode::NOT_FOUND);

        let dup = ApiError::from(StoreError::AlreadyExists {
            collection: "users".into(),
            id: "u1".into(),
        });
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let backend = ApiError::from(StoreError::Backend("throttled".into()));
        assert_eq!(backend.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(backend.to_string(), "data access failed");
    }

    #[test]
    fn trace_includes_source_chain() {
        let e = ServiceError::internal(
            "data access failed",
            StoreError::Backend("connection reset".into()),
        );
        let trace = diagnostic_trace(&e);
        assert!(trace.starts_with("Internal {"));
        assert!(trace.contains("caused by: store request failed: connection reset"));
    }

    #[test]
    fn panic_becomes_internal_error() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.message, "Internal server error");
        assert!(report.trace.contains("panic: boom"));
    }
}
