//! Request-scoped error type shared by the core and route collaborators.

use thiserror::Error;

/// Boxed error used as the optional cause of an internal failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error raised while handling a single request.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::Unauthorized`] → 401
/// - [`ServiceError::Forbidden`] → 403
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::Conflict`] → 409
/// - [`ServiceError::Unavailable`] → 503
/// - [`ServiceError::Status`] → the attached status
/// - [`ServiceError::Internal`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed: unparseable body, missing field.
    #[error("{0}")]
    BadRequest(String),

    /// The caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller may not perform this request.
    #[error("{0}")]
    Forbidden(String),

    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request conflicts with existing state.
    #[error("{0}")]
    Conflict(String),

    /// A dependency is temporarily unavailable.
    #[error("{0}")]
    Unavailable(String),

    /// An error carrying an explicit status code.
    #[error("{message}")]
    Status {
        /// HTTP status code attached by the raiser.
        status: u16,
        /// Human-readable description.
        message: String,
    },

    /// An unexpected failure. Always maps to 500.
    #[error("{message}")]
    Internal {
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },
}

impl ServiceError {
    /// Status used when an attached status code is not a valid error status.
    pub const DEFAULT_STATUS: u16 = 500;

    /// Build an [`ServiceError::Internal`] with an underlying cause.
    pub fn internal(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Build a [`ServiceError::Status`] from an explicit status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code that should be sent for this error.
    ///
    /// An attached status outside `400..=599` falls back to
    /// [`Self::DEFAULT_STATUS`].
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::Unauthorized(_) => 401,
            ServiceError::Forbidden(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Status { status, .. } if (400..=599).contains(status) => *status,
            ServiceError::Status { .. } => Self::DEFAULT_STATUS,
            ServiceError::Internal { .. } => Self::DEFAULT_STATUS,
        }
    }
}
