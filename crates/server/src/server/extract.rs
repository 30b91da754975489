//! Request body parsing.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderMap},
    Form, Json,
};
use common::ServiceError;
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// Maximum accepted request body size.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Request body accepted as JSON or as a URL-encoded form.
///
/// The `Content-Type` header picks the parser; anything that is not a form
/// is parsed as JSON. Parse failures keep the rejection's status code and
/// go through the error envelope like every other error.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(req.headers()) {
            let Form(value) = Form::<T>::from_request(req, state).await.map_err(|r| {
                ServiceError::with_status(r.status().as_u16(), r.body_text())
            })?;
            Ok(Payload(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state).await.map_err(|r| {
                ServiceError::with_status(r.status().as_u16(), r.body_text())
            })?;
            Ok(Payload(value))
        }
    }
}
