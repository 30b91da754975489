//! Axum middleware making up the request pipeline.
//!
//! See [`super::router::build`] for the order in which these run.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN, VARY,
        },
        request::Parts,
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use common::{ErrorEnvelope, ServiceError};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{error, warn, Span};
use uuid::Uuid;

use super::error::{ApiError, ErrorReport};
use super::state::AppState;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Message for requests from origins outside the allow-list.
pub const ORIGIN_REJECTED: &str = "Not allowed by CORS";

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str =
    "Origin, X-Requested-With, Content-Type, Accept, Authorization, X-Request-Id";
const EXPOSE_HEADERS: &str = "Content-Length, X-Request-Id";

// ---------------------------------------------------------------------------
// Request identity
// ---------------------------------------------------------------------------

/// Generate UUID-based request IDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

fn request_id_of(headers: &HeaderMap) -> String {
    headers
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

fn origin_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ORIGIN)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// Per-request context: identifier and negotiated origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub origin: Option<String>,
}

impl RequestContext {
    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: request_id_of(headers),
            origin: origin_of(headers),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext::from_headers(&parts.headers)))
    }
}

/// Attach a [`RequestContext`] to the request.
pub async fn attach_context(mut request: Request, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers());
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

/// Span for one request, used by the logging stage.
pub fn make_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id_of(request.headers()),
    )
}

// ---------------------------------------------------------------------------
// Stage 1: origin allow-list
// ---------------------------------------------------------------------------

/// Enforce the configured origin allow-list.
///
/// Requests without `Origin` pass untouched. Listed origins pass and have
/// their origin echoed back. Unlisted origins are rejected before any later
/// stage runs, except `OPTIONS`, which is left to the reflective responder.
pub async fn enforce_allow_list(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(origin) = origin_of(request.headers()) else {
        return Ok(next.run(request).await);
    };

    if state.config.allows_origin(&origin) {
        let mut response = next.run(request).await;
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(VARY, HeaderValue::from_static("origin"));
        return Ok(response);
    }

    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    warn!(origin = %origin, path = %request.uri().path(), "origin not on allow-list");
    Err(ServiceError::Forbidden(ORIGIN_REJECTED.into()).into())
}

// ---------------------------------------------------------------------------
// Stage 4: reflective CORS responder
// ---------------------------------------------------------------------------

/// Mirror the request's origin (or `*`) into the CORS response headers and
/// answer every `OPTIONS` request directly with an empty 200.
pub async fn reflect_cors(request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
    response
}

// ---------------------------------------------------------------------------
// Terminal error translation
// ---------------------------------------------------------------------------

/// Translate every error response into an [`ErrorEnvelope`].
///
/// Responses produced from an [`ApiError`] carry an [`ErrorReport`]; any
/// other 4xx/5xx response (unmatched method, framework rejections) gets the
/// status's canonical reason. The diagnostic trace is included only outside
/// production.
pub async fn render_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let request_id = request_id_of(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    let (message, trace) = match parts.extensions.remove::<ErrorReport>() {
        Some(report) => (report.message, report.trace),
        None => {
            let reason = status.canonical_reason().unwrap_or("Request failed").to_string();
            let trace = format!("{status} returned by {method} {path}");
            (reason, trace)
        }
    };

    if status.is_server_error() {
        error!(%request_id, %method, %path, status = status.as_u16(), error = %message, trace = %trace, "request failed");
    } else {
        warn!(%request_id, %method, %path, status = status.as_u16(), error = %message, "request rejected");
    }

    let mut envelope = ErrorEnvelope::new(message, request_id);
    if !state.config.is_production() {
        envelope = envelope.with_stack(trace);
    }

    let (body_parts, body) = Json(envelope).into_response().into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    if let Some(content_type) = body_parts.headers.get(CONTENT_TYPE) {
        parts.headers.insert(CONTENT_TYPE, content_type.clone());
    }
    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::{middleware, routing::get, Router};
    use axum_test::TestServer;
    use serde_json::Value;

    use crate::config::ProcessConfig;

    fn state(env: &str) -> AppState {
        let mut vars = HashMap::new();
        vars.insert("APP_ENV".to_string(), env.to_string());
        vars.insert(
            "DEV_ALLOWED_ORIGINS".to_string(),
            "http://localhost:5173".to_string(),
        );
        AppState::new(Arc::new(ProcessConfig::from_vars(vars)))
    }

    async fn boom() -> Result<&'static str, ApiError> {
        Err(ServiceError::with_status(404, "no such league").into())
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/boom", get(boom))
            .layer(middleware::from_fn(reflect_cors))
            .layer(middleware::from_fn_with_state(state.clone(), enforce_allow_list))
            .layer(middleware::from_fn_with_state(state, render_errors))
    }

    fn origin(value: &'static str) -> HeaderValue {
        HeaderValue::from_static(value)
    }

    #[tokio::test]
    async fn allowed_origin_passes() {
        let server = TestServer::new(app(state("development"))).unwrap();
        let resp = server
            .get("/ok")
            .add_header(ORIGIN, origin("http://localhost:5173"))
            .await;
        resp.assert_status_ok();
        assert_eq!(
            resp.header(ACCESS_CONTROL_ALLOW_ORIGIN),
            "http://localhost:5173"
        );
    }

    #[tokio::test]
    async fn unlisted_origin_is_rejected() {
        let server = TestServer::new(app(state("development"))).unwrap();
        let resp = server
            .get("/ok")
            .add_header(ORIGIN, origin("https://evil.example"))
            .await;
        resp.assert_status(StatusCode::FORBIDDEN);
        let body: Value = resp.json();
        assert_eq!(body["error"], ORIGIN_REJECTED);
    }

    #[tokio::test]
    async fn unlisted_origin_preflight_still_succeeds() {
        let server = TestServer::new(app(state("development"))).unwrap();
        let resp = server
            .method(Method::OPTIONS, "/ok")
            .add_header(ORIGIN, origin("https://evil.example"))
            .await;
        resp.assert_status_ok();
        assert_eq!(resp.text(), "");
        assert_eq!(
            resp.header(ACCESS_CONTROL_ALLOW_ORIGIN),
            "https://evil.example"
        );
    }

    #[tokio::test]
    async fn no_origin_reflects_wildcard() {
        let server = TestServer::new(app(state("development"))).unwrap();
        let resp = server.get("/ok").await;
        resp.assert_status_ok();
        assert_eq!(resp.header(ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        assert_eq!(resp.header(ACCESS_CONTROL_ALLOW_CREDENTIALS), "true");
        assert_eq!(resp.header(ACCESS_CONTROL_EXPOSE_HEADERS), EXPOSE_HEADERS);
    }

    #[tokio::test]
    async fn error_envelope_has_stack_outside_production() {
        let server = TestServer::new(app(state("development"))).unwrap();
        let resp = server.get("/boom").await;
        resp.assert_status(StatusCode::NOT_FOUND);
        let body: Value = resp.json();
        assert_eq!(body["error"], "no such league");
        assert!(body["requestId"].is_string());
        assert!(body["stack"].as_str().unwrap().contains("Status"));
    }

    #[tokio::test]
    async fn error_envelope_has_no_stack_in_production() {
        let server = TestServer::new(app(state("production"))).unwrap();
        let resp = server.get("/boom").await;
        resp.assert_status(StatusCode::NOT_FOUND);
        let body: Value = resp.json();
        assert_eq!(body["error"], "no such league");
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn unreported_errors_get_an_envelope() {
        let server = TestServer::new(app(state("production"))).unwrap();
        let resp = server.post("/ok").await;
        resp.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = resp.json();
        assert_eq!(body["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn context_prefers_extension_over_headers() {
        let mut parts = axum::http::Request::builder()
            .header(ORIGIN, "http://a.example")
            .header(REQUEST_ID_HEADER, "from-header")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let ctx = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.request_id, "from-header");
        assert_eq!(ctx.origin.as_deref(), Some("http://a.example"));

        parts.extensions.insert(RequestContext {
            request_id: "from-extension".into(),
            origin: None,
        });
        let ctx = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.request_id, "from-extension");
    }
}
