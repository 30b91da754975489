//! Axum router construction.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use super::{
    error::panic_response,
    extract::BODY_LIMIT_BYTES,
    handlers, middleware,
    routes::RouteGroup,
    state::AppState,
};

const HSTS: &str = "max-age=15552000; includeSubDomains";

/// Build the application [`Router`]: core routes, every route group nested
/// at its prefix, and the middleware pipeline.
///
/// Per-request order, outermost first:
///
/// 1. request id assignment and propagation
/// 2. error translation, then panic capture
/// 3. security headers and the origin allow-list
/// 4. request logging
/// 5. body limit
/// 6. reflective CORS, which answers every `OPTIONS` request
/// 7. route dispatch
pub fn build(state: AppState, groups: Vec<Box<dyn RouteGroup>>) -> Router {
    let mut router = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/cors-test", get(handlers::cors_test))
        .fallback(handlers::not_found)
        .with_state(state.clone());

    for group in groups {
        tracing::debug!(prefix = group.prefix(), "mounting route group");
        router = router.nest(group.prefix(), group.router());
    }

    let hsts = state
        .config
        .is_production()
        .then(|| HeaderValue::from_static(HSTS));

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(
                middleware::REQUEST_ID_HEADER,
                middleware::MakeRequestUuid,
            ))
            .layer(PropagateRequestIdLayer::new(middleware::REQUEST_ID_HEADER))
            .layer(from_fn_with_state(state.clone(), middleware::render_errors))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(from_fn(middleware::attach_context))
            .layer(security_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
            .layer(security_header(header::X_FRAME_OPTIONS, "SAMEORIGIN"))
            .layer(security_header(header::REFERRER_POLICY, "no-referrer"))
            .layer(security_header(header::X_DNS_PREFETCH_CONTROL, "off"))
            .layer(security_header(
                HeaderName::from_static("cross-origin-opener-policy"),
                "same-origin",
            ))
            .layer(security_header(
                HeaderName::from_static("cross-origin-resource-policy"),
                "cross-origin",
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::STRICT_TRANSPORT_SECURITY,
                hsts,
            ))
            .layer(from_fn_with_state(state, middleware::enforce_allow_list))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(middleware::make_request_span)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            )
            .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
            .layer(from_fn(middleware::reflect_cors)),
    )
}

fn security_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}
