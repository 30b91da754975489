//! Axum HTTP server: routing, middleware pipeline, and route groups.
//!
//! # Responsibilities
//! - Compose the per-request pipeline (request ids, error translation,
//!   security headers, origin checks, logging, body parsing, CORS).
//! - Mount the core routes and every feature route group.
//! - Translate request-scoped errors into the JSON error envelope.

pub mod clock;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod state;
