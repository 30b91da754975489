//! Structured logging and optional OpenTelemetry span export.
//!
//! # Telemetry invariants
//!
//! - **No credential material** may appear in any span attribute or log
//!   field. [`crate::config::ProcessConfig`] and
//!   [`crate::store::StoreCredentials`] redact themselves in `Debug`.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   overrides it.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
