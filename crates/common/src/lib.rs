//! Common types, protocol definitions, and errors shared across SleepLeague crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
pub use protocol::{CorsTestResponse, ErrorEnvelope, HealthResponse};
