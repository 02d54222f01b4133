//! Gateway error types
//!
//! One taxonomy covers both surfaces: WebSocket events reply with a
//! structured `error` envelope carrying `code()`, REST handlers convert the
//! same error into an HTTP response via `IntoResponse`.

pub mod conversion;
pub mod types;

pub use types::GatewayError;

/// Result alias used throughout the gateway.
pub type GatewayResult<T> = Result<T, GatewayError>;
