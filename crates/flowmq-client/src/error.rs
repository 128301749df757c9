//! Error types for FlowMQ client operations.
//!
//! ## Error Handling Strategy
//!
//! - **Retried inside the send pipeline**: `Transport`, `BrokerRejected` —
//!   the attempt loop rotates to the next candidate partition until the
//!   attempt budget is exhausted, then surfaces the last error.
//! - **Immediate, non-retriable**: `NotStarted`, `Signing`,
//!   `NoWritablePartition`, `Unsupported`, `Config`.
//! - **Surfaced to the caller**: `RouteResolution` (retry belongs to the
//!   user layer), `Timeout` (the in-flight RPC may still complete and is
//!   discarded).

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used by every public API in this crate.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors produced by the producer client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A `send*` method was called while the producer was not in the
    /// `Started` state.
    #[error("producer is not started")]
    NotStarted,

    /// Building the signed request metadata failed.
    #[error("failed to sign request metadata: {0}")]
    Signing(String),

    /// The topic route could not be resolved.
    #[error("failed to resolve route for topic '{topic}': {reason}")]
    RouteResolution { topic: String, reason: String },

    /// The topic route holds no partition the producer may write to.
    #[error("topic '{0}' has no writable partition")]
    NoWritablePartition(String),

    /// The RPC never produced a broker response: connect failure, I/O
    /// error, or the per-attempt deadline elapsed.
    #[error("transport failure for {endpoints}: {reason}")]
    Transport { endpoints: String, reason: String },

    /// The RPC completed but the broker answered with a non-OK status.
    #[error("broker {endpoints} rejected the request: code={code}, message={message}")]
    BrokerRejected {
        endpoints: String,
        code: i32,
        message: String,
    },

    /// The caller-provided deadline elapsed before the send pipeline
    /// finished.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The operation exists on the API surface but has no implemented
    /// semantics yet.
    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// The builder was given an invalid or incomplete configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
