//! Error types for homewire-client.

use thiserror::Error;

/// Main error type for all homewire operations.
#[derive(Debug, Error)]
pub enum HomewireError {
    /// Malformed frame or unresolvable resynchronization.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Credentials or token rejected by the server.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// I/O error on the transport (refused, reset, timed out).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Collaborator-level request failure (e.g. token acquisition).
    #[error("request failed: {0}")]
    Request(String),

    /// Non-2xx response from a collaborator HTTP call.
    #[error("unexpected HTTP status: {0}")]
    HttpStatus(u16),

    /// JSON error while parsing an in-band reply.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Keepalive response not observed within the deadline.
    #[error("keepalive timed out")]
    KeepaliveTimeout,
}

/// Result type alias using HomewireError.
pub type Result<T> = std::result::Result<T, HomewireError>;
