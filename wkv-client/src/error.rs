use std::time::Duration;

use thiserror::Error;

/// Result type for the RESP client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the RESP client and its pool.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,
    /// Server returned an error reply.
    #[error("server error: {}", String::from_utf8_lossy(.message))]
    Server { message: Vec<u8> },
    /// Response type did not match the expected command response.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// Pool is at capacity and no idle connections are available.
    #[error("connection pool exhausted")]
    PoolExhausted,
    /// No connection became available within the acquire timeout.
    #[error("timed out after {0:?} waiting for a pooled connection")]
    AcquireTimeout(Duration),
    /// Pool has been closed.
    #[error("connection pool closed")]
    PoolClosed,
    /// Address could not be resolved into a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// A configuration field has an unusable value.
    #[error("invalid config field `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    /// Configuration document could not be parsed.
    #[error("config parse error: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns true when the connection that produced this error can no
    /// longer be trusted and must not go back to the idle set.
    pub fn poisons_connection(&self) -> bool {
        matches!(self, ClientError::Io(_) | ClientError::Protocol)
    }
}
