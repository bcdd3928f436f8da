use thiserror::Error;

use crate::correlation::CorrelationId;
use crate::value::ValueParseError;

/// Boxed underlying cause of a transport failure.
pub type TransportCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during RPC operations
#[derive(Error, Debug)]
pub enum RpcError {
    /// Deadline elapsed before a matching response arrived
    #[error("request timed out")]
    TimedOut,

    /// Caller aborted the call through its cancellation signal
    #[error("request cancelled")]
    Cancelled,

    /// Publish or subscribe failed at the transport layer
    #[error("transport error: {0}")]
    Transport(#[source] TransportCause),

    /// A pending call with this correlation id already exists
    #[error("duplicate correlation id: {0}")]
    DuplicateCorrelation(CorrelationId),

    /// Malformed numeric token while building request arguments
    #[error(transparent)]
    ValueParse(#[from] ValueParseError),

    /// JSON serialization of the outbound request failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client was shut down while the call was pending, or before it started
    #[error("client shut down")]
    Shutdown,
}

impl RpcError {
    /// Build a transport error from anything convertible into a boxed cause.
    ///
    /// ```
    /// # use pubsub_rpc::RpcError;
    /// let err = RpcError::transport("broker unreachable");
    /// assert_eq!(err.to_string(), "transport error: broker unreachable");
    /// ```
    pub fn transport(cause: impl Into<TransportCause>) -> Self {
        Self::Transport(cause.into())
    }
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_transport_keeps_cause() {
        // ---
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = RpcError::transport(io);

        let source = err.source().expect("transport error has a source");
        assert_eq!(source.to_string(), "pipe closed");
    }

    #[test]
    fn test_value_parse_is_transparent() {
        // ---
        let err: RpcError = crate::value::classify("99999999999").unwrap_err().into();
        assert!(matches!(err, RpcError::ValueParse(_)));
        assert!(err.to_string().contains("99999999999"));
    }
}
