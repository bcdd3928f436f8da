//! Public, transport-agnostic RPC client configuration.
//!
//! Holds no transport-specific settings such as MQTT client options.
//! Connection management belongs to whoever
//! constructs the [`Transport`](crate::Transport).

use std::time::Duration;

/// Default wait bound used by [`RpcClient::request`](crate::RpcClient::request).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound of the reply-to subscription inbox.
pub const DEFAULT_INBOX_CAPACITY: usize = 64;

/// Client configuration.
///
/// # Example
///
/// ```
/// use pubsub_rpc::RpcConfig;
/// use std::time::Duration;
///
/// let config = RpcConfig::new("vehicle/responses/cli-7")
///     .with_request_timeout(Duration::from_secs(5))
///     .with_inbox_capacity(256);
///
/// assert_eq!(config.response_topic, "vehicle/responses/cli-7");
/// ```
#[derive(Debug, Clone)]
pub struct RpcConfig {
    // ---
    /// Shared reply-to topic. The client subscribes to it once and every
    /// outgoing request names it as its reply-to address.
    pub response_topic: String,

    /// Wait bound for the convenience call forms.
    ///
    /// Only the wait is bounded; the request is always published first.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Channel capacity requested for the reply-to subscription.
    ///
    /// Default: 64
    pub inbox_capacity: usize,
}

impl RpcConfig {
    /// Create a config replying on `response_topic`, with defaults elsewhere.
    pub fn new(response_topic: impl Into<String>) -> Self {
        Self {
            response_topic: response_topic.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }

    /// Set the wait bound used by [`RpcClient::request`](crate::RpcClient::request).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the reply-to inbox capacity.
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }
}
