// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the domain-level transport interface the RPC client
//! uses to exchange messages. It intentionally avoids any reference to
//! concrete protocols, brokers, or client libraries.
//!
//! The transport layer is responsible only for delivering opaque envelopes
//! to subscribed consumers. RPC correlation, timeouts and cancellation are
//! handled by the client.
//!
//! Concrete implementations of this interface live under `src/transport/`.
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{CorrelationId, Result};

/// A transport address (topic).
///
/// Its interpretation is transport-specific (MQTT topic, routing key, queue
/// name), but it is treated as an opaque identifier at the domain level.
///
/// Addresses are immutable, cheap to clone, and safe to share across threads.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(pub Arc<str>);

impl<T> From<T> for Address
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Address(value.into())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A subscription identifier.
///
/// How a subscription matches an address is defined by the transport
/// implementation. The in-memory transport matches exactly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(pub Arc<str>);

impl From<Address> for Subscription {
    fn from(address: Address) -> Self {
        // ---
        Subscription(address.0)
    }
}

impl<T> From<T> for Subscription
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Subscription(value.into())
    }
}

/// An opaque message envelope.
///
/// The unit of transport between producers and consumers. The payload is
/// never interpreted by the transport; the correlation id and reply-to
/// address are metadata carried alongside it.
///
/// ```
/// # use pubsub_rpc::{Address, CorrelationId, Envelope};
/// # use bytes::Bytes;
/// let id = CorrelationId::generate();
///
/// let request = Envelope::request(
///     Address::from("vehicle/requests"),
///     Bytes::from_static(b"{}"),
///     id,
///     Address::from("vehicle/responses/cli-1"),
/// );
/// let response = Envelope::response(
///     request.reply_to.clone().unwrap(),
///     Bytes::from_static(b"{}"),
///     id,
/// );
/// assert_eq!(response.correlation_id(), Some(id));
/// ```
#[derive(Clone, Debug)]
pub struct Envelope {
    // ---
    /// Delivery address used by the transport.
    pub address: Address,

    /// Opaque payload bytes.
    pub payload: Bytes,

    /// Raw correlation id metadata. Absent or malformed means the message
    /// cannot be matched to a call.
    pub correlation_id: Option<Bytes>,

    /// Address the responder should publish its answer to.
    pub reply_to: Option<Address>,
}

impl Envelope {
    // ---
    /// Create a request envelope.
    pub fn request(
        address: Address,
        payload: Bytes,
        correlation_id: CorrelationId,
        reply_to: Address,
    ) -> Self {
        // ---
        Self {
            address,
            payload,
            correlation_id: Some(correlation_id.to_bytes()),
            reply_to: Some(reply_to),
        }
    }

    /// Create a response envelope addressed to a request's reply-to.
    pub fn response(address: Address, payload: Bytes, correlation_id: CorrelationId) -> Self {
        // ---
        Self {
            address,
            payload,
            correlation_id: Some(correlation_id.to_bytes()),
            reply_to: None,
        }
    }

    /// Parse the correlation id metadata, if present and well-formed.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
            .as_deref()
            .and_then(CorrelationId::from_slice)
    }
}

/// Handle returned from a successful subscription.
///
/// The subscription remains active until either the handle is dropped or
/// the transport is closed. When the transport closes, `inbox.recv()`
/// returns `None`.
pub struct SubscriptionHandle {
    // ---
    /// Receiver channel for delivered envelopes matching this subscription.
    pub inbox: mpsc::Receiver<Envelope>,
}

/// Transport abstraction.
///
/// A `Transport` provides best-effort delivery of message envelopes between
/// publishers and subscribers. Correlation, timeouts and cancellation are
/// layered on top by [`RpcClient`](crate::RpcClient).
///
/// Implementations must ensure that:
/// - Once `subscribe()` returns successfully, messages published *after* that
///   point and matching the subscription are deliverable.
/// - `publish()` does not wait for any subscriber to process the message.
/// - Failures are reported as [`RpcError::Transport`](crate::RpcError::Transport)
///   carrying the underlying cause.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat methods as normal
/// `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Publish an envelope to `env.address`.
    async fn publish(&self, env: Envelope) -> Result<()>;

    /// Register a subscription and return a handle for receiving messages.
    ///
    /// `capacity` bounds the inbox channel where the transport buffers
    /// messages for a slow consumer.
    async fn subscribe(&self, sub: Subscription, capacity: usize) -> Result<SubscriptionHandle>;

    /// Close the transport and release any associated resources.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// `.clone()` is cheap and all clones share the same underlying connection.
pub type TransportPtr = Arc<dyn Transport>;

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_correlation_id_metadata() {
        // ---
        let id = CorrelationId::generate();
        let mut env = Envelope::response(Address::from("r"), Bytes::new(), id);
        assert_eq!(env.correlation_id(), Some(id));

        env.correlation_id = Some(Bytes::from_static(b"not-an-id"));
        assert_eq!(env.correlation_id(), None);

        env.correlation_id = None;
        assert_eq!(env.correlation_id(), None);
    }
}
