//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended primarily for testing, local execution,
//! and as a reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! - Once `subscribe()` returns successfully, messages published *after* that
//!   point and matching the subscription are deliverable.
//! - A subscription matches an address when their strings are exactly equal.
//! - Publishing to an address nobody subscribes to succeeds and is dropped.
//! - Message delivery is deterministic within a single process.
//! - Senders whose `SubscriptionHandle` was dropped are pruned on the next
//!   `subscribe()`, or on the next `publish()` that reaches them.
//!
//! ## Non-Goals
//!
//! This transport does not attempt to emulate the failure modes, persistence,
//! or delivery guarantees of any specific broker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::{
    // ---
    log_debug,
    Envelope,
    Result,
    RpcError,
    Subscription,
    SubscriptionHandle,
    Transport,
    TransportPtr,
};

/// Shared message bus for the in-memory transport.
///
/// Simulates a message broker within a single process. All transports created
/// from the same hub publish and receive each other's messages, exactly as
/// nodes connected to a real broker would. Use one hub per test for isolation.
///
/// ```
/// # use pubsub_rpc::{create_memory_transport, MemoryHub};
/// # async fn example() -> pubsub_rpc::Result<()> {
/// let hub = MemoryHub::new();
///
/// let responder = create_memory_transport("responder", hub.clone());
/// let caller = create_memory_transport("caller", hub.clone());
/// # Ok(())
/// # }
/// ```
pub struct MemoryHub {
    // ---
    subscriptions: RwLock<HashMap<Subscription, Vec<mpsc::Sender<Envelope>>>>,
}

impl MemoryHub {
    /// Create a new, empty hub.
    pub fn new() -> Arc<Self> {
        // ---
        Arc::new(Self::default())
    }

    async fn publish(&self, _transport_id: &str, env: Envelope) {
        // ---
        // Snapshot the matching senders so a slow subscriber never holds the
        // lock while we wait for channel capacity.
        let (senders, mut stale): (Vec<mpsc::Sender<Envelope>>, bool) = {
            let subs = self.subscriptions.read().await;
            let matching = subs
                .iter()
                .filter(|(sub, _)| sub.0 == env.address.0)
                .flat_map(|(_, senders)| senders.iter());
            let mut stale = false;
            let mut live = Vec::new();
            for sender in matching {
                if sender.is_closed() {
                    stale = true;
                } else {
                    live.push(sender.clone());
                }
            }
            (live, stale)
        };

        if senders.is_empty() {
            log_debug!("{_transport_id}: no subscribers for {}", env.address);
        }

        for sender in senders {
            // A closed channel indicates a dropped SubscriptionHandle.
            if sender.send(env.clone()).await.is_err() {
                log_debug!("{_transport_id}: subscriber for {} went away", env.address);
                stale = true;
            }
        }

        if stale {
            let mut subs = self.subscriptions.write().await;
            prune_closed(&mut subs);
        }
    }

    async fn subscribe(
        &self,
        _transport_id: &str,
        sub: Subscription,
        capacity: usize,
    ) -> SubscriptionHandle {
        // ---
        log_debug!("{_transport_id}: subscribe to {sub:?}");

        let (tx, rx) = mpsc::channel(capacity.max(1));

        let mut subs = self.subscriptions.write().await;
        prune_closed(&mut subs);
        subs.entry(sub).or_default().push(tx);

        SubscriptionHandle { inbox: rx }
    }

    async fn close(&self) {
        // ---
        let mut subs = self.subscriptions.write().await;
        subs.clear();
    }

    /// Number of live subscribers on `address`.
    pub async fn subscriber_count(&self, address: &str) -> usize {
        let subs = self.subscriptions.read().await;
        subs.iter()
            .filter(|(sub, _)| &*sub.0 == address)
            .map(|(_, senders)| senders.iter().filter(|s| !s.is_closed()).count())
            .sum()
    }
}

/// Drop senders whose receiver is gone, and addresses left with none.
fn prune_closed(subs: &mut HashMap<Subscription, Vec<mpsc::Sender<Envelope>>>) {
    subs.retain(|_, senders| {
        senders.retain(|s| !s.is_closed());
        !senders.is_empty()
    });
}

impl Default for MemoryHub {
    fn default() -> Self {
        // ---
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }
}

/// In-memory transport.
///
/// Routes messages through a shared [`MemoryHub`]. Once closed, publish and
/// subscribe fail with [`RpcError::Transport`].
struct MemoryTransport {
    // ---
    transport_id: String,
    hub: Arc<MemoryHub>,
    closed: AtomicBool,
}

impl MemoryTransport {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RpcError::transport(format!(
                "memory transport {} is closed",
                self.transport_id
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    async fn publish(&self, env: Envelope) -> Result<()> {
        self.ensure_open()?;
        self.hub.publish(&self.transport_id, env).await;
        Ok(())
    }

    async fn subscribe(&self, sub: Subscription, capacity: usize) -> Result<SubscriptionHandle> {
        self.ensure_open()?;
        Ok(self.hub.subscribe(&self.transport_id, sub, capacity).await)
    }

    /// Close the transport.
    ///
    /// Clears all subscriptions from the shared hub. Note that if other
    /// transports share the same hub, their subscriptions are also cleared.
    async fn close(&self) -> Result<()> {
        // ---
        log_debug!("{}: closing transport...", self.transport_id);

        self.closed.store(true, Ordering::Release);
        self.hub.close().await;
        Ok(())
    }
}

/// Create a new in-memory transport attached to `hub`.
pub fn create_memory_transport(
    transport_id: impl Into<String>,
    hub: Arc<MemoryHub>,
) -> TransportPtr {
    // ---
    let transport_id = transport_id.into();
    log_debug!("{transport_id}: create memory transport");

    Arc::new(MemoryTransport {
        transport_id,
        hub,
        closed: AtomicBool::new(false),
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{Address, CorrelationId};
    use bytes::Bytes;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_exact_match_routing() {
        // ---
        let hub = MemoryHub::new();
        let transport = create_memory_transport("routing", hub.clone());

        let mut exact = transport.subscribe("a/b".into(), 4).await.unwrap();
        let mut other = transport.subscribe("a/+".into(), 4).await.unwrap();

        let env = Envelope::response(
            Address::from("a/b"),
            Bytes::from_static(b"x"),
            CorrelationId::generate(),
        );
        transport.publish(env).await.unwrap();

        let got = timeout(Duration::from_millis(100), exact.inbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.payload, Bytes::from_static(b"x"));
        assert!(other.inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        // ---
        let transport = create_memory_transport("lonely", MemoryHub::new());
        let env = Envelope::response(Address::from("nowhere"), Bytes::new(), CorrelationId::generate());
        transport.publish(env).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_publish() {
        // ---
        let hub = MemoryHub::new();
        let transport = create_memory_transport("closing", hub.clone());
        let mut handle = transport.subscribe("t".into(), 4).await.unwrap();

        transport.close().await.unwrap();

        // Subscriptions are dropped, so the inbox ends.
        assert!(handle.inbox.recv().await.is_none());

        let env = Envelope::response(Address::from("t"), Bytes::new(), CorrelationId::generate());
        let err = transport.publish(env).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));

        let err = transport.subscribe("t".into(), 4).await.err().unwrap();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[tokio::test]
    async fn test_subscriber_count_ignores_dropped_handles() {
        // ---
        let hub = MemoryHub::new();
        let transport = create_memory_transport("counting", hub.clone());

        let keep = transport.subscribe("t".into(), 4).await.unwrap();
        let dropped = transport.subscribe("t".into(), 4).await.unwrap();
        assert_eq!(hub.subscriber_count("t").await, 2);

        drop(dropped);
        assert_eq!(hub.subscriber_count("t").await, 1);
        drop(keep);
    }

    async fn stored_senders(hub: &MemoryHub) -> usize {
        hub.subscriptions.read().await.values().map(Vec::len).sum()
    }

    #[tokio::test]
    async fn test_shut_down_clients_do_not_accumulate() {
        // ---
        let hub = MemoryHub::new();
        let transport = create_memory_transport("churn", hub.clone());

        for _ in 0..50 {
            let config = crate::RpcConfig::new("replies/same");
            let client: crate::RpcClient<()> =
                crate::RpcClient::with_transport(transport.clone(), config)
                    .await
                    .unwrap();
            client.shutdown();
        }

        // Dispatcher tasks drop their inboxes once they observe the shutdown.
        timeout(Duration::from_secs(2), async {
            while hub.subscriber_count("replies/same").await != 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let env = Envelope::response(
            Address::from("replies/same"),
            Bytes::new(),
            CorrelationId::generate(),
        );
        transport.publish(env).await.unwrap();
        assert_eq!(stored_senders(&hub).await, 0);

        // New subscriptions also sweep out stale ones on other addresses.
        let _keep = transport.subscribe("other".into(), 4).await.unwrap();
        let dropped = transport.subscribe("gone".into(), 4).await.unwrap();
        drop(dropped);
        let _again = transport.subscribe("other".into(), 4).await.unwrap();
        assert_eq!(stored_senders(&hub).await, 2);
        assert_eq!(hub.subscriptions.read().await.len(), 1);
    }
}
