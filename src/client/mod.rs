// src/client/mod.rs
//! RPC client implementation.
//!
//! This module contains the core [`RpcClient`] type which publishes requests
//! over a transport and waits for their responses on a shared reply-to topic.
//!
//! # Architecture
//!
//! The client subscribes to its configured response topic once, at
//! construction, and runs a single background [`ResponseDispatcher`] that
//! matches incoming responses with pending calls using correlation IDs.
//!
//! Each call draws a unique correlation ID and registers a oneshot channel in
//! the [`PendingCallRegistry`]. When a response arrives, the dispatcher looks
//! up the channel and sends the decoded response to the waiting call.
//!
//! # Concurrency
//!
//! Multiple calls can be in flight simultaneously. The registry is protected
//! by a mutex, but lock contention is minimal since operations are just
//! HashMap insert/remove and the lock is never held across an await.

mod dispatcher;
mod pending;

pub use dispatcher::{DispatchOutcome, ResponseDispatcher};

use dispatcher::SUBSCRIPTION_CLOSED;
pub use pending::{Completion, PendingCallRegistry};

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    // ---
    log_debug,
    log_info,
    Address,
    CorrelationId,
    CorrelationIdGenerator,
    Envelope,
    RandomIdGenerator,
    Result,
    RpcConfig,
    RpcError,
    TransportPtr,
};

/// Running RPC client instance.
///
/// `TResp` is the response envelope type every reply on the response topic
/// decodes into. Cheap to clone (internally `Arc`-backed); the dispatcher
/// stops when the last clone is dropped or [`shutdown`](Self::shutdown) is
/// called.
pub struct RpcClient<TResp> {
    inner: Arc<Inner<TResp>>,
}

impl<TResp> Clone for RpcClient<TResp> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<TResp> {
    // ---
    transport: TransportPtr,
    config: RpcConfig,
    response_address: Address,
    ids: Arc<dyn CorrelationIdGenerator>,
    pending: Arc<PendingCallRegistry<TResp>>,
    shutdown: CancellationToken,

    /// Cancelled by the dispatcher once the response subscription is gone.
    subscription_closed: CancellationToken,

    /// Dispatcher task handle, kept so the task is tied to the client's lifetime.
    _rx_task: JoinHandle<()>,
}

impl<TResp> Drop for Inner<TResp> {
    fn drop(&mut self) {
        // ---
        self.shutdown.cancel();
        self.pending.fail_all(|| RpcError::Shutdown);
    }
}

/// Removes a call's registry entry on every exit path, including the caller
/// dropping the call future mid-wait. After a resolve the removal is a no-op.
struct PendingGuard<'a, T> {
    pending: &'a PendingCallRegistry<T>,
    id: CorrelationId,
}

impl<T> PendingGuard<'_, T> {
    /// Remove the entry now. Returns false if a resolution got there first.
    fn remove(&self) -> bool {
        self.pending.remove(&self.id)
    }
}

impl<T> Drop for PendingGuard<'_, T> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

impl<TResp> RpcClient<TResp>
where
    TResp: DeserializeOwned + Send + 'static,
{
    // ---
    /// Create a client with an explicitly provided transport.
    ///
    /// Subscribes to `config.response_topic` and installs the response
    /// dispatcher on it. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] if the transport fails to establish the
    /// response subscription.
    pub async fn with_transport(transport: TransportPtr, config: RpcConfig) -> Result<Self> {
        // ---
        Self::with_id_generator(transport, config, Arc::new(RandomIdGenerator)).await
    }

    /// Create a client drawing correlation ids from `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] if the response subscription fails.
    pub async fn with_id_generator(
        transport: TransportPtr,
        config: RpcConfig,
        ids: Arc<dyn CorrelationIdGenerator>,
    ) -> Result<Self> {
        // ---
        let response_address = Address::from(config.response_topic.as_str());

        let handle = transport
            .subscribe(response_address.clone().into(), config.inbox_capacity)
            .await?;

        let pending = Arc::new(PendingCallRegistry::new());
        let shutdown = CancellationToken::new();
        let subscription_closed = CancellationToken::new();

        let rx_task = ResponseDispatcher::new(pending.clone()).spawn(
            handle,
            shutdown.clone(),
            subscription_closed.clone(),
        );

        log_debug!("rpc client listening on {response_address}");

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                config,
                response_address,
                ids,
                pending,
                shutdown,
                subscription_closed,
                _rx_task: rx_task,
            }),
        })
    }

    /// Send a request and wait for its response.
    ///
    /// Publishes `request` to `request_topic`, tagged with a fresh correlation
    /// id and this client's response topic, then waits until the dispatcher
    /// resolves the call, `deadline` passes, or `cancel` fires. The request is
    /// published even when `deadline` has already passed; only the wait is
    /// bounded.
    ///
    /// # Errors
    ///
    /// - `RpcError::DuplicateCorrelation` - the id generator repeated an outstanding id
    /// - `RpcError::Serialization` - request serialization fails
    /// - `RpcError::Transport` - publish fails, or the response subscription has
    ///   closed (before or during the call)
    /// - `RpcError::TimedOut` - `deadline` passes first
    /// - `RpcError::Cancelled` - `cancel` fires first
    /// - `RpcError::Shutdown` - the client is shut down
    pub async fn call<TReq>(
        &self,
        request: &TReq,
        request_topic: &str,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<TResp>
    where
        TReq: Serialize + ?Sized,
    {
        // ---
        let inner = &self.inner;

        if inner.shutdown.is_cancelled() {
            return Err(RpcError::Shutdown);
        }
        if inner.subscription_closed.is_cancelled() {
            return Err(RpcError::transport(SUBSCRIPTION_CLOSED));
        }

        let correlation_id = inner.ids.next();
        let mut rx = inner.pending.register(correlation_id)?;
        let guard = PendingGuard {
            pending: &inner.pending,
            id: correlation_id,
        };

        // A concurrent shutdown or subscription loss may have drained the
        // registry just before this entry went in.
        if inner.shutdown.is_cancelled() {
            return Err(RpcError::Shutdown);
        }
        if inner.subscription_closed.is_cancelled() {
            return Err(RpcError::transport(SUBSCRIPTION_CLOSED));
        }

        let payload = Bytes::from(serde_json::to_vec(request)?);

        let env = Envelope::request(
            Address::from(request_topic),
            payload,
            correlation_id,
            inner.response_address.clone(),
        );

        if let Err(err) = inner.transport.publish(env).await {
            guard.remove();
            return Err(err);
        }

        let outcome = tokio::select! {
            biased;

            completed = &mut rx => return completed.unwrap_or(Err(RpcError::Shutdown)),
            _ = inner.shutdown.cancelled() => RpcError::Shutdown,
            _ = inner.subscription_closed.cancelled() => {
                RpcError::transport(SUBSCRIPTION_CLOSED)
            }
            _ = cancel.cancelled() => RpcError::Cancelled,
            _ = time::sleep_until(deadline) => RpcError::TimedOut,
        };

        if guard.remove() {
            log_debug!("call {correlation_id} on {request_topic} abandoned: {outcome}");
            return Err(outcome);
        }

        // The dispatcher reached the entry before our removal did, so the
        // response is already in the slot.
        take_resolved(&mut rx).unwrap_or(Err(outcome))
    }

    /// Send a request bounded by the configured `request_timeout`.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn request<TReq>(&self, request_topic: &str, request: &TReq) -> Result<TResp>
    where
        TReq: Serialize + ?Sized,
    {
        // ---
        self.request_with_timeout(request_topic, request, self.inner.config.request_timeout)
            .await
    }

    /// Send a request bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use pubsub_rpc::{create_memory_transport, MemoryHub, RpcClient, RpcConfig};
    /// # use serde::{Deserialize, Serialize};
    /// # use std::time::Duration;
    /// #[derive(Serialize)]
    /// struct Inspect { namespace: String }
    ///
    /// #[derive(Deserialize)]
    /// struct Inspection { entries: Vec<String> }
    ///
    /// # async fn example() -> pubsub_rpc::Result<()> {
    /// let transport = create_memory_transport("cli", MemoryHub::new());
    /// let client: RpcClient<Inspection> =
    ///     RpcClient::with_transport(transport, RpcConfig::new("responses/cli")).await?;
    ///
    /// let inspection = client
    ///     .request_with_timeout(
    ///         "requests/registry",
    ///         &Inspect { namespace: "system.registry".into() },
    ///         Duration::from_secs(5),
    ///     )
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn request_with_timeout<TReq>(
        &self,
        request_topic: &str,
        request: &TReq,
        timeout: Duration,
    ) -> Result<TResp>
    where
        TReq: Serialize + ?Sized,
    {
        // ---
        let never = CancellationToken::new();
        self.call(request, request_topic, Instant::now() + timeout, &never)
            .await
    }
}

impl<TResp> RpcClient<TResp> {
    // ---
    /// Stop the dispatcher and fail every outstanding call with
    /// [`RpcError::Shutdown`]. Later calls fail with `Shutdown` before
    /// publishing. The transport itself is left open. Idempotent.
    pub fn shutdown(&self) {
        // ---
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();

        let _failed = self.inner.pending.fail_all(|| RpcError::Shutdown);
        log_info!(
            "rpc client on {} shut down, failed {_failed} pending call(s)",
            self.inner.response_address
        );
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Whether the transport has closed the response subscription. Once true,
    /// every call fails with [`RpcError::Transport`] without publishing.
    pub fn is_disconnected(&self) -> bool {
        self.inner.subscription_closed.is_cancelled()
    }

    /// Number of calls currently waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    /// The reply-to topic this client listens on.
    pub fn response_topic(&self) -> &str {
        &self.inner.config.response_topic
    }
}

fn take_resolved<T>(rx: &mut oneshot::Receiver<Result<T>>) -> Option<Result<T>> {
    rx.try_recv().ok()
}
