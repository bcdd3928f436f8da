//! Shared inbound-response handler.
//!
//! One dispatcher is installed per client, on the reply-to subscription,
//! for the client's whole lifetime. Every inbound envelope is matched against
//! the pending registry by correlation id. Anything that cannot be matched is
//! dropped here and never reaches a caller.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::pending::PendingCallRegistry;
use crate::{log_debug, log_warn, Envelope, RpcError, SubscriptionHandle};

pub(crate) const SUBSCRIPTION_CLOSED: &str = "response subscription closed";

/// What happened to one inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Matched a pending call and completed it.
    Resolved,
    /// Well-formed, but no call is waiting on its id (late, duplicate or foreign).
    Unmatched,
    /// Correlation id metadata absent or malformed.
    MissingCorrelation,
    /// Payload did not deserialize into the response type.
    MalformedPayload,
}

/// Demultiplexes inbound responses to waiting calls.
pub struct ResponseDispatcher<T> {
    // ---
    pending: Arc<PendingCallRegistry<T>>,
}

impl<T> ResponseDispatcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    // ---
    /// Create a dispatcher resolving calls in `pending`.
    pub fn new(pending: Arc<PendingCallRegistry<T>>) -> Self {
        Self { pending }
    }

    /// Handle a single inbound envelope.
    ///
    /// Never blocks and never fails: every envelope yields an outcome.
    pub fn dispatch(&self, env: &Envelope) -> DispatchOutcome {
        // ---
        let Some(correlation_id) = env.correlation_id() else {
            log_debug!("dropping response on {} without a valid correlation id", env.address);
            return DispatchOutcome::MissingCorrelation;
        };

        let response: T = match serde_json::from_slice(&env.payload) {
            Ok(response) => response,
            Err(_err) => {
                log_warn!("dropping malformed response (correlation_id: {correlation_id}): {_err}");
                return DispatchOutcome::MalformedPayload;
            }
        };

        if self.pending.resolve(&correlation_id, response) {
            DispatchOutcome::Resolved
        } else {
            log_debug!("no pending call for correlation_id: {correlation_id}");
            DispatchOutcome::Unmatched
        }
    }

    /// Spawn the receive loop over `handle`.
    ///
    /// The loop ends when `shutdown` fires or the subscription closes. If the
    /// transport closed the subscription, `closed` is cancelled first and then
    /// calls still pending are failed with [`RpcError::Transport`], so none
    /// waits on a dead inbox.
    pub fn spawn(
        self,
        mut handle: SubscriptionHandle,
        shutdown: CancellationToken,
        closed: CancellationToken,
    ) -> JoinHandle<()> {
        // ---
        tokio::spawn(async move {
            // ---
            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        log_debug!("response dispatcher stopped by shutdown");
                        break;
                    }
                    received = handle.inbox.recv() => match received {
                        Some(env) => {
                            self.dispatch(&env);
                        }
                        None => {
                            closed.cancel();
                            let _failed = self
                                .pending
                                .fail_all(|| RpcError::transport(SUBSCRIPTION_CLOSED));
                            log_debug!(
                                "transport closed or subscription dropped, failed {_failed} pending call(s)"
                            );
                            break;
                        }
                    },
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{Address, CorrelationId};
    use bytes::Bytes;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reading {
        value: i32,
    }

    fn envelope(id: Option<Bytes>, payload: &'static [u8]) -> Envelope {
        Envelope {
            address: Address::from("replies"),
            payload: Bytes::from_static(payload),
            correlation_id: id,
            reply_to: None,
        }
    }

    #[test]
    fn test_resolves_matching_call() {
        // ---
        let pending = Arc::new(PendingCallRegistry::<Reading>::new());
        let dispatcher = ResponseDispatcher::new(pending.clone());

        let id = CorrelationId::generate();
        let rx = pending.register(id).unwrap();

        let outcome = dispatcher.dispatch(&envelope(Some(id.to_bytes()), br#"{"value":3}"#));
        assert_eq!(outcome, DispatchOutcome::Resolved);
        assert_eq!(rx.blocking_recv().unwrap().unwrap(), Reading { value: 3 });
    }

    #[test]
    fn test_missing_or_malformed_id_is_dropped() {
        // ---
        let pending = Arc::new(PendingCallRegistry::<Reading>::new());
        let dispatcher = ResponseDispatcher::new(pending.clone());
        let _rx = pending.register(CorrelationId::generate()).unwrap();

        let outcome = dispatcher.dispatch(&envelope(None, br#"{"value":1}"#));
        assert_eq!(outcome, DispatchOutcome::MissingCorrelation);

        let short = Some(Bytes::from_static(b"abc"));
        let outcome = dispatcher.dispatch(&envelope(short, br#"{"value":1}"#));
        assert_eq!(outcome, DispatchOutcome::MissingCorrelation);

        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_malformed_payload_leaves_call_pending() {
        // ---
        let pending = Arc::new(PendingCallRegistry::<Reading>::new());
        let dispatcher = ResponseDispatcher::new(pending.clone());

        let id = CorrelationId::generate();
        let mut rx = pending.register(id).unwrap();

        let outcome = dispatcher.dispatch(&envelope(Some(id.to_bytes()), b"not json"));
        assert_eq!(outcome, DispatchOutcome::MalformedPayload);
        assert!(pending.contains(&id));
        assert!(rx.try_recv().is_err());

        // A later well-formed response still resolves the call.
        let outcome = dispatcher.dispatch(&envelope(Some(id.to_bytes()), br#"{"value":9}"#));
        assert_eq!(outcome, DispatchOutcome::Resolved);
        assert_eq!(rx.blocking_recv().unwrap().unwrap(), Reading { value: 9 });
    }

    #[test]
    fn test_unknown_and_duplicate_ids_are_unmatched() {
        // ---
        let pending = Arc::new(PendingCallRegistry::<Reading>::new());
        let dispatcher = ResponseDispatcher::new(pending.clone());

        let stranger = CorrelationId::generate();
        let outcome = dispatcher.dispatch(&envelope(Some(stranger.to_bytes()), br#"{"value":1}"#));
        assert_eq!(outcome, DispatchOutcome::Unmatched);

        let id = CorrelationId::generate();
        let rx = pending.register(id).unwrap();

        let first = dispatcher.dispatch(&envelope(Some(id.to_bytes()), br#"{"value":1}"#));
        let second = dispatcher.dispatch(&envelope(Some(id.to_bytes()), br#"{"value":2}"#));
        assert_eq!(first, DispatchOutcome::Resolved);
        assert_eq!(second, DispatchOutcome::Unmatched);
        assert_eq!(rx.blocking_recv().unwrap().unwrap(), Reading { value: 1 });
    }

    #[tokio::test]
    async fn test_closed_inbox_marks_subscription_gone() {
        // ---
        let pending = Arc::new(PendingCallRegistry::<Reading>::new());
        let rx = pending.register(CorrelationId::generate()).unwrap();

        let (tx, inbox) = tokio::sync::mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let closed = CancellationToken::new();

        let task = ResponseDispatcher::new(pending.clone()).spawn(
            SubscriptionHandle { inbox },
            shutdown,
            closed.clone(),
        );
        drop(tx);
        task.await.unwrap();

        assert!(closed.is_cancelled());
        assert!(pending.is_empty());
        assert!(matches!(rx.await.unwrap(), Err(RpcError::Transport(_))));
    }
}
