//! Request/response RPC over publish/subscribe transports.
//!
//! A caller publishes a request to a topic, tagged with a unique correlation
//! id and a reply-to topic. The response arrives later on the shared reply-to
//! topic and is matched back to the waiting caller. This crate handles
//! correlation id generation, pending-call bookkeeping, the shared response
//! dispatcher, and timeout/cancellation of each call.
//!
//! It also provides [`classify`], which turns free-form text arguments into
//! typed scalar [`Value`]s before they are embedded in requests.
//!
//! ```no_run
//! use pubsub_rpc::{create_memory_transport, MemoryHub, RpcClient, RpcConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> pubsub_rpc::Result<()> {
//! let transport = create_memory_transport("cli", MemoryHub::new());
//! let client: RpcClient<serde_json::Value> =
//!     RpcClient::with_transport(transport, RpcConfig::new("responses/cli")).await?;
//!
//! let args = pubsub_rpc::classify_all(["21", "true"])?;
//! let reply = client
//!     .request_with_timeout("requests/calc", &args, Duration::from_secs(2))
//!     .await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

// Import all sub modules once...
mod client;
mod domain;
mod transport;

mod rpc_config;

mod correlation;
mod error;
mod macros;
mod value;

#[allow(unused_imports)]
pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::{
    //
    Completion,
    DispatchOutcome,
    PendingCallRegistry,
    ResponseDispatcher,
    RpcClient,
};

pub use rpc_config::{RpcConfig, DEFAULT_INBOX_CAPACITY, DEFAULT_REQUEST_TIMEOUT};

pub use correlation::{CorrelationId, CorrelationIdGenerator, RandomIdGenerator, CORRELATION_ID_LEN};
pub use error::{Result, RpcError, TransportCause};
pub use value::{classify, classify_all, Value, ValueKind, ValueParseError};

pub use transport::{create_memory_transport, MemoryHub};

// --- public re-exports
pub use domain::{
    //
    Address,
    Envelope,
    Subscription,
    SubscriptionHandle,
    Transport,
    TransportPtr,
};

pub use tokio_util::sync::CancellationToken;
