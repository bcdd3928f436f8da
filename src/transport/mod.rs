//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Transport` trait, exposed only through constructor functions.
//! Broker-backed transports live with whoever owns the connection; the
//! in-memory transport here is the reference implementation.
//!
//! Domain code must not depend on transport-specific types.

mod memory;

pub use memory::{create_memory_transport, MemoryHub};
