use std::fmt;

use bytes::Bytes;
use uuid::Uuid;

/// Width of a correlation id on the wire, in bytes.
pub const CORRELATION_ID_LEN: usize = 16;

/// Unique correlation identifier used to match RPC requests and responses.
///
/// Correlation IDs are carried in envelope metadata as a fixed-length byte
/// sequence. They are opaque to the transport layer, never persisted, and
/// compared byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId([u8; CORRELATION_ID_LEN]);

impl CorrelationId {
    // ---

    /// Generate a new random correlation ID (UUID v4).
    pub fn generate() -> Self {
        // ---
        Self(*Uuid::new_v4().as_bytes())
    }

    /// Parse a correlation ID from envelope metadata.
    ///
    /// Returns `None` unless `bytes` is exactly [`CORRELATION_ID_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        // ---
        let raw: [u8; CORRELATION_ID_LEN] = bytes.try_into().ok()?;
        Some(Self(raw))
    }

    /// Borrow the raw id bytes.
    pub fn as_bytes(&self) -> &[u8; CORRELATION_ID_LEN] {
        &self.0
    }

    /// Copy the id into a `Bytes` buffer for an outbound envelope.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0)
    }
}

impl From<[u8; CORRELATION_ID_LEN]> for CorrelationId {
    fn from(raw: [u8; CORRELATION_ID_LEN]) -> Self {
        Self(raw)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(*uuid.as_bytes())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated UUID form keeps log lines readable.
        fmt::Display::fmt(&Uuid::from_bytes(self.0), f)
    }
}

/// Source of correlation ids for outgoing calls.
///
/// Implementations must be callable concurrently from any number of
/// in-flight calls and must not hand out an id that is still outstanding.
pub trait CorrelationIdGenerator: Send + Sync {
    /// Produce the next id.
    fn next(&self) -> CorrelationId;

    /// Lazy, unbounded sequence of ids drawn from this generator.
    fn iter(&self) -> Box<dyn Iterator<Item = CorrelationId> + '_> {
        Box::new(std::iter::repeat_with(move || self.next()))
    }
}

/// Default generator: a fresh random UUID v4 per id.
///
/// Stateless, so concurrent callers need no coordination.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl CorrelationIdGenerator for RandomIdGenerator {
    fn next(&self) -> CorrelationId {
        CorrelationId::generate()
    }
}
