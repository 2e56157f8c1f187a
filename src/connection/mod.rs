//! Broker connection - the transport seam under the consumers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Broker (per service)                        │
//! │  - primary + dead-letter consumers                           │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Connection trait                          │
//! │  publish(subject, payload) / subscribe(subject)              │
//! │  flush() / close()                                           │
//! └─────────────────────────────────────────────────────────────┘
//!               │                                │
//!               ▼                                ▼
//!     ┌──────────────────┐            ┌─────────────────────┐
//!     │InMemoryConnection│            │   NatsConnection    │
//!     │   (included)     │            │  (feature "nats")   │
//!     └──────────────────┘            └─────────────────────┘
//! ```
//!
//! Implementations must be safe to share between the inbound subscription
//! path and the outbound dead-letter path; the consumers add no locking of
//! their own.

mod in_memory;
#[cfg(feature = "nats")]
mod nats;
pub mod subject;

pub use in_memory::InMemoryConnection;
#[cfg(feature = "nats")]
pub use nats::NatsConnection;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::message::Message;

/// Stream of messages for one subscription.
///
/// The stream ends when the subscription (or the whole connection) goes away.
pub type MessageStream = BoxStream<'static, Message>;

/// Errors raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("invalid subject `{subject}`: {reason}")]
    InvalidSubject { subject: String, reason: String },

    #[error("publish to `{subject}` failed: {reason}")]
    Publish { subject: String, reason: String },

    #[error("subscribe to `{subject}` failed: {reason}")]
    Subscribe { subject: String, reason: String },

    #[error("flush round-trip failed: {0}")]
    Flush(String),

    #[error("connection closed")]
    Closed,
}

/// Publish/subscribe primitives over a shared broker connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Publish a raw payload to a subject.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Subscribe to a subject pattern (supports `*` and `>` wildcards).
    async fn subscribe(&self, subject: &str) -> Result<MessageStream, TransportError>;

    /// Round-trip to the broker, confirming everything published so far was
    /// processed.
    async fn flush(&self) -> Result<(), TransportError>;

    /// Close the connection. Calling this more than once is a no-op.
    async fn close(&self);
}
