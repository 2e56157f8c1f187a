//! Errors reported by the broker and its consumers.

use crate::config::ConfigError;
use crate::connection::TransportError;
use crate::event_bus::DispatchError;

/// Everything a [`Broker`](super::Broker) can report.
///
/// Startup failures come back from the constructors. Everything else arrives
/// on the error channel returned by `process`/`process_dead`.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The configuration was rejected before connecting.
    #[error("invalid broker configuration: {0}")]
    Config(#[from] ConfigError),

    /// The connection to the broker could not be established.
    #[error("broker connection failed: {0}")]
    Connection(#[source] TransportError),

    /// A subscription could not be created at startup.
    #[error("subscription failed: {0}")]
    Subscription(#[source] TransportError),

    /// The consumer was cancelled. Always the last error of a cancelled loop.
    #[error("context canceled")]
    ContextCanceled,

    /// A periodic flush round-trip failed; the consumer stopped.
    #[error("flush failed: {0}")]
    Flush(#[source] TransportError),

    /// A message could not be dispatched.
    #[error("event bus error: {0}")]
    EventBus(#[source] DispatchError),

    /// A failed message could not be republished to the dead-letter subject.
    #[error("dead-letter publish to `{subject}` failed: {source}")]
    DeadLetterPublish {
        subject: String,
        #[source]
        source: TransportError,
    },

    /// The subscription's stream was already handed to an earlier call.
    #[error("subscription `{0}` is already being consumed")]
    AlreadyConsumed(String),
}

impl BrokerError {
    /// Whether the consumer loop stops after reporting this error.
    pub fn is_loop_fatal(&self) -> bool {
        matches!(self, BrokerError::ContextCanceled | BrokerError::Flush(_))
    }

    /// Whether this error can only come from construction.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            BrokerError::Config(_) | BrokerError::Connection(_) | BrokerError::Subscription(_)
        )
    }

    /// The dispatch failure, for [`BrokerError::EventBus`].
    pub fn dispatch_error(&self) -> Option<&DispatchError> {
        match self {
            BrokerError::EventBus(err) => Some(err),
            _ => None,
        }
    }
}
