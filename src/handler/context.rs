//! Context passed to command handlers.

use tokio_util::sync::CancellationToken;

/// The context passed to every command handler.
///
/// Carries the name of the event being handled and the cancellation token of
/// the consumer that received it. Handlers that run long operations can
/// check it between steps; the consumer itself never interrupts a handler.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    event_name: &'a str,
    cancellation: &'a CancellationToken,
}

impl<'a> Context<'a> {
    /// Create a new context.
    pub fn new(event_name: &'a str, cancellation: &'a CancellationToken) -> Self {
        Self {
            event_name,
            cancellation,
        }
    }

    /// Get the event name.
    pub fn event_name(&self) -> &'a str {
        self.event_name
    }

    /// Whether the owning consumer has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Get the cancellation token (e.g. to race it against an await).
    pub fn cancellation(&self) -> &'a CancellationToken {
        self.cancellation
    }
}
