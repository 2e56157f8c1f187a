//! In-memory connection for testing and single-process scenarios.
//!
//! This module provides a thread-safe in-memory broker that implements
//! the `Connection` trait, useful for:
//! - Unit and integration testing without a running NATS server
//! - Single-process applications
//! - Exercising failure paths (failed publishes, failed flushes)

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use super::{subject, Connection, MessageStream, TransportError};
use crate::message::Message;

/// In-memory broker connection.
///
/// Features:
/// - Thread-safe (clones share the same broker state)
/// - Fan-out: every live subscription whose pattern matches receives a copy
/// - Every successful publish is kept in an append-only log for inspection
/// - Failure injection for publishes (per subject) and flushes
///
/// ## Example
///
/// ```
/// use event_relay::{Connection, InMemoryConnection};
/// use futures::StreamExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let conn = InMemoryConnection::new();
/// let mut posts = conn.subscribe("posts.>").await.unwrap();
///
/// conn.publish("posts.create", br#"{"event_name":"x"}"#.to_vec()).await.unwrap();
///
/// let message = posts.next().await.unwrap();
/// assert_eq!(message.subject, "posts.create");
/// assert_eq!(conn.published_to("posts.create").len(), 1);
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConnection {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Everything published, in order
    log: RwLock<Vec<Message>>,
    /// Live subscriptions
    subscriptions: Mutex<Vec<Subscription>>,
    /// Subjects whose publishes are rejected
    failing_subjects: Mutex<HashSet<String>>,
    failing_flush: AtomicBool,
    closed: AtomicBool,
    flushes: AtomicUsize,
}

struct Subscription {
    pattern: String,
    sender: mpsc::UnboundedSender<Message>,
}

impl InMemoryConnection {
    /// Create a new in-memory connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all messages published so far.
    pub fn published(&self) -> Vec<Message> {
        self.inner.log.read().clone()
    }

    /// Get the payloads published to exactly `subject`, in order.
    pub fn published_to(&self, subject: &str) -> Vec<Vec<u8>> {
        self.inner
            .log
            .read()
            .iter()
            .filter(|m| m.subject == subject)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        let mut subscriptions = self.inner.subscriptions.lock();
        subscriptions.retain(|s| !s.sender.is_closed());
        subscriptions.len()
    }

    /// Number of successful flush round-trips.
    pub fn flush_count(&self) -> usize {
        self.inner.flushes.load(Ordering::SeqCst)
    }

    /// Whether [`Connection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Reject every subsequent publish to `subject`.
    pub fn fail_publish_to(&self, subject: impl Into<String>) {
        self.inner.failing_subjects.lock().insert(subject.into());
    }

    /// Accept publishes to `subject` again.
    pub fn restore_publish_to(&self, subject: &str) {
        self.inner.failing_subjects.lock().remove(subject);
    }

    /// Make flush round-trips fail (or succeed again).
    pub fn fail_flush(&self, failing: bool) {
        self.inner.failing_flush.store(failing, Ordering::SeqCst);
    }

    /// Clear the publish log (useful for test cleanup).
    pub fn clear(&self) {
        self.inner.log.write().clear();
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        subject::validate_literal(subject)?;
        self.ensure_open()?;

        if self.inner.failing_subjects.lock().contains(subject) {
            return Err(TransportError::Publish {
                subject: subject.to_string(),
                reason: "publish rejected".to_string(),
            });
        }

        let message = Message::new(subject, payload);
        self.inner.log.write().push(message.clone());

        let mut subscriptions = self.inner.subscriptions.lock();
        // Dropped streams show up as closed senders
        subscriptions.retain(|s| !s.sender.is_closed());
        let mut delivered = 0;
        for subscription in subscriptions.iter() {
            if subject::matches(&subscription.pattern, subject)
                && subscription.sender.send(message.clone()).is_ok()
            {
                delivered += 1;
            }
        }
        debug!(subject, delivered, "in-memory publish");
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream, TransportError> {
        subject::validate_pattern(subject)?;
        self.ensure_open()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.subscriptions.lock().push(Subscription {
            pattern: subject.to_string(),
            sender,
        });
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }

    async fn flush(&self) -> Result<(), TransportError> {
        self.ensure_open()?;
        if self.inner.failing_flush.load(Ordering::SeqCst) {
            return Err(TransportError::Flush("flush rejected".to_string()));
        }
        self.inner.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the senders ends every open stream
        self.inner.subscriptions.lock().clear();
        debug!("in-memory connection closed");
    }
}
