//! Shared fixtures: a scripted resolver and helpers for draining errors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use event_relay::{
    Broker, BrokerConfig, BrokerError, DispatchError, Event, InMemoryConnection, Resolver,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const SUBJECT: &str = "posts";
pub const DEAD_SUBJECT: &str = "dead.posts";
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Resolver that records every payload and either accepts or rejects all of them.
pub struct RecordingResolver {
    calls: AtomicUsize,
    payloads: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl RecordingResolver {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::new(false))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::new(true))
    }

    fn new(fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            fail,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().clone()
    }
}

#[async_trait]
impl Resolver for RecordingResolver {
    async fn resolve(
        &self,
        _cancellation: &CancellationToken,
        event: &dyn Event,
    ) -> Result<(), DispatchError> {
        self.payloads.lock().push(event.data().to_vec());
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DispatchError::EventNotRegistered("scripted".into()));
        }
        Ok(())
    }
}

pub fn config() -> BrokerConfig {
    BrokerConfig::new(SUBJECT).with_poll_interval(POLL_INTERVAL)
}

pub async fn broker<R: Resolver + 'static>(
    resolver: Arc<R>,
    connection: &InMemoryConnection,
) -> Broker {
    Broker::connect_with(resolver, Arc::new(connection.clone()), config())
        .await
        .unwrap()
}

/// Drain an error channel on a background task until it closes.
pub fn collect(mut errors: mpsc::Receiver<BrokerError>) -> JoinHandle<Vec<BrokerError>> {
    tokio::spawn(async move {
        let mut collected = Vec::new();
        while let Some(err) = errors.recv().await {
            collected.push(err);
        }
        collected
    })
}

/// Wait for a collector to finish.
pub async fn finished(collector: JoinHandle<Vec<BrokerError>>) -> Vec<BrokerError> {
    tokio::time::timeout(Duration::from_secs(5), collector)
        .await
        .expect("error channel never closed")
        .unwrap()
}

/// Poll `condition` until it holds.
pub async fn wait_for(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
