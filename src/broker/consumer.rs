//! The consumer loop shared by the primary and dead-letter subscriptions.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::BrokerError;
use crate::connection::{Connection, MessageStream};
use crate::event_bus::Resolver;
use crate::message::Message;

/// What happens to a message the resolver rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeadLetterPolicy {
    /// Republish the original payload to `subject`.
    Republish { subject: String },
    /// Report the failure and drop the message.
    Terminal,
}

/// Counters kept by one consumer over its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConsumerStats {
    /// Messages the resolver accepted
    pub handled: usize,
    /// Messages the resolver rejected
    pub failed: usize,
    /// Rejected messages successfully republished to the dead-letter subject
    pub dead_lettered: usize,
    /// Successful flush round-trips
    pub flushes: usize,
}

pub(crate) struct Consumer {
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) subject: String,
    pub(crate) poll_interval: Duration,
    pub(crate) policy: DeadLetterPolicy,
}

impl Consumer {
    /// Run the loop on a background task, returning its error channel.
    ///
    /// The channel holds at most one pending error; the loop waits for the
    /// receiver before reporting the next one. It closes once the loop ends.
    pub(crate) fn spawn(
        self,
        messages: MessageStream,
        cancellation: CancellationToken,
    ) -> mpsc::Receiver<BrokerError> {
        let (errors, receiver) = mpsc::channel(1);
        tokio::spawn(self.run(messages, cancellation, errors));
        receiver
    }

    async fn run(
        self,
        mut messages: MessageStream,
        cancellation: CancellationToken,
        errors: mpsc::Sender<BrokerError>,
    ) -> ConsumerStats {
        let mut stats = ConsumerStats::default();
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stream_open = true;

        info!(subject = %self.subject, poll_interval = ?self.poll_interval, "consumer started");

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    report(&errors, BrokerError::ContextCanceled).await;
                    break;
                }
                _ = ticker.tick() => {
                    match self.connection.flush().await {
                        Ok(()) => {
                            stats.flushes += 1;
                            debug!(subject = %self.subject, "flushed");
                        }
                        Err(err) => {
                            error!(subject = %self.subject, error = %err, "flush failed, stopping consumer");
                            report(&errors, BrokerError::Flush(err)).await;
                            break;
                        }
                    }
                }
                message = messages.next(), if stream_open => match message {
                    Some(message) => self.handle(message, &cancellation, &errors, &mut stats).await,
                    None => {
                        // Keep flushing until cancelled
                        warn!(subject = %self.subject, "subscription stream ended");
                        stream_open = false;
                    }
                },
            }
        }

        info!(
            subject = %self.subject,
            handled = stats.handled,
            failed = stats.failed,
            dead_lettered = stats.dead_lettered,
            flushes = stats.flushes,
            "consumer stopped"
        );
        stats
    }

    async fn handle(
        &self,
        message: Message,
        cancellation: &CancellationToken,
        errors: &mpsc::Sender<BrokerError>,
        stats: &mut ConsumerStats,
    ) {
        let err = match self.resolver.resolve(cancellation, &message).await {
            Ok(()) => {
                stats.handled += 1;
                debug!(subject = %message.subject, "message handled");
                return;
            }
            Err(err) => err,
        };

        stats.failed += 1;
        warn!(subject = %message.subject, error = %err, "event dispatch failed");
        report(errors, BrokerError::EventBus(err)).await;

        let DeadLetterPolicy::Republish { subject } = &self.policy else {
            return;
        };
        match self.connection.publish(subject, message.payload.clone()).await {
            Ok(()) => {
                stats.dead_lettered += 1;
                debug!(from = %message.subject, to = %subject, "message dead-lettered");
            }
            Err(source) => {
                warn!(
                    to = %subject,
                    error = %source,
                    payload = %BASE64.encode(&message.payload),
                    "dead-letter publish failed, message dropped"
                );
                report(
                    errors,
                    BrokerError::DeadLetterPublish {
                        subject: subject.clone(),
                        source,
                    },
                )
                .await;
            }
        }
    }
}

async fn report(errors: &mpsc::Sender<BrokerError>, err: BrokerError) {
    if let Err(mpsc::error::SendError(err)) = errors.send(err).await {
        warn!(error = %err, "error receiver dropped");
    }
}
