//! Broker: subscribes to a subject and its dead-letter twin and feeds both
//! into a [`Resolver`].
//!
//! ## Error channel
//!
//! `process` and `process_dead` each spawn one consumer and return the
//! receiving end of its error channel. The caller must keep draining it: the
//! consumer waits for the receiver before reporting the next error. The
//! channel closes when the consumer stops, after a
//! [`BrokerError::ContextCanceled`] or a [`BrokerError::Flush`].
//!
//! ```
//! use std::sync::Arc;
//! use event_relay::{Broker, BrokerConfig, BrokerError, Connection, EventBus, InMemoryConnection};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new().command("posts.v1.create", |_, _| Ok(()));
//! let connection = Arc::new(InMemoryConnection::new());
//! let mut broker = Broker::connect_with(Arc::new(bus), connection.clone(), BrokerConfig::new("posts"))
//!     .await
//!     .unwrap();
//!
//! let cancellation = CancellationToken::new();
//! let mut errors = broker.process(cancellation.clone());
//!
//! connection
//!     .publish("posts", br#"{"event_name":"posts.v1.create"}"#.to_vec())
//!     .await
//!     .unwrap();
//!
//! cancellation.cancel();
//! assert!(matches!(errors.recv().await, Some(BrokerError::ContextCanceled)));
//! # }
//! ```

mod consumer;
mod error;

pub use error::BrokerError;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::connection::{Connection, MessageStream};
use crate::event_bus::Resolver;
use consumer::{Consumer, DeadLetterPolicy};

/// A connected broker with a primary and a dead-letter subscription.
pub struct Broker {
    resolver: Arc<dyn Resolver>,
    connection: Arc<dyn Connection>,
    config: BrokerConfig,
    primary: Option<MessageStream>,
    dead_letter: Option<MessageStream>,
}

impl Broker {
    /// Connect to the NATS server described by `config` and subscribe to the
    /// primary and dead-letter subjects.
    #[cfg(feature = "nats")]
    pub async fn connect<R>(resolver: Arc<R>, config: BrokerConfig) -> Result<Self, BrokerError>
    where
        R: Resolver + 'static,
    {
        config.validate()?;
        let connection = crate::connection::NatsConnection::connect(&config)
            .await
            .map_err(BrokerError::Connection)?;
        Self::connect_with(resolver, Arc::new(connection), config).await
    }

    /// Subscribe over an existing connection.
    ///
    /// Both subscriptions exist when this returns, so messages published
    /// afterwards are buffered until a consumer starts.
    pub async fn connect_with<R, C>(
        resolver: Arc<R>,
        connection: Arc<C>,
        config: BrokerConfig,
    ) -> Result<Self, BrokerError>
    where
        R: Resolver + 'static,
        C: Connection + 'static,
    {
        config.validate()?;
        let primary = connection
            .subscribe(&config.subscription)
            .await
            .map_err(BrokerError::Subscription)?;
        let dead_letter = connection
            .subscribe(&config.dead_letter_subject())
            .await
            .map_err(BrokerError::Subscription)?;

        info!(
            subscription = %config.subscription,
            dead_letter = %config.dead_letter_subject(),
            "broker subscribed"
        );
        Ok(Self {
            resolver,
            connection,
            config,
            primary: Some(primary),
            dead_letter: Some(dead_letter),
        })
    }

    /// Consume the primary subscription until `cancellation` fires.
    ///
    /// Messages the resolver rejects are reported as
    /// [`BrokerError::EventBus`] and republished unchanged to the
    /// dead-letter subject.
    pub fn process(&mut self, cancellation: CancellationToken) -> mpsc::Receiver<BrokerError> {
        let policy = DeadLetterPolicy::Republish {
            subject: self.config.dead_letter_subject(),
        };
        let subject = self.config.subscription.clone();
        let stream = self.primary.take();
        self.start(subject, stream, policy, cancellation)
    }

    /// Consume the dead-letter subscription until `cancellation` fires.
    ///
    /// Failures here are reported and never republished.
    pub fn process_dead(&mut self, cancellation: CancellationToken) -> mpsc::Receiver<BrokerError> {
        let subject = self.config.dead_letter_subject();
        let stream = self.dead_letter.take();
        self.start(subject, stream, DeadLetterPolicy::Terminal, cancellation)
    }

    fn start(
        &self,
        subject: String,
        stream: Option<MessageStream>,
        policy: DeadLetterPolicy,
        cancellation: CancellationToken,
    ) -> mpsc::Receiver<BrokerError> {
        let Some(stream) = stream else {
            warn!(subject = %subject, "subscription already consumed");
            let (errors, receiver) = mpsc::channel(1);
            let _ = errors.try_send(BrokerError::AlreadyConsumed(subject));
            return receiver;
        };

        Consumer {
            resolver: self.resolver.clone(),
            connection: self.connection.clone(),
            subject,
            poll_interval: self.config.poll_interval,
            policy,
        }
        .spawn(stream, cancellation)
    }

    /// Get the broker configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Get the underlying connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Close the connection. Running consumers stop on their next flush,
    /// reporting [`BrokerError::Flush`]; their subscription streams may stay
    /// open until then.
    pub async fn close(&self) {
        self.connection.close().await;
        info!(subscription = %self.config.subscription, "broker connection closed");
    }
}
