//! NATS transport (requires the "nats" feature).

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{subject, Connection, MessageStream, TransportError};
use crate::config::BrokerConfig;
use crate::message::Message;

/// [`Connection`] backed by an `async-nats` client.
///
/// ```ignore
/// let config = BrokerConfig::new("posts").with_host("nats.internal");
/// let conn = NatsConnection::connect(&config).await?;
/// conn.publish("posts", payload).await?;
/// ```
pub struct NatsConnection {
    client: RwLock<Option<async_nats::Client>>,
    url: String,
}

impl NatsConnection {
    /// Connect to the server described by `config`.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, TransportError> {
        let url = config.url();
        let redacted = config.redacted_url();

        let mut options = if config.user.is_empty() {
            async_nats::ConnectOptions::new()
        } else {
            async_nats::ConnectOptions::with_user_and_password(
                config.user.clone(),
                config.pass.clone(),
            )
        };
        if let Some(name) = &config.connection_name {
            options = options.name(name.clone());
        }

        let client = options
            .connect(url.as_str())
            .await
            .map_err(|e| TransportError::Connect {
                url: redacted.clone(),
                reason: e.to_string(),
            })?;

        info!(url = %redacted, "connected to NATS");
        Ok(Self {
            client: RwLock::new(Some(client)),
            url: redacted,
        })
    }

    /// Server URL with credentials masked.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> Result<async_nats::Client, TransportError> {
        self.client.read().clone().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Connection for NatsConnection {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        subject::validate_literal(subject)?;
        self.client()?
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| TransportError::Publish {
                subject: subject.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream, TransportError> {
        subject::validate_pattern(subject)?;
        let subscriber = self
            .client()?
            .subscribe(subject.to_string())
            .await
            .map_err(|e| TransportError::Subscribe {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;

        debug!(subject, "NATS subscription created");
        Ok(subscriber
            .map(|m| Message::new(m.subject.to_string(), m.payload.to_vec()))
            .boxed())
    }

    async fn flush(&self) -> Result<(), TransportError> {
        self.client()?
            .flush()
            .await
            .map_err(|e| TransportError::Flush(e.to_string()))
    }

    async fn close(&self) {
        // The socket goes away once the last client handle (including the
        // ones held by live subscriptions) is dropped.
        if self.client.write().take().is_some() {
            info!(url = %self.url, "NATS connection closed");
        }
    }
}
