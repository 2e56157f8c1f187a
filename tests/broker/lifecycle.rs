//! Broker construction and shutdown.

use std::sync::Arc;
use std::time::Duration;

use event_relay::{
    Broker, BrokerConfig, BrokerError, ConfigError, Connection, InMemoryConnection,
    TransportError,
};

use crate::support::{broker, config, RecordingResolver, DEAD_SUBJECT, SUBJECT};

async fn connect(config: BrokerConfig, connection: &InMemoryConnection) -> Result<Broker, BrokerError> {
    Broker::connect_with(
        RecordingResolver::accepting(),
        Arc::new(connection.clone()),
        config,
    )
    .await
}

#[tokio::test]
async fn subscribes_to_primary_and_dead_letter() {
    let connection = InMemoryConnection::new();
    let broker = broker(RecordingResolver::accepting(), &connection).await;

    assert_eq!(connection.subscription_count(), 2);
    assert_eq!(broker.config().subscription, SUBJECT);
    assert_eq!(broker.config().dead_letter_subject(), DEAD_SUBJECT);
}

#[tokio::test]
async fn invalid_subject_fails_subscription() {
    let connection = InMemoryConnection::new();
    let err = connect(BrokerConfig::new("posts..create"), &connection)
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err,
        BrokerError::Subscription(TransportError::InvalidSubject { .. })
    ));
    assert!(err.is_startup_fatal());
}

#[tokio::test]
async fn closed_connection_fails_subscription() {
    let connection = InMemoryConnection::new();
    connection.close().await;

    let err = connect(config(), &connection).await.err().unwrap();
    assert!(matches!(err, BrokerError::Subscription(TransportError::Closed)));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_subscribing() {
    let connection = InMemoryConnection::new();

    let cases = [
        (BrokerConfig::new(""), ConfigError::EmptySubscription),
        (
            config().with_poll_interval(Duration::ZERO),
            ConfigError::ZeroPollInterval,
        ),
        (
            config().with_poll_interval(Duration::from_secs(u64::MAX)),
            ConfigError::PollIntervalTooLarge(Duration::from_secs(u64::MAX)),
        ),
        (
            config().with_dead_letter(SUBJECT),
            ConfigError::DeadLetterLoop(SUBJECT.to_string()),
        ),
    ];
    for (config, expected) in cases {
        let err = connect(config, &connection).await.err().unwrap();
        assert!(
            matches!(err, BrokerError::Config(ref actual) if *actual == expected),
            "unexpected error: {err}"
        );
    }
    assert_eq!(connection.subscription_count(), 0);
}

#[tokio::test]
async fn close_is_idempotent() {
    let connection = InMemoryConnection::new();
    let broker = broker(RecordingResolver::accepting(), &connection).await;

    broker.close().await;
    broker.close().await;

    assert!(connection.is_closed());
    assert_eq!(connection.subscription_count(), 0);
    let err = broker
        .connection()
        .publish(SUBJECT, b"{}".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::Closed);
}

#[cfg(feature = "nats")]
#[tokio::test]
async fn unreachable_server_fails_connection() {
    // Nothing listens on the discard port
    let config = BrokerConfig::new(SUBJECT).with_host("127.0.0.1").with_port(9);
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        Broker::connect(RecordingResolver::accepting(), config),
    )
    .await
    .expect("connect did not give up");

    let err = result.err().unwrap();
    assert!(matches!(err, BrokerError::Connection(TransportError::Connect { .. })));
    assert!(err.is_startup_fatal());
}
