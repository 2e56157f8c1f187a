//! Event relay
//!
//! Subscribes to a NATS subject, logs every event registered with `--event`,
//! and republishes everything else to the dead-letter subject.
//!
//! Usage:
//!   event-relay --subscription posts --event posts.v1.create --event posts.v1.update
//!
//! Every option can also be given through its `EVENT_RELAY_*` environment
//! variable. Logging honours `RUST_LOG` and falls back to `--log-level`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use clap::Parser;
use event_relay::{
    Broker, BrokerConfig, BrokerError, CommandHandler, Context, EventBus, HandlerError, Params,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "event-relay")]
#[command(about = "Consume NATS events, dispatch them by name and dead-letter failures")]
struct Args {
    /// NATS user (leave empty for an unauthenticated connection)
    #[arg(long, env = "EVENT_RELAY_NATS_USER", default_value = "")]
    user: String,

    /// NATS password
    #[arg(long, env = "EVENT_RELAY_NATS_PASS", default_value = "", hide_env_values = true)]
    pass: String,

    /// NATS host
    #[arg(long, env = "EVENT_RELAY_NATS_HOST", default_value = "")]
    host: String,

    /// NATS port (0 selects the default port)
    #[arg(long, env = "EVENT_RELAY_NATS_PORT", default_value_t = 0)]
    port: u16,

    /// Subject to consume
    #[arg(long, env = "EVENT_RELAY_NATS_SUBSCRIPTION_NAME")]
    subscription: String,

    /// Dead-letter subject (defaults to `dead.<subscription>`)
    #[arg(long, env = "EVENT_RELAY_NATS_DEADLETTER_NAME")]
    dead_letter: Option<String>,

    /// Seconds between flush round-trips
    #[arg(long, env = "EVENT_RELAY_POLL_INTERVAL_SECS", default_value_t = 1)]
    poll_interval_secs: u64,

    /// Event name to accept and log (repeatable)
    #[arg(long = "event", value_name = "NAME")]
    events: Vec<String>,

    /// Also consume the dead-letter subject
    #[arg(long)]
    process_dead: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> BrokerConfig {
        let mut config = BrokerConfig::new(self.subscription.clone())
            .with_credentials(self.user.clone(), self.pass.clone())
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_connection_name("event-relay");
        if let Some(dead_letter) = &self.dead_letter {
            config = config.with_dead_letter(dead_letter.clone());
        }
        config
    }
}

/// Accepts any event and logs its parameters.
struct LogHandler;

#[async_trait]
impl CommandHandler for LogHandler {
    async fn handle(&self, ctx: &Context<'_>, params: Params) -> Result<(), HandlerError> {
        let params = serde_json::Value::Object(params);
        info!(event = ctx.event_name(), %params, "event received");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = args.config();
    info!(
        url = %config.redacted_url(),
        subscription = %config.subscription,
        dead_letter = %config.dead_letter_subject(),
        "starting event relay"
    );

    let mut bus = EventBus::new();
    let logger: Arc<dyn CommandHandler> = Arc::new(LogHandler);
    for event in &args.events {
        bus.register_shared(event.clone(), logger.clone());
    }
    if bus.is_empty() {
        warn!("no events registered, every message will be dead-lettered");
    }

    let mut broker = Broker::connect(Arc::new(bus), config)
        .await
        .context("starting broker")?;

    let cancellation = CancellationToken::new();
    let mut drains = vec![tokio::spawn(drain(
        "primary",
        broker.process(cancellation.clone()),
    ))];
    if args.process_dead {
        drains.push(tokio::spawn(drain(
            "dead-letter",
            broker.process_dead(cancellation.clone()),
        )));
    }

    let early = supervise(drains, tokio::signal::ctrl_c(), &cancellation).await;
    broker.close().await;

    if let Some(consumer) = early.context("listening for shutdown signal")? {
        anyhow::bail!("{consumer} consumer stopped before shutdown was requested");
    }
    Ok(())
}

/// Wait for `shutdown` or for any drain to finish, then cancel the rest and
/// wait for them. Returns the consumer that stopped on its own, if any.
async fn supervise<S>(
    drains: Vec<JoinHandle<&'static str>>,
    shutdown: S,
    cancellation: &CancellationToken,
) -> std::io::Result<Option<&'static str>>
where
    S: Future<Output = std::io::Result<()>>,
{
    let mut first_stop = futures::future::select_all(drains);
    let (outcome, remaining) = tokio::select! {
        signal = shutdown => {
            info!("shutting down");
            (signal.map(|()| None), None)
        }
        (stopped, _, remaining) = &mut first_stop => {
            let consumer = match stopped {
                Ok(consumer) => consumer,
                Err(err) => {
                    error!(error = %err, "consumer drain task failed");
                    "unknown"
                }
            };
            error!(consumer, "consumer stopped before shutdown was requested");
            (Ok(Some(consumer)), Some(remaining))
        }
    };

    cancellation.cancel();
    // Once complete, select_all has moved the unfinished drains out
    let remaining = remaining.unwrap_or_else(|| first_stop.into_inner());
    futures::future::join_all(remaining).await;
    outcome
}

/// Log every error from one consumer, returning its name once the channel closes.
async fn drain(consumer: &'static str, mut errors: mpsc::Receiver<BrokerError>) -> &'static str {
    while let Some(err) = errors.recv().await {
        match err {
            BrokerError::ContextCanceled => info!(consumer, "consumer cancelled"),
            err if err.is_loop_fatal() => error!(consumer, error = %err, "consumer stopped"),
            err => warn!(consumer, error = %err, "consumer error"),
        }
    }
    consumer
}
