mod broker;
mod config;
mod connection;
mod event_bus;
mod handler;
mod message;

pub use broker::{Broker, BrokerError};
pub use config::{BrokerConfig, ConfigError, DEAD_LETTER_PREFIX, DEFAULT_POLL_INTERVAL, DEFAULT_PORT};
pub use connection::subject;
pub use connection::{Connection, InMemoryConnection, MessageStream, TransportError};
#[cfg(feature = "nats")]
pub use connection::NatsConnection;
pub use event_bus::{decode_event, DispatchError, DispatchErrorKind, EventBus, Resolver};
pub use handler::{decode, CommandHandler, Context, FnHandler, HandlerError, Params, ParamsExt};
pub use message::{encode_event, EncodeError, Event, Message, EVENT_NAME_KEY};
