//! Command handler registry and name-based event dispatch.
//!
//! `EventBus` maps event names to [`CommandHandler`]s. Routing is purely
//! name-based and schema-agnostic: supporting a new event type only takes a
//! new registration.
//!
//! ## Example
//!
//! ```
//! use event_relay::{EventBus, Resolver, ParamsExt};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new().command("posts.v1.create", |_ctx, params| {
//!     params.require_str("title")?;
//!     Ok(())
//! });
//!
//! let payload = br#"{"event_name":"posts.v1.create","title":"Hello"}"#.to_vec();
//! bus.resolve(&CancellationToken::new(), &payload).await.unwrap();
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::handler::{CommandHandler, Context, FnHandler, HandlerError, Params};
use crate::message::{Event, EVENT_NAME_KEY};

/// Why an event could not be dispatched.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unmarshaling message error: {0}")]
    UnmarshalingMessage(String),

    #[error("missing `event_name` param from message")]
    MissingNameParam,

    #[error("wrong data type for param `event_name`")]
    WrongDataTypeName,

    #[error("event not registered: {0}")]
    EventNotRegistered(String),

    #[error("command handler error for `{event}`: {source}")]
    CommandHandler {
        event: String,
        #[source]
        source: HandlerError,
    },
}

/// Identity of a [`DispatchError`], for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchErrorKind {
    UnmarshalingMessage,
    MissingNameParam,
    WrongDataTypeName,
    EventNotRegistered,
    CommandHandler,
}

impl DispatchError {
    pub fn kind(&self) -> DispatchErrorKind {
        match self {
            DispatchError::UnmarshalingMessage(_) => DispatchErrorKind::UnmarshalingMessage,
            DispatchError::MissingNameParam => DispatchErrorKind::MissingNameParam,
            DispatchError::WrongDataTypeName => DispatchErrorKind::WrongDataTypeName,
            DispatchError::EventNotRegistered(_) => DispatchErrorKind::EventNotRegistered,
            DispatchError::CommandHandler { .. } => DispatchErrorKind::CommandHandler,
        }
    }

    /// The handler's own error, when the handler was the one that failed.
    pub fn handler_error(&self) -> Option<&HandlerError> {
        match self {
            DispatchError::CommandHandler { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// What a consumer needs from the dispatcher.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Decode `event` and run whatever it names.
    async fn resolve(
        &self,
        cancellation: &CancellationToken,
        event: &dyn Event,
    ) -> Result<(), DispatchError>;
}

/// Registry of event names against command handlers.
///
/// Populate it before handing it to a [`Broker`](crate::Broker); once shared
/// behind an `Arc` it can no longer change.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate an event name with a handler. Registering the same name
    /// again replaces the previous handler.
    pub fn register<H>(&mut self, event_name: impl Into<String>, handler: H)
    where
        H: CommandHandler + 'static,
    {
        self.register_shared(event_name, Arc::new(handler));
    }

    /// Like [`register`](Self::register), for a handler shared with other
    /// registrations.
    pub fn register_shared(&mut self, event_name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let event_name = event_name.into();
        if self.handlers.insert(event_name.clone(), handler).is_some() {
            debug!(event = %event_name, "replaced command handler");
        }
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_handler<H>(mut self, event_name: impl Into<String>, handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        self.register(event_name, handler);
        self
    }

    /// Register a closure as the handler for `event_name`.
    pub fn command<F>(self, event_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Context<'_>, Params) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.with_handler(event_name, FnHandler::new(handler))
    }

    /// List registered event names.
    pub fn commands(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }

    /// Whether a handler is registered for `event_name`.
    pub fn is_registered(&self, event_name: &str) -> bool {
        self.handlers.contains_key(event_name)
    }

    /// Number of registered event names.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("commands", &self.commands())
            .finish()
    }
}

#[async_trait]
impl Resolver for EventBus {
    async fn resolve(
        &self,
        cancellation: &CancellationToken,
        event: &dyn Event,
    ) -> Result<(), DispatchError> {
        let (name, params) = decode_event(event.data())?;
        let handler = self
            .handlers
            .get(&name)
            .ok_or_else(|| DispatchError::EventNotRegistered(name.clone()))?;

        debug!(event = %name, params = params.len(), "dispatching event");
        let ctx = Context::new(&name, cancellation);
        handler
            .handle(&ctx, params)
            .await
            .map_err(|source| DispatchError::CommandHandler {
                event: name.clone(),
                source,
            })
    }
}

/// Split a raw payload into its event name and remaining parameters.
///
/// NUL bytes around the JSON object are ignored: producers that frame the
/// payload with a length prefix or a fixed-size buffer leave them behind.
pub fn decode_event(data: &[u8]) -> Result<(String, Params), DispatchError> {
    let mut params: Params = serde_json::from_slice(trim_padding(data))
        .map_err(|e| DispatchError::UnmarshalingMessage(e.to_string()))?;

    let name = match params.remove(EVENT_NAME_KEY) {
        None => return Err(DispatchError::MissingNameParam),
        Some(Value::String(name)) => name,
        Some(_) => return Err(DispatchError::WrongDataTypeName),
    };
    Ok((name, params))
}

fn trim_padding(data: &[u8]) -> &[u8] {
    let Some(start) = data.iter().position(|b| *b != 0) else {
        return &[];
    };
    let end = data.iter().rposition(|b| *b != 0).map_or(start, |i| i + 1);
    &data[start..end]
}
