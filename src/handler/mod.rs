//! Command handlers: the units of domain logic the event bus dispatches to.
//!
//! A handler receives a [`Context`] and the event's parameters (the decoded
//! payload with `event_name` already removed). Validating those parameters is
//! the handler's own job; [`ParamsExt`] covers the common checks.
//!
//! ## Handler Convention
//!
//! ```ignore
//! pub const EVENT: &str = "posts.v1.create";
//!
//! pub struct CreatePost { repo: PostRepository }
//!
//! #[async_trait]
//! impl CommandHandler for CreatePost {
//!     async fn handle(&self, _ctx: &Context<'_>, params: Params) -> Result<(), HandlerError> {
//!         let title = params.require_str("title")?;
//!         let tags = params.optional_str_list("tags")?;
//!         self.repo.create(title, tags.unwrap_or_default()).await.map_err(HandlerError::other)
//!     }
//! }
//!
//! bus.register(EVENT, CreatePost { repo });
//! ```

mod context;
mod error;
mod params;

pub use context::Context;
pub use error::HandlerError;
pub use params::{decode, Params, ParamsExt};

use async_trait::async_trait;

/// A capability that enacts a state change for one event name.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle one event. `params` no longer contains `event_name`.
    async fn handle(&self, ctx: &Context<'_>, params: Params) -> Result<(), HandlerError>;
}

/// Adapter that lets a plain closure act as a [`CommandHandler`].
///
/// Usually created through [`EventBus::command`](crate::EventBus::command).
pub struct FnHandler<F> {
    handle: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Context<'_>, Params) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(handle: F) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl<F> CommandHandler for FnHandler<F>
where
    F: Fn(&Context<'_>, Params) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, ctx: &Context<'_>, params: Params) -> Result<(), HandlerError> {
        (self.handle)(ctx, params)
    }
}
