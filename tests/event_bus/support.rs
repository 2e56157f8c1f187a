//! Test domain: a post store driven by create and update commands.

use std::sync::Arc;

use async_trait::async_trait;
use event_relay::{
    decode, CommandHandler, Context, DispatchError, EventBus, HandlerError, Params, ParamsExt,
    Resolver,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const CREATE_POST: &str = "posts.v1.create";
pub const UPDATE_POST: &str = "posts.v1.update";

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub creator: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Shared in-memory post storage.
#[derive(Clone, Default)]
pub struct PostStore {
    posts: Arc<Mutex<Vec<Post>>>,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Post> {
        self.posts.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<Post> {
        self.posts.lock().iter().find(|p| p.id == id).cloned()
    }
}

/// Validates params by hand.
pub struct CreatePost {
    pub store: PostStore,
}

#[async_trait]
impl CommandHandler for CreatePost {
    async fn handle(&self, _ctx: &Context<'_>, params: Params) -> Result<(), HandlerError> {
        params.require_fields(&["creator", "title", "content"])?;
        let creator = params.require_str("creator")?.to_string();
        let title = params.require_str("title")?.to_string();
        let content = params.require_str("content")?.to_string();
        let tags = params.optional_str_list("tags")?.unwrap_or_default();

        let mut posts = self.store.posts.lock();
        let id = format!("post-{}", posts.len() + 1);
        posts.push(Post {
            id,
            creator,
            title,
            content,
            tags,
        });
        Ok(())
    }
}

#[derive(Deserialize)]
struct UpdatePostInput {
    id: String,
    title: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
}

/// Decodes params into a typed input.
pub struct UpdatePost {
    pub store: PostStore,
}

#[async_trait]
impl CommandHandler for UpdatePost {
    async fn handle(&self, _ctx: &Context<'_>, params: Params) -> Result<(), HandlerError> {
        let input: UpdatePostInput = decode(params)?;

        let mut posts = self.store.posts.lock();
        let post = posts
            .iter_mut()
            .find(|p| p.id == input.id)
            .ok_or_else(|| HandlerError::Rejected(format!("post {} not found", input.id)))?;
        if let Some(title) = input.title {
            post.title = title;
        }
        if let Some(content) = input.content {
            post.content = content;
        }
        if let Some(tags) = input.tags {
            post.tags = tags;
        }
        Ok(())
    }
}

pub fn post_bus(store: &PostStore) -> EventBus {
    EventBus::new()
        .with_handler(CREATE_POST, CreatePost { store: store.clone() })
        .with_handler(UPDATE_POST, UpdatePost { store: store.clone() })
}

pub fn payload(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

pub async fn resolve(bus: &EventBus, data: Vec<u8>) -> Result<(), DispatchError> {
    bus.resolve(&CancellationToken::new(), &data).await
}
