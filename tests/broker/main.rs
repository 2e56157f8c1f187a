//! Broker integration tests over the in-memory connection.

mod support;
mod lifecycle;
