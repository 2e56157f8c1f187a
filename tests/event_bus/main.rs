//! EventBus integration tests.

mod support;
mod properties;
