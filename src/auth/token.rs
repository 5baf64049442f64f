//! Token models owned by provider caches and the durable refresh store.

pub mod credential;
pub mod refresh;
pub mod secret;
