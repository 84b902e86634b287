//! Grounded Chat - Retrieval-grounded streaming chat with durable history.

pub mod ai;
pub mod config;
pub mod document;
pub mod history;
pub mod intent;
pub mod knowledge;
pub mod pipeline;
pub mod server;
pub mod snapshot;
pub mod stream;
