//! Per-conversation message history.
//!
//! Every operation is keyed by a [`ConversationKey`]; keys never observe
//! each other's messages.

mod error;
mod file;
mod store;
mod types;

pub use error::HistoryError;
pub use file::JsonFileStore;
pub use store::{InMemoryStore, KeyedStore};
pub use types::{ConversationKey, HistorySnapshot, Message, Role};
