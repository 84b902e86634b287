//! Chat pipeline: grounding, generation and history recording.

mod chat;
mod error;

pub use chat::ChatCore;
pub use error::CoreError;
