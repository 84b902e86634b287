//! Knowledge layer for grounding generated replies.
//!
//! Provides two retrieval paths:
//! - Curated index: weighted keyword scoring and numbered context blocks
//! - Uploaded document: keyword-anchored snippet windows over raw text

mod context;
mod scorer;
mod snippet;
mod source;

pub use context::*;
pub use scorer::*;
pub use snippet::*;
pub use source::*;
