//! Rendering of ranked knowledge items into prompt-ready context.

use std::fmt::Write;

use super::source::KnowledgeItem;

/// Returned when there is nothing relevant to ground a reply on.
pub const NO_RELEVANT_MATERIAL: &str = "（未检索到相关知识库片段）";

/// Separator appended after every rendered block.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Render items as numbered blocks, in the order given.
#[must_use]
pub fn assemble<T: AsRef<KnowledgeItem>>(items: &[T]) -> String {
    if items.is_empty() {
        return NO_RELEVANT_MATERIAL.to_string();
    }

    let mut context = String::new();
    for (i, item) in items.iter().enumerate() {
        let item = item.as_ref();
        let _ = write!(
            context,
            "【知识片段 {}】{}\n\n{}{BLOCK_SEPARATOR}",
            i + 1,
            item.title,
            item.body
        );
    }
    context
}
