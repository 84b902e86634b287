//! Curated knowledge items and the index that holds them.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

/// A curated record used to ground a generated reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Unique identifier within the index.
    pub id: String,
    /// Short headline, matched against the whole query.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    /// Answer text handed to the model.
    #[serde(default, alias = "content", deserialize_with = "null_as_empty")]
    pub body: String,
    /// Keywords matched as substrings of the query.
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: BTreeSet<String>,
}

impl KnowledgeItem {
    /// Create an item from its parts.
    #[must_use]
    pub fn new<I, T>(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            tags: tags
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.is_empty())
                .collect(),
        }
    }
}

impl AsRef<KnowledgeItem> for KnowledgeItem {
    fn as_ref(&self) -> &KnowledgeItem {
        self
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Null entries and empty strings are dropped: an empty tag would match every query.
fn lenient_tags<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<String>>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .flatten()
        .flatten()
        .filter(|t| !t.is_empty())
        .collect())
}

/// Anything that can hand out the full, ordered list of knowledge items.
pub trait ItemSource: Send + Sync {
    /// All items in index order.
    fn all_items(&self) -> &[KnowledgeItem];
}

/// Read-only, ordered collection of knowledge items with unique ids.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    items: Vec<KnowledgeItem>,
}

impl KnowledgeIndex {
    /// Build an index, keeping the first item for each id.
    #[must_use]
    pub fn new(items: Vec<KnowledgeItem>) -> Self {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| {
                let fresh = seen.insert(item.id.clone());
                if !fresh {
                    tracing::warn!(id = %item.id, "Duplicate knowledge item id, keeping the first");
                }
                fresh
            })
            .collect();
        Self { items }
    }

    /// The built-in items used when no knowledge file is available.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![
            KnowledgeItem::new(
                "kb-001",
                "课程咨询：Java",
                "Java就业班包含：JavaSE、Spring、SpringBoot、MyBatis、微服务、项目实战、面试辅导等。\n\
                 适合零基础/转行/提升。可提供试听与学习计划建议。",
                ["java", "课程", "就业", "学习路线"],
            ),
            KnowledgeItem::new(
                "kb-002",
                "预约试听",
                "你可以告诉我：意向课程、城市/线上、方便的时间段、联系方式（可选），我会为你生成预约编号。",
                ["预约", "试听", "报名", "咨询"],
            ),
            KnowledgeItem::new(
                "kb-003",
                "售后/退款",
                "售后问题请提供：订单号/手机号/购买渠道，我们将协助处理。",
                ["售后", "退款", "订单"],
            ),
        ])
    }

    /// Load items from a JSON array file, falling back to the built-in set.
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => match serde_json::from_str::<Vec<KnowledgeItem>>(&content) {
                Ok(items) => {
                    let index = Self::new(items);
                    tracing::info!(path = %path.display(), count = index.len(), "Loaded knowledge items");
                    index
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt knowledge file, using built-in items");
                    Self::builtin()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No knowledge file found, using built-in items");
                Self::builtin()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read knowledge file, using built-in items");
                Self::builtin()
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemSource for KnowledgeIndex {
    fn all_items(&self) -> &[KnowledgeItem] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_index_has_three_items() {
        let index = KnowledgeIndex::builtin();
        assert_eq!(index.len(), 3);
        assert_eq!(index.all_items()[0].id, "kb-001");
        assert!(index.all_items()[1].tags.contains("预约"));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let index = KnowledgeIndex::new(vec![
            KnowledgeItem::new("a", "First", "", Vec::<String>::new()),
            KnowledgeItem::new("a", "Second", "", Vec::<String>::new()),
            KnowledgeItem::new("b", "Third", "", Vec::<String>::new()),
        ]);
        assert_eq!(index.len(), 2);
        let ids: Vec<&str> = index.all_items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(index.all_items()[0].title, "First");
    }

    #[test]
    fn test_deserialize_tolerates_missing_and_null_fields() {
        let json = r#"[
            {"id": "x", "title": null, "content": "body text", "tags": ["java", null, ""]},
            {"id": "y"}
        ]"#;
        let items: Vec<KnowledgeItem> = serde_json::from_str(json).unwrap();

        assert_eq!(items[0].title, "");
        assert_eq!(items[0].body, "body text");
        assert_eq!(items[0].tags.len(), 1);
        assert!(items[1].body.is_empty());
        assert!(items[1].tags.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let index = KnowledgeIndex::load(&dir.path().join("missing.json")).await;
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        tokio::fs::write(
            &path,
            r#"[{"id": "k1", "title": "Rust", "body": "Systems", "tags": ["rust"]}]"#,
        )
        .await
        .unwrap();

        let index = KnowledgeIndex::load(&path).await;
        assert_eq!(index.len(), 1);
        assert_eq!(index.all_items()[0].title, "Rust");
    }

    #[tokio::test]
    async fn test_load_corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let index = KnowledgeIndex::load(&path).await;
        assert_eq!(index.len(), 3);
    }
}
