//! Weighted keyword scoring of knowledge items against a query.

use super::source::KnowledgeItem;

/// Points for a title containing the whole query.
pub const TITLE_WEIGHT: u32 = 3;
/// Points for a body containing the whole query.
pub const BODY_WEIGHT: u32 = 1;
/// Points for every tag contained in the query.
pub const TAG_WEIGHT: u32 = 4;

/// A knowledge item paired with its relevance score for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredItem {
    pub item: KnowledgeItem,
    pub score: u32,
}

impl AsRef<KnowledgeItem> for ScoredItem {
    fn as_ref(&self) -> &KnowledgeItem {
        &self.item
    }
}

/// Score every item against `query`, dropping items that score zero.
///
/// Matching is case-insensitive substring containment. The result is sorted
/// by score, highest first; items with equal scores keep their input order.
#[must_use]
pub fn score(query: &str, items: &[KnowledgeItem]) -> Vec<ScoredItem> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let query_lower = query.to_lowercase();

    let mut scored: Vec<ScoredItem> = items
        .iter()
        .filter_map(|item| {
            let score = score_item(&query_lower, item);
            (score > 0).then(|| ScoredItem {
                item: item.clone(),
                score,
            })
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

/// Score and keep at most `k` of the best items.
#[must_use]
pub fn top_k(query: &str, items: &[KnowledgeItem], k: usize) -> Vec<ScoredItem> {
    let mut scored = score(query, items);
    scored.truncate(k);
    scored
}

fn score_item(query_lower: &str, item: &KnowledgeItem) -> u32 {
    let mut score = 0;
    if !item.title.is_empty() && item.title.to_lowercase().contains(query_lower) {
        score += TITLE_WEIGHT;
    }
    if !item.body.is_empty() && item.body.to_lowercase().contains(query_lower) {
        score += BODY_WEIGHT;
    }
    for tag in &item.tags {
        if !tag.is_empty() && query_lower.contains(&tag.to_lowercase()) {
            score += TAG_WEIGHT;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, title: &str, body: &str, tags: &[&str]) -> KnowledgeItem {
        KnowledgeItem::new(id, title, body, tags.iter().copied())
    }

    #[test]
    fn test_no_match_returns_empty() {
        let items = vec![item("1", "Rust", "systems language", &["cargo"])];
        assert!(score("python", &items).is_empty());
    }

    #[test]
    fn test_blank_query_scores_nothing() {
        let items = vec![item("1", "Rust", "systems language", &["cargo"])];
        assert!(score("", &items).is_empty());
        assert!(score("   \t", &items).is_empty());
    }

    #[test]
    fn test_tag_only_scores_four() {
        let items = vec![item("1", "Courses", "Many options", &["java"])];
        let result = score("I want to learn Java please", &items);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].score, 4);
    }

    #[test]
    fn test_tag_and_title_scores_seven() {
        let items = vec![item("1", "Java Course", "Many options", &["java"])];
        let result = score("java", &items);
        assert_eq!(result[0].score, 7);
    }

    #[test]
    fn test_tag_title_and_body_scores_eight() {
        let items = vec![item("1", "Java Course", "All about java", &["java"])];
        let result = score("JAVA", &items);
        assert_eq!(result[0].score, 8);
    }

    #[test]
    fn test_each_matching_tag_counts() {
        let items = vec![item("1", "x", "y", &["预约", "试听"])];
        let result = score("我想预约试听", &items);
        assert_eq!(result[0].score, 8);
    }

    #[test]
    fn test_sorted_by_score_descending() {
        let items = vec![
            item("low", "Other", "mentions rust", &[]),
            item("high", "Rust", "mentions rust", &["rust"]),
        ];
        let result = score("rust", &items);
        assert_eq!(result[0].item.id, "high");
        assert_eq!(result[1].item.id, "low");
    }

    #[test]
    fn test_ties_keep_index_order() {
        let items = vec![
            item("a", "A", "", &["refund"]),
            item("b", "B", "", &["order"]),
            item("c", "C", "", &["refund"]),
        ];
        let result = score("refund for my order", &items);
        let ids: Vec<_> = result.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_fields_do_not_abort_scoring() {
        let items = vec![item("empty", "", "", &[]), item("ok", "", "", &["java"])];
        let result = score("java", &items);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].item.id, "ok");
    }

    #[test]
    fn test_top_k_truncates() {
        let items: Vec<_> = (0..5)
            .map(|i| item(&i.to_string(), "t", "", &["kw"]))
            .collect();
        assert_eq!(top_k("kw", &items, 3).len(), 3);
    }
}
