//! Query shapes understood by every record store backend.

use sv_core::config::SearchCase;
use sv_core::{Category, VaultRecord};

/// Substring match on the clear-text title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMatch {
    pub needle: String,
    pub case: SearchCase,
}

impl TitleMatch {
    pub fn new(needle: impl Into<String>, case: SearchCase) -> Self {
        Self {
            needle: needle.into(),
            case,
        }
    }

    pub fn matches(&self, title: &str) -> bool {
        match self.case {
            SearchCase::Sensitive => title.contains(&self.needle),
            SearchCase::AsciiInsensitive => title
                .to_ascii_lowercase()
                .contains(&self.needle.to_ascii_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordQuery {
    All,
    ByCategory(Category),
    Title(TitleMatch),
}

impl RecordQuery {
    pub fn matches(&self, record: &VaultRecord) -> bool {
        match self {
            RecordQuery::All => true,
            RecordQuery::ByCategory(category) => record.category == *category,
            RecordQuery::Title(title) => title.matches(&record.title),
        }
    }

    /// Filter `records` and order newest-updated first.
    pub fn apply<'a, I>(&self, records: I) -> Vec<VaultRecord>
    where
        I: IntoIterator<Item = &'a VaultRecord>,
    {
        let mut out: Vec<VaultRecord> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        sort_newest_first(&mut out);
        out
    }
}

/// `updated_at` descending, then id descending so equal timestamps stay
/// in a stable order.
pub fn sort_newest_first(records: &mut [VaultRecord]) {
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use sv_core::RecordId;

    fn record(id: u64, title: &str, category: Category, updated_at: u64) -> VaultRecord {
        VaultRecord {
            id: RecordId(id),
            title: title.into(),
            encrypted_content: String::new(),
            category,
            attached_image_ref: None,
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn test_title_match_case_policies() {
        let insensitive = TitleMatch::new("log", SearchCase::AsciiInsensitive);
        assert!(insensitive.matches("Login"));
        assert!(insensitive.matches("Catalog"));
        assert!(!insensitive.matches("Notebook"));

        let sensitive = TitleMatch::new("log", SearchCase::Sensitive);
        assert!(!sensitive.matches("Login"));
        assert!(sensitive.matches("Catalog"));
    }

    #[test]
    fn test_apply_orders_newest_first() {
        let records = vec![
            record(1, "a", Category::Note, 100),
            record(2, "b", Category::Password, 300),
            record(3, "c", Category::Note, 200),
        ];
        let ids: Vec<u64> = RecordQuery::All.apply(&records).iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_id() {
        let records = vec![
            record(1, "a", Category::Note, 100),
            record(2, "b", Category::Note, 100),
        ];
        let ids: Vec<u64> = RecordQuery::All.apply(&records).iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_category_filter() {
        let records = vec![
            record(1, "a", Category::Note, 100),
            record(2, "b", Category::Password, 300),
        ];
        let out = RecordQuery::ByCategory(Category::Note).apply(&records);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, RecordId(1));
    }
}
