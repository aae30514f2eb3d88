//! Index builder: raw usage rows → deduplicated catalogue + reverse usage index.
//!
//! Rows are grouped by their [canonical key](canonical_key), so the same
//! physical asset referenced with different query-string variants collapses to
//! one [`CatalogueEntry`]. The catalogue keeps the attributes of the first row
//! seen for each key; every row, including the first, contributes one
//! [`UsageDetail`].

use indexmap::IndexMap;

use crate::models::{CatalogueEntry, RawUsageRecord, UsageDetail};

/// Derive the grouping key for a media url.
///
/// Drops everything from the first `?` and lower-cases the rest. An empty
/// input yields `""`, which callers treat as "exclude from the index".
pub fn canonical_key(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => base.to_lowercase(),
        None => url.to_lowercase(),
    }
}

/// The materialised index for one media document.
///
/// Both maps are keyed by canonical key and iterate in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct MediaIndex {
    items: IndexMap<String, CatalogueEntry>,
    usages: IndexMap<String, Vec<UsageDetail>>,
}

impl MediaIndex {
    /// Build the index in a single ordered pass over `records`.
    pub fn build(records: &[RawUsageRecord]) -> Self {
        let mut index = Self::default();

        for record in records {
            let key = canonical_key(record.url_str());
            if key.is_empty() {
                continue;
            }

            let entry = index.items.entry(key.clone()).or_insert_with(|| {
                let mut seed = record.clone();
                seed.extra.remove("usageCount");
                CatalogueEntry {
                    record: seed,
                    usage_count: 0,
                }
            });
            entry.usage_count += 1;

            index
                .usages
                .entry(key)
                .or_default()
                .push(record.usage_detail());
        }

        index
    }

    /// Unique items in first-seen order.
    pub fn unique_items(&self) -> impl Iterator<Item = &CatalogueEntry> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The stored canonical key equal to `key`, borrowed from the index.
    pub fn get_key(&self, key: &str) -> Option<&str> {
        self.items.get_key_value(key).map(|(k, _)| k.as_str())
    }

    pub fn item(&self, key: &str) -> Option<&CatalogueEntry> {
        self.items.get(key)
    }

    /// Every recorded reference to `key`, in document order.
    pub fn usages(&self, key: &str) -> Option<&[UsageDetail]> {
        self.usages.get(key).map(Vec::as_slice)
    }

    /// Canonical keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }
}
