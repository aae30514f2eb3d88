//! Reverse lookup: which documents use a given media item.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::index::{canonical_key, MediaIndex};
use crate::models::{CatalogueEntry, UsageDetail};

/// Identifies the item to look up. `media_url` takes precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageQuery {
    pub media_url: Option<String>,
    /// Case-insensitive substring of a canonical key.
    pub media_name: Option<String>,
}

/// Response body of the `find_usage` tool.
///
/// An unresolved query yields `media_item: None` with zero counts rather than
/// an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub media_item: Option<CatalogueEntry>,
    pub usage_count: usize,
    /// Distinct consuming documents in order of first use.
    pub documents: Vec<String>,
    pub all_usages: Vec<UsageDetail>,
}

impl UsageReport {
    pub fn not_found() -> Self {
        Self {
            media_item: None,
            usage_count: 0,
            documents: Vec::new(),
            all_usages: Vec::new(),
        }
    }
}

/// Resolve `query` to a canonical key present in `index`.
///
/// A name lookup returns the first key, in first-seen order, containing the
/// name. Callers should not depend on which key wins when several match.
pub fn resolve_key<'a>(index: &'a MediaIndex, query: &UsageQuery) -> Option<&'a str> {
    if let Some(url) = query.media_url.as_deref().filter(|u| !u.is_empty()) {
        return index.get_key(&canonical_key(url));
    }

    let name = query
        .media_name
        .as_deref()
        .filter(|n| !n.is_empty())?
        .to_lowercase();
    index.keys().find(|k| k.contains(&name))
}

pub fn find_usage(index: &MediaIndex, query: &UsageQuery) -> UsageReport {
    let Some(key) = resolve_key(index, query) else {
        return UsageReport::not_found();
    };
    let (Some(item), Some(usages)) = (index.item(key), index.usages(key)) else {
        return UsageReport::not_found();
    };

    let documents: IndexSet<&str> = usages
        .iter()
        .filter_map(|u| u.doc.as_deref())
        .filter(|d| !d.is_empty())
        .collect();

    UsageReport {
        media_item: Some(item.clone()),
        usage_count: item.usage_count,
        documents: documents.into_iter().map(str::to_string).collect(),
        all_usages: usages.to_vec(),
    }
}
