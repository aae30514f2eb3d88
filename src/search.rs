//! Filtered search over a site's unique media items.
//!
//! Every filter is optional and the filters combine with logical AND. Filters
//! look at the catalogue entry, which carries the attributes of the *first*
//! reference seen for an item; `doc` and `alt` therefore match against that
//! first usage only.

use serde::{Deserialize, Serialize};

use crate::index::MediaIndex;
use crate::models::{AltState, CatalogueEntry};

/// Search criteria accepted by the `search` tool.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchFilters {
    /// Substring of the media type (case-sensitive).
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    /// Exact document path.
    pub doc: Option<String>,
    /// Substring of the item name (case-insensitive).
    pub name: Option<String>,
    /// Substring of the alt text (case-insensitive).
    pub alt: Option<String>,
    pub unused_only: bool,
    pub missing_alt: bool,
}

/// Response body of the `search` tool.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub results: Vec<CatalogueEntry>,
    pub count: usize,
}

impl SearchFilters {
    /// Whether `entry` satisfies every filter that is set.
    pub fn matches(&self, entry: &CatalogueEntry) -> bool {
        let item = &entry.record;

        if let Some(t) = &self.media_type {
            if !item.type_str().contains(t.as_str()) {
                return false;
            }
        }
        if let Some(doc) = &self.doc {
            if item.doc_str() != doc {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !contains_ignore_case(item.display_name(), name) {
                return false;
            }
        }
        if let Some(alt) = &self.alt {
            if !contains_ignore_case(item.alt_str(), alt) {
                return false;
            }
        }
        if self.unused_only && !item.is_unused() {
            return false;
        }
        if self.missing_alt && item.alt_state() == AltState::Filled {
            return false;
        }
        true
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Run `filters` over the unique items of `index`, preserving catalogue order.
pub fn search_items(index: &MediaIndex, filters: &SearchFilters) -> SearchResults {
    let results: Vec<CatalogueEntry> = index
        .unique_items()
        .filter(|entry| filters.matches(entry))
        .cloned()
        .collect();

    SearchResults {
        count: results.len(),
        results,
    }
}
