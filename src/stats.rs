//! Aggregate statistics for a site's media index.
//!
//! Counts are taken over the raw reference rows rather than the deduplicated
//! catalogue: an image used on ten pages contributes ten references. Rows
//! whose canonical key is empty are excluded, as they are from the index.

use indexmap::IndexMap;
use serde::Serialize;

use crate::cache::CacheEntry;
use crate::index::canonical_key;
use crate::models::AltState;

/// Bucket for rows that carry no type classification.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Response body of the `get_stats` tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStats {
    pub unique_items: usize,
    pub total_references: usize,
    /// Reference count per type, in first-seen order.
    pub by_type: IndexMap<String, usize>,
    /// References with no consuming document.
    pub unused: usize,
    pub alt_text: AltTextBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AltTextBreakdown {
    pub filled: usize,
    pub decorative: usize,
    pub not_filled: usize,
}

pub fn compute_stats(entry: &CacheEntry) -> MediaStats {
    let mut by_type: IndexMap<String, usize> = IndexMap::new();
    let mut alt_text = AltTextBreakdown::default();
    let mut total_references = 0;
    let mut unused = 0;

    let referenced = entry
        .raw_data
        .iter()
        .filter(|r| !canonical_key(r.url_str()).is_empty());

    for record in referenced {
        total_references += 1;

        let media_type = match record.type_str() {
            "" => UNKNOWN_TYPE,
            t => t,
        };
        *by_type.entry(media_type.to_string()).or_insert(0) += 1;

        if record.is_unused() {
            unused += 1;
        }

        match record.alt_state() {
            AltState::Filled => alt_text.filled += 1,
            AltState::Decorative => alt_text.decorative += 1,
            AltState::NotFilled => alt_text.not_filled += 1,
        }
    }

    MediaStats {
        unique_items: entry.index.len(),
        total_references,
        by_type,
        unused,
        alt_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MediaIndex;
    use crate::models::RawUsageRecord;
    use chrono::Utc;

    fn entry(raw: Vec<RawUsageRecord>) -> CacheEntry {
        CacheEntry {
            index: MediaIndex::build(&raw),
            raw_data: raw,
            fetched_at: Utc::now(),
        }
    }

    fn rec(url: &str, doc: &str, alt: &str) -> RawUsageRecord {
        RawUsageRecord {
            url: Some(url.to_string()),
            doc: Some(doc.to_string()),
            alt: Some(alt.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_scenario() {
        let stats = compute_stats(&entry(vec![
            rec("a.png?x=1", "p1", ""),
            rec("a.png", "p2", "cat"),
            rec("b.png", "", "null"),
        ]));

        assert_eq!(stats.unique_items, 2);
        assert_eq!(stats.total_references, 3);
        assert_eq!(stats.unused, 1);
        assert_eq!(
            stats.alt_text,
            AltTextBreakdown {
                filled: 1,
                decorative: 1,
                not_filled: 1,
            }
        );
    }

    #[test]
    fn test_totals_are_consistent() {
        let mut raw = vec![
            rec("a.png", "p1", "x"),
            rec("b.svg", "", ""),
            rec("", "p1", "dropped"),
            rec("c.mp4", "p2", "null"),
        ];
        raw[0].media_type = Some("img > png".to_string());
        raw[1].media_type = Some("img > svg".to_string());
        raw[3].media_type = None;

        let stats = compute_stats(&entry(raw));
        assert_eq!(stats.total_references, 3);
        assert_eq!(stats.by_type.values().sum::<usize>(), stats.total_references);
        assert_eq!(stats.by_type.get(UNKNOWN_TYPE), Some(&1));
        let alt = &stats.alt_text;
        assert_eq!(
            alt.filled + alt.decorative + alt.not_filled,
            stats.total_references
        );
    }

    #[test]
    fn test_query_only_url_is_excluded() {
        let stats = compute_stats(&entry(vec![
            rec("a.png", "p1", "x"),
            rec("?w=1", "p2", "y"),
        ]));
        assert_eq!(stats.unique_items, 1);
        assert_eq!(stats.total_references, 1);
        assert_eq!(stats.alt_text.filled, 1);
    }

    #[test]
    fn test_serialized_shape() {
        let stats = compute_stats(&entry(vec![rec("a.png", "", "")]));
        let v = serde_json::to_value(&stats).unwrap();
        assert_eq!(v["uniqueItems"], 1);
        assert_eq!(v["totalReferences"], 1);
        assert_eq!(v["byType"]["unknown"], 1);
        assert_eq!(v["altText"]["notFilled"], 0);
    }
}
