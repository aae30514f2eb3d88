//! Core data models for the media index.
//!
//! A media index document is a flat list of [`RawUsageRecord`]s, one per
//! place a media item is referenced. The index builder folds those rows into
//! [`CatalogueEntry`]s (one per physical asset) and [`UsageDetail`]s (one per
//! reference).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Alt value the media index writes when an author explicitly left alt text unset.
pub const ALT_PLACEHOLDER: &str = "null";

/// One row of the remote media index document.
///
/// Known fields are typed; anything else the remote side sends is kept in
/// [`extra`](RawUsageRecord::extra) and written back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawUsageRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_used_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How a record's alt text is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltState {
    /// Any non-empty value other than the placeholder.
    Filled,
    /// Empty or absent: the image is treated as decorative.
    Decorative,
    /// The literal [`ALT_PLACEHOLDER`].
    NotFilled,
}

impl RawUsageRecord {
    /// The location identifier, or `""` when absent.
    pub fn url_str(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }

    /// The consuming document path, or `""` when the item is unused.
    pub fn doc_str(&self) -> &str {
        self.doc.as_deref().unwrap_or("")
    }

    pub fn alt_str(&self) -> &str {
        self.alt.as_deref().unwrap_or("")
    }

    pub fn type_str(&self) -> &str {
        self.media_type.as_deref().unwrap_or("")
    }

    pub fn is_unused(&self) -> bool {
        self.doc_str().is_empty()
    }

    pub fn alt_state(&self) -> AltState {
        match self.alt.as_deref() {
            None | Some("") => AltState::Decorative,
            Some(ALT_PLACEHOLDER) => AltState::NotFilled,
            Some(_) => AltState::Filled,
        }
    }

    /// Display name of the item.
    ///
    /// Uses the `name` attribute when present, otherwise the last path
    /// segment of the url with any query string removed.
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name;
        }
        let url = self.url_str();
        let path = url.split('?').next().unwrap_or(url);
        path.rsplit('/').next().unwrap_or(path)
    }

    /// The subset of fields recorded per reference in the usage index.
    pub fn usage_detail(&self) -> UsageDetail {
        UsageDetail {
            doc: self.doc.clone(),
            alt: self.alt.clone(),
            media_type: self.media_type.clone(),
            first_used_at: self.first_used_at.clone(),
            last_used_at: self.last_used_at.clone(),
            hash: self.hash.clone(),
        }
    }
}

/// One unique media item: the first-seen record plus how often it is referenced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueEntry {
    #[serde(flatten)]
    pub record: RawUsageRecord,
    pub usage_count: usize,
}

/// A single reference to a media item, as listed by `find_usage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDetail {
    pub doc: Option<String>,
    pub alt: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub first_used_at: Option<Value>,
    pub last_used_at: Option<Value>,
    pub hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_keeps_unknown_fields() {
        let rec: RawUsageRecord = serde_json::from_value(json!({
            "url": "https://main--site--org.aem.page/media_1.png",
            "doc": "/index",
            "type": "img > png",
            "width": 640,
        }))
        .unwrap();
        assert_eq!(rec.type_str(), "img > png");
        assert_eq!(rec.extra.get("width"), Some(&json!(640)));

        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["width"], json!(640));
        assert!(out.get("alt").is_none());
    }

    #[test]
    fn test_alt_state() {
        let mut rec = RawUsageRecord::default();
        assert_eq!(rec.alt_state(), AltState::Decorative);
        rec.alt = Some(String::new());
        assert_eq!(rec.alt_state(), AltState::Decorative);
        rec.alt = Some("null".to_string());
        assert_eq!(rec.alt_state(), AltState::NotFilled);
        rec.alt = Some("a cat".to_string());
        assert_eq!(rec.alt_state(), AltState::Filled);
    }

    #[test]
    fn test_display_name_falls_back_to_url() {
        let rec = RawUsageRecord {
            url: Some("/media/Hero.PNG?width=750".to_string()),
            ..Default::default()
        };
        assert_eq!(rec.display_name(), "Hero.PNG");

        let named = RawUsageRecord {
            name: Some("hero".to_string()),
            ..rec
        };
        assert_eq!(named.display_name(), "hero");
    }

    #[test]
    fn test_catalogue_entry_serializes_flat() {
        let entry = CatalogueEntry {
            record: RawUsageRecord {
                url: Some("a.png".to_string()),
                ..Default::default()
            },
            usage_count: 2,
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v, json!({ "url": "a.png", "usageCount": 2 }));
    }
}
