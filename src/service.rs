//! The media index service: cache-backed implementations of every tool.
//!
//! [`MediaService`] pairs a [`MediaSource`] with a [`SiteCache`]. Each
//! operation names a site; on a cache miss the source is fetched, the index is
//! built and stored, and the query runs against the stored entry.
//!
//! # Failure payloads
//!
//! A missing or unreachable media document is an expected condition. It is
//! returned as [`Reply::Failed`] carrying an [`ErrorPayload`] with an
//! initialization link, never as an `Err`. Only a document whose shape breaks
//! the media index contract surfaces as an `Err`.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{CacheEntry, SiteCache, SiteKey};
use crate::models::CatalogueEntry;
use crate::search::{search_items, SearchFilters, SearchResults};
use crate::stats::{compute_stats, MediaStats};
use crate::traits::{FetchError, MediaSource};
use crate::usage::{find_usage, UsageQuery, UsageReport};

/// Message returned by `find_usage` when no index is loaded for the site.
pub const NOT_LOADED: &str = "Media data not loaded";

/// Either a successful response body or a failure payload.
///
/// Serializes untagged, so callers tell the two apart by the presence of an
/// `error` key.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply<T, E = ErrorPayload> {
    Ok(T),
    Failed(E),
}

impl<T, E> Reply<T, E> {
    pub fn ok(self) -> Option<T> {
        match self {
            Reply::Ok(v) => Some(v),
            Reply::Failed(_) => None,
        }
    }

    pub fn failed(self) -> Option<E> {
        match self {
            Reply::Ok(_) => None,
            Reply::Failed(e) => Some(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U, E> {
        match self {
            Reply::Ok(v) => Reply::Ok(f(v)),
            Reply::Failed(e) => Reply::Failed(e),
        }
    }
}

/// Failure payload for a site whose media document could not be read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error: String,
    /// Where a user can initialize the media index for the site.
    pub init_url: String,
    pub debug: ErrorDebug,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDebug {
    pub org: String,
    pub repo: String,
    pub path: String,
    pub url: String,
    pub error: String,
}

/// Minimal failure payload: `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleError {
    pub error: String,
}

/// Response body of `check_status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub initialized: bool,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorPayload>,
}

/// Response body of `get_index` and `refresh_cache`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexListing {
    pub data: Vec<CatalogueEntry>,
    pub total: usize,
    pub fetched_at: DateTime<Utc>,
    /// Whether this call reused an existing cache entry.
    pub cached: bool,
}

pub struct MediaService {
    source: Arc<dyn MediaSource>,
    cache: SiteCache,
}

impl MediaService {
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self {
            source,
            cache: SiteCache::new(),
        }
    }

    pub fn cache(&self) -> &SiteCache {
        &self.cache
    }

    /// Probe whether the site's media document exists.
    pub async fn check_status(&self, site: &SiteKey) -> StatusReport {
        match self.source.probe(site).await {
            Ok(()) => StatusReport {
                initialized: true,
                failure: None,
            },
            Err(err) => {
                tracing::warn!(%site, error = %err, "media index status check failed");
                StatusReport {
                    initialized: false,
                    failure: Some(self.error_payload(site, &err)),
                }
            }
        }
    }

    pub async fn get_index(&self, site: &SiteKey) -> Result<Reply<IndexListing>> {
        Ok(self.load(site, false).await?.map(listing))
    }

    /// Fetch the site's media document again and replace the cached entry.
    ///
    /// A load already in flight for the site is waited out, never reused.
    pub async fn refresh_cache(&self, site: &SiteKey) -> Result<Reply<IndexListing>> {
        Ok(self.load(site, true).await?.map(listing))
    }

    pub async fn search(
        &self,
        site: &SiteKey,
        filters: &SearchFilters,
    ) -> Result<Reply<SearchResults>> {
        Ok(self
            .load(site, false)
            .await?
            .map(|(entry, _)| search_items(&entry.index, filters)))
    }

    pub async fn stats(&self, site: &SiteKey) -> Result<Reply<MediaStats>> {
        Ok(self.load(site, false).await?.map(|(entry, _)| compute_stats(&entry)))
    }

    /// Look up where an item is used.
    ///
    /// Runs only against an index that is already cached for the site; it
    /// never triggers a fetch.
    pub fn find_usage(
        &self,
        site: &SiteKey,
        query: &UsageQuery,
    ) -> Reply<UsageReport, SimpleError> {
        match self.cache.get(site) {
            Some(entry) => Reply::Ok(find_usage(&entry.index, query)),
            None => Reply::Failed(SimpleError {
                error: NOT_LOADED.to_string(),
            }),
        }
    }

    /// Return the cache entry for `site`, fetching and building it on a miss
    /// or unconditionally when `refresh` is set.
    async fn load(
        &self,
        site: &SiteKey,
        refresh: bool,
    ) -> Result<Reply<(Arc<CacheEntry>, bool)>> {
        let fetch = || async {
            let url = self.source.document_url(site);
            tracing::info!(%site, %url, refresh, "fetching media index");
            self.source.fetch(site).await
        };
        let loaded = if refresh {
            self.cache.reload(site, fetch).await.map(|entry| (entry, false))
        } else {
            self.cache.get_or_load(site, fetch).await
        };

        match loaded {
            Ok(hit) => Ok(Reply::Ok(hit)),
            Err(err @ FetchError::Malformed(_)) => Err(err.into()),
            Err(err) => {
                tracing::warn!(%site, error = %err, "media index unavailable");
                Ok(Reply::Failed(self.error_payload(site, &err)))
            }
        }
    }

    fn error_payload(&self, site: &SiteKey, err: &FetchError) -> ErrorPayload {
        let message = err.to_string();
        ErrorPayload {
            error: message.clone(),
            init_url: self.source.init_url(site),
            debug: ErrorDebug {
                org: site.org.clone(),
                repo: site.repo.clone(),
                path: site.path.clone(),
                url: self.source.document_url(site),
                error: message,
            },
        }
    }
}

fn listing((entry, cached): (Arc<CacheEntry>, bool)) -> IndexListing {
    IndexListing {
        data: entry.index.unique_items().cloned().collect(),
        total: entry.index.len(),
        fetched_at: entry.fetched_at,
        cached,
    }
}
