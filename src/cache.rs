//! Per-site cache of built media indexes.
//!
//! A [`SiteCache`] is owned by the [`MediaService`](crate::service::MediaService)
//! rather than living in module state, so every server (and every test) starts
//! from an empty cache. Entries are immutable once stored and are replaced
//! wholesale on refresh.
//!
//! There is no TTL and no size bound: an entry lives until it is invalidated
//! or the process exits.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::index::MediaIndex;
use crate::models::RawUsageRecord;

/// Identity of a site: organization, repository and optional sub-path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SiteKey {
    pub org: String,
    pub repo: String,
    /// Sub-path inside the repository; empty for the repository root.
    pub path: String,
}

impl SiteKey {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, path: Option<&str>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            path: path.unwrap_or_default().to_string(),
        }
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.org, self.repo, self.path)
    }
}

/// A built index together with the rows it was built from.
#[derive(Debug)]
pub struct CacheEntry {
    pub index: MediaIndex,
    pub raw_data: Vec<RawUsageRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// Process-local cache of [`CacheEntry`]s keyed by [`SiteKey`].
#[derive(Default)]
pub struct SiteCache {
    entries: RwLock<HashMap<SiteKey, Arc<CacheEntry>>>,
    /// One gate per site with a load in progress.
    loading: Mutex<HashMap<SiteKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl SiteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, site: &SiteKey) -> Option<Arc<CacheEntry>> {
        self.entries.read().get(site).cloned()
    }

    /// Store an entry for `site`, replacing any previous one.
    pub fn put(
        &self,
        site: SiteKey,
        index: MediaIndex,
        raw_data: Vec<RawUsageRecord>,
        fetched_at: DateTime<Utc>,
    ) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            index,
            raw_data,
            fetched_at,
        });
        self.entries.write().insert(site, entry.clone());
        entry
    }

    /// Drop the entry for `site`. Returns whether one was present.
    pub fn invalidate(&self, site: &SiteKey) -> bool {
        let removed = self.entries.write().remove(site).is_some();
        tracing::debug!(%site, removed, "cache invalidated");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Return the cached entry for `site`, or load, build and store one.
    ///
    /// The boolean is `true` when the entry already existed. Concurrent misses
    /// for the same site wait on a shared gate, so `load` runs once and later
    /// callers pick up the stored entry.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        site: &SiteKey,
        load: F,
    ) -> Result<(Arc<CacheEntry>, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<RawUsageRecord>, E>>,
    {
        if let Some(entry) = self.get(site) {
            tracing::debug!(%site, "cache hit");
            return Ok((entry, true));
        }

        let gate = LoadGate::acquire(&self.loading, site);
        let _permit = gate.lock().await;

        if let Some(entry) = self.get(site) {
            tracing::debug!(%site, "cache filled by concurrent load");
            return Ok((entry, true));
        }

        tracing::debug!(%site, "cache miss");
        self.build_and_store(site, load).await.map(|entry| (entry, false))
    }

    /// Replace the entry for `site` with a freshly loaded one.
    ///
    /// Waits for any load already in flight for the site, then drops the
    /// stored entry and always runs `load`, so the result never predates the
    /// call. On failure the site is left uncached.
    pub async fn reload<F, Fut, E>(&self, site: &SiteKey, load: F) -> Result<Arc<CacheEntry>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<RawUsageRecord>, E>>,
    {
        let gate = LoadGate::acquire(&self.loading, site);
        let _permit = gate.lock().await;

        self.invalidate(site);
        self.build_and_store(site, load).await
    }

    async fn build_and_store<F, Fut, E>(
        &self,
        site: &SiteKey,
        load: F,
    ) -> Result<Arc<CacheEntry>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<RawUsageRecord>, E>>,
    {
        let raw = load().await?;
        let index = MediaIndex::build(&raw);
        tracing::info!(
            %site,
            records = raw.len(),
            unique = index.len(),
            "media index built"
        );
        Ok(self.put(site.clone(), index, raw, Utc::now()))
    }
}

/// Handle on a site's load gate.
///
/// The gate is shared by every caller loading the same site and is removed
/// from the map when the last handle drops, including when the loading
/// future is cancelled mid-fetch.
struct LoadGate<'a> {
    loading: &'a Mutex<HashMap<SiteKey, Arc<tokio::sync::Mutex<()>>>>,
    site: &'a SiteKey,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> LoadGate<'a> {
    fn acquire(
        loading: &'a Mutex<HashMap<SiteKey, Arc<tokio::sync::Mutex<()>>>>,
        site: &'a SiteKey,
    ) -> Self {
        let gate = loading.lock().entry(site.clone()).or_default().clone();
        Self {
            loading,
            site,
            gate,
        }
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for LoadGate<'_> {
    fn drop(&mut self) {
        let mut loading = self.loading.lock();
        // Handles are only cloned under this lock: a count of two means the
        // map's copy and ours are the last.
        let last = loading
            .get(self.site)
            .is_some_and(|g| Arc::ptr_eq(g, &self.gate) && Arc::strong_count(g) == 2);
        if last {
            loading.remove(self.site);
        }
    }
}
