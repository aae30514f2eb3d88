//! Extension traits: media sources and tools.
//!
//! Two seams are exposed as traits so that alternative backends and extra
//! tools can be compiled in alongside the built-in ones.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  check_status  get_index  refresh_cache  │
//! │  search        get_stats  find_usage     │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!          MediaService (SiteCache)
//!                ▼
//!          MediaSource (admin API, in-memory, ...)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use media_index::traits::ToolRegistry;
//!
//! let mut tools = ToolRegistry::with_builtins();
//! // tools.register(Box::new(MyTool::new()));
//! assert_eq!(tools.len(), 6);
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cache::SiteKey;
use crate::models::RawUsageRecord;
use crate::search::SearchFilters;
use crate::service::MediaService;
use crate::usage::UsageQuery;

// ═══════════════════════════════════════════════════════════════════════
// MediaSource Trait
// ═══════════════════════════════════════════════════════════════════════

/// Why a media document could not be read.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The site has no media index document.
    #[error("media index not found at {url}")]
    NotFound { url: String },
    /// Network, authentication or HTTP failure.
    #[error("{0}")]
    Transport(String),
    /// The document was read but does not have the media index shape.
    #[error("malformed media index document: {0}")]
    Malformed(String),
}

/// Supplies the raw media index document for a site.
///
/// [`AdminSource`](crate::connector_admin::AdminSource) reads it from the
/// admin API; tests plug in in-memory sources.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Location of the site's media document, reported in failure payloads.
    fn document_url(&self, site: &SiteKey) -> String;

    /// Where a user can initialize the media index for the site.
    fn init_url(&self, site: &SiteKey) -> String;

    /// Fetch every usage row of the site's media document.
    async fn fetch(&self, site: &SiteKey) -> Result<Vec<RawUsageRecord>, FetchError>;

    /// Check that the media document exists without building an index.
    ///
    /// Defaults to a full [`fetch`](MediaSource::fetch).
    async fn probe(&self, site: &SiteKey) -> Result<(), FetchError> {
        self.fetch(site).await.map(|_| ())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that MCP clients can discover and call.
///
/// Tools are listed via `GET /tools/list` and MCP `tools/list`, and invoked
/// via `POST /tools/{name}` or MCP `tools/call`.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use media_index::traits::{Tool, ToolContext};
///
/// pub struct CachedSitesTool;
///
/// #[async_trait]
/// impl Tool for CachedSitesTool {
///     fn name(&self) -> &str { "cached_sites" }
///     fn description(&self) -> &str { "Count sites with a cached media index" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
///         Ok(json!({ "sites": ctx.service().cache().len() }))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores (e.g. `"get_stats"`).
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with the crate. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. `params` is always a JSON object.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Handle given to tools during execution.
///
/// Every server transport shares one [`MediaService`], and therefore one
/// cache, through this context.
#[derive(Clone)]
pub struct ToolContext {
    service: Arc<MediaService>,
}

impl ToolContext {
    pub fn new(service: Arc<MediaService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &MediaService {
        &self.service
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct SiteParams {
    #[serde(default)]
    org: String,
    #[serde(default)]
    repo: String,
    #[serde(default)]
    path: Option<String>,
}

/// Extract the site identity shared by every built-in tool.
pub fn site_from_params(params: &Value) -> Result<SiteKey> {
    let p: SiteParams = serde_json::from_value(params.clone())
        .map_err(|e| anyhow::anyhow!("invalid site parameters: {}", e))?;
    if p.org.trim().is_empty() {
        bail!("org must not be empty");
    }
    if p.repo.trim().is_empty() {
        bail!("repo must not be empty");
    }
    Ok(SiteKey::new(p.org, p.repo, p.path.as_deref()))
}

fn site_schema(extra: Value) -> Value {
    let mut properties = json!({
        "org": { "type": "string", "description": "Organization name" },
        "repo": { "type": "string", "description": "Repository (site) name" },
        "path": { "type": "string", "description": "Optional sub-path of the site, e.g. /blog" }
    });
    if let (Some(props), Value::Object(more)) = (properties.as_object_mut(), extra) {
        props.extend(more);
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": ["org", "repo"]
    })
}

pub struct CheckStatusTool;

#[async_trait]
impl Tool for CheckStatusTool {
    fn name(&self) -> &str {
        "check_status"
    }

    fn description(&self) -> &str {
        "Check whether a site's media index has been initialized"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        site_schema(json!({}))
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let site = site_from_params(&params)?;
        let report = ctx.service().check_status(&site).await;
        Ok(serde_json::to_value(report)?)
    }
}

pub struct GetIndexTool;

#[async_trait]
impl Tool for GetIndexTool {
    fn name(&self) -> &str {
        "get_index"
    }

    fn description(&self) -> &str {
        "List every unique media item of a site with its usage count"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        site_schema(json!({}))
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let site = site_from_params(&params)?;
        let reply = ctx.service().get_index(&site).await?;
        Ok(serde_json::to_value(reply)?)
    }
}

pub struct RefreshCacheTool;

#[async_trait]
impl Tool for RefreshCacheTool {
    fn name(&self) -> &str {
        "refresh_cache"
    }

    fn description(&self) -> &str {
        "Discard the cached media index of a site and fetch it again"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        site_schema(json!({}))
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let site = site_from_params(&params)?;
        let reply = ctx.service().refresh_cache(&site).await?;
        Ok(serde_json::to_value(reply)?)
    }
}

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search a site's media items by type, document, name, alt text or usage"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        site_schema(json!({
            "type": { "type": "string", "description": "Substring of the media type (case-sensitive), e.g. img, video, fragment" },
            "doc": { "type": "string", "description": "Exact path of the document using the item" },
            "name": { "type": "string", "description": "Substring of the item name (case-insensitive)" },
            "alt": { "type": "string", "description": "Substring of the alt text (case-insensitive)" },
            "unusedOnly": { "type": "boolean", "description": "Only items not used by any document", "default": false },
            "missingAlt": { "type": "boolean", "description": "Only items without alt text", "default": false }
        }))
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let site = site_from_params(&params)?;
        let filters: SearchFilters = serde_json::from_value(params)
            .map_err(|e| anyhow::anyhow!("invalid search filters: {}", e))?;
        let reply = ctx.service().search(&site, &filters).await?;
        Ok(serde_json::to_value(reply)?)
    }
}

pub struct GetStatsTool;

#[async_trait]
impl Tool for GetStatsTool {
    fn name(&self) -> &str {
        "get_stats"
    }

    fn description(&self) -> &str {
        "Summarize a site's media references by type, usage and alt text"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        site_schema(json!({}))
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let site = site_from_params(&params)?;
        let reply = ctx.service().stats(&site).await?;
        Ok(serde_json::to_value(reply)?)
    }
}

pub struct FindUsageTool;

#[async_trait]
impl Tool for FindUsageTool {
    fn name(&self) -> &str {
        "find_usage"
    }

    fn description(&self) -> &str {
        "Find every document that uses a media item (load the index first)"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        site_schema(json!({
            "mediaUrl": { "type": "string", "description": "Url of the media item; query strings are ignored" },
            "mediaName": { "type": "string", "description": "Part of the media item's url (case-insensitive)" }
        }))
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let site = site_from_params(&params)?;
        let query: UsageQuery = serde_json::from_value(params)
            .map_err(|e| anyhow::anyhow!("invalid usage query: {}", e))?;
        let reply = ctx.service().find_usage(&site, &query);
        Ok(serde_json::to_value(reply)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of built-in and custom tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry pre-loaded with the six media index tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CheckStatusTool));
        registry.register(Box::new(RefreshCacheTool));
        registry.register(Box::new(GetIndexTool));
        registry.register(Box::new(SearchTool));
        registry.register(Box::new(GetStatsTool));
        registry.register(Box::new(FindUsageTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_from_params() {
        let site = site_from_params(&json!({ "org": "acme", "repo": "web", "path": "/blog" }))
            .unwrap();
        assert_eq!(site, SiteKey::new("acme", "web", Some("/blog")));

        let site = site_from_params(&json!({ "org": "acme", "repo": "web" })).unwrap();
        assert_eq!(site.path, "");
    }

    #[test]
    fn test_site_from_params_rejects_missing_fields() {
        let err = site_from_params(&json!({ "repo": "web" })).unwrap_err();
        assert!(err.to_string().contains("org must not be empty"));

        let err = site_from_params(&json!({ "org": "acme", "repo": " " })).unwrap_err();
        assert!(err.to_string().contains("repo must not be empty"));

        let err = site_from_params(&json!({ "org": 1, "repo": "web" })).unwrap_err();
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_builtin_names_and_schemas() {
        let registry = ToolRegistry::with_builtins();
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "check_status",
                "refresh_cache",
                "get_index",
                "search",
                "get_stats",
                "find_usage"
            ]
        );
        for tool in registry.tools() {
            let schema = tool.parameters_schema();
            assert_eq!(schema["type"], "object");
            assert_eq!(schema["required"], json!(["org", "repo"]));
            assert!(schema["properties"]["org"].is_object());
            assert!(tool.is_builtin());
        }
        let search = registry.find("search").unwrap().parameters_schema();
        assert!(search["properties"]["missingAlt"].is_object());
        assert!(registry.find("nope").is_none());
    }
}
