//! Admin API media source.
//!
//! Reads a site's media index document from the admin API:
//!
//! ```text
//! GET {admin_url}/source/{org}/{repo}{path}/.da/mediaindex/media.json
//! Authorization: Bearer $DA_ADMIN_TOKEN
//! ```
//!
//! The document is either a bare JSON array of usage rows or a sheet object
//! whose `data` field holds that array.
//!
//! # Retries
//!
//! HTTP 429, 5xx and network errors are retried with exponential backoff up to
//! `source.max_retries` times. A 404 is reported as
//! [`FetchError::NotFound`] straight away; any other client error is a
//! [`FetchError::Transport`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::cache::SiteKey;
use crate::config::SourceConfig;
use crate::models::RawUsageRecord;
use crate::traits::{FetchError, MediaSource};

/// Path of the media document relative to a site root.
pub const MEDIA_INDEX_PATH: &str = "/.da/mediaindex/media";

/// A [`MediaSource`] backed by the admin HTTP API.
pub struct AdminSource {
    config: SourceConfig,
    client: reqwest::Client,
    token: Option<String>,
}

impl AdminSource {
    /// Build a source from config, reading the token from the environment.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let token = config.token();
        if token.is_none() {
            tracing::debug!(env = %config.token_env, "no admin token set, sending anonymous requests");
        }
        Self::with_token(config, token)
    }

    pub fn with_token(config: SourceConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            token,
        })
    }

    /// GET the media document, retrying transient failures.
    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // 1s, 2s, 4s, ... capped at 32s
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(url, attempt, ?delay, "retrying media index request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .get(url)
                .header("Accept", "application/json");
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(FetchError::NotFound {
                            url: url.to_string(),
                        });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = FetchError::Transport(format!(
                        "admin API error {}: {}",
                        status,
                        body_text.trim()
                    ));

                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(FetchError::Transport(format!(
                        "admin API request failed: {}",
                        e
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            FetchError::Transport("admin API request failed after retries".to_string())
        }))
    }
}

#[async_trait]
impl MediaSource for AdminSource {
    fn document_url(&self, site: &SiteKey) -> String {
        media_document_url(&self.config.admin_url, site)
    }

    fn init_url(&self, site: &SiteKey) -> String {
        render_init_url(&self.config.init_url, site)
    }

    async fn fetch(&self, site: &SiteKey) -> Result<Vec<RawUsageRecord>, FetchError> {
        let url = self.document_url(site);
        let response = self.get(&url).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Transport(format!("invalid JSON from {}: {}", url, e)))?;
        parse_media_document(body)
    }

    /// Checks the response status only; the body is not parsed.
    async fn probe(&self, site: &SiteKey) -> Result<(), FetchError> {
        let url = self.document_url(site);
        self.get(&url).await.map(|_| ())
    }
}

/// Normalize a site sub-path to `""` or `/segment[/segment...]`.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Admin API url of a site's media document.
pub fn media_document_url(admin_url: &str, site: &SiteKey) -> String {
    format!(
        "{}/source/{}/{}{}{}.json",
        admin_url.trim_end_matches('/'),
        site.org,
        site.repo,
        normalize_path(&site.path),
        MEDIA_INDEX_PATH
    )
}

/// Fill the `{org}`, `{repo}` and `{path}` placeholders of an init url template.
pub fn render_init_url(template: &str, site: &SiteKey) -> String {
    template
        .replace("{org}", &site.org)
        .replace("{repo}", &site.repo)
        .replace("{path}", &normalize_path(&site.path))
}

/// Extract the usage rows from a media index document.
pub fn parse_media_document(body: Value) -> Result<Vec<RawUsageRecord>, FetchError> {
    let rows = match body {
        rows @ Value::Array(_) => rows,
        Value::Object(mut map) => match map.remove("data") {
            Some(data @ Value::Array(_)) => data,
            _ => {
                return Err(FetchError::Malformed(
                    "expected a `data` array in the sheet object".to_string(),
                ))
            }
        },
        other => {
            return Err(FetchError::Malformed(format!(
                "expected an array or sheet object, got {}",
                json_kind(&other)
            )))
        }
    };

    serde_json::from_value(rows).map_err(|e| FetchError::Malformed(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
