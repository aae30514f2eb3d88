//! # Media Index
//!
//! A queryable, cached view over a site's media index.
//!
//! The media index is a flat log with one row per place a media item (image,
//! video, fragment, ...) is referenced by a page of a content site. This crate
//! fetches that log from the admin API, folds it into a deduplicated catalogue
//! plus a reverse usage index, caches the result per site, and serves it as
//! MCP tools.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ MediaSource  │──▶│ MediaIndex   │──▶│  SiteCache   │
//! │ (admin API)  │   │ build/dedup  │   │ per site     │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                        ┌─────────────────────┤
//!                        ▼                     ▼
//!                 ┌─────────────┐       ┌─────────────┐
//!                 │ search/stats│       │ find_usage  │
//!                 └──────┬──────┘       └──────┬──────┘
//!                        └──────────┬──────────┘
//!                                   ▼
//!                    ToolRegistry → MCP (HTTP / stdio)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! media-index status acme website        # is the media index initialized?
//! media-index stats acme website         # reference counts by type and alt text
//! media-index search acme website --missing-alt
//! media-index serve mcp                  # HTTP server with MCP at /mcp
//! media-index serve stdio                # MCP over stdin/stdout
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Usage rows, catalogue entries, usage details |
//! | [`index`] | Canonical keys and the index builder |
//! | [`cache`] | Per-site cache with load coalescing |
//! | [`search`] | Filtered search over unique items |
//! | [`stats`] | Aggregate reference statistics |
//! | [`usage`] | Reverse lookup from item to documents |
//! | [`service`] | Cache-backed operations and failure payloads |
//! | [`connector_admin`] | Admin API media source |
//! | [`traits`] | `MediaSource` and `Tool` traits, tool registry |
//! | [`mcp`] | MCP protocol bridge |
//! | [`server`] | HTTP server |

pub mod cache;
pub mod config;
pub mod connector_admin;
pub mod index;
pub mod mcp;
pub mod models;
pub mod search;
pub mod server;
pub mod service;
pub mod stats;
pub mod traits;
pub mod usage;
