//! # Knowledge MCP - Filtered Document Search over MCP
//!
//! A Model Context Protocol (MCP) server that exposes a local document
//! collection (markdown, text, PDFs and other binary formats) to AI
//! assistants through bounded boolean search.
//!
//! ## Overview
//!
//! Search is delegated to the external `ugrep` binary, with per-format filter
//! commands (e.g. `pdftotext`) converting binary documents to searchable text
//! on the fly. Every external invocation runs under a global concurrency
//! bound and a timeout, filter commands pass a security policy before use,
//! and results are cached with TTL and modification-based invalidation.
//!
//! ## Architecture
//!
//! ```text
//! в”Ңв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”җ
//! в”Ӯ    MCP Client      в”Ӯ  (Claude, VS Code, etc.)
//! в””в”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”¬в”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”ҳ
//!           в”Ӯ stdio
//! в”Ңв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв–јв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”җ
//! в”Ӯ KnowledgeMcpServer в”Ӯ  (search_documents, search_multiple, read_document)
//! в””в”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”¬в”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”ҳ
//!           в”Ӯ
//!    в”Ңв”Җв”Җв”Җв”Җв”Җв”Җв”ҙв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”¬в”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”җ
//! в”Ңв”Җв”Җв–јв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”җ в”Ңв”Җв–јв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”җ в”Ңв”Җв–јв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”җ
//! в”ӮSearchEngine  в”Ӯ в”ӮDocument   в”Ӯ в”ӮSecurityPolicy в”Ӯ
//! в”Ӯ(ugrep+cache) в”Ӯ в”ӮReader     в”Ӯ в”Ӯ(filter checks)в”Ӯ
//! в””в”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”ҳ в””в”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”ҳ в””в”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”Җв”ҳ
//! ```
//!
//! ## Modules
//!
//! - [`mcp_server`]: MCP protocol server with the three exposed tools
//! - [`search`]: command construction, bounded execution, parsing, caching
//! - [`read`]: bounded document reads through format filters
//! - [`filters`]: per-format filter declarations for the search invocation
//! - [`security`]: filter command policy and bounded standalone execution
//! - [`scope`]: scope resolution with path traversal protection
//! - [`config`]: configuration with TOML file and environment overrides
//! - [`types`]: MCP request/response types with JSON schema
//! - [`error`]: error types and result alias
//! - [`paths`]: platform config directory lookup
//!
//! ## Usage Example
//!
//! ```no_run
//! use knowledge_mcp::config::Config;
//! use knowledge_mcp::mcp_server::KnowledgeMcpServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new()?;
//!     KnowledgeMcpServer::serve_stdio(config).await?;
//!     Ok(())
//! }
//! ```

/// Configuration with TOML loading and environment overrides
pub mod config;

/// Error types and utilities
pub mod error;

/// Per-format filter declarations for the search invocation
pub mod filters;

/// MCP server implementation with tools
pub mod mcp_server;

/// Platform configuration directory lookup
pub mod paths;

/// Bounded document reads through format filters
pub mod read;

/// Search scope resolution with traversal protection
pub mod scope;

/// Search pipeline: command builder, executor, parser, cache
pub mod search;

/// Filter command security policy and bounded execution
pub mod security;

/// MCP request/response types with JSON schema definitions
pub mod types;
