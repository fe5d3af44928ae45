/// Search pipeline: command construction, bounded execution, output parsing
/// and result caching
///
/// The engine owns the long-lived pieces (security-cleared filter
/// declarations, the concurrency-bounded executor, the result cache) and runs
/// each query through the same path: validate, consult the cache, invoke the
/// external tool, parse, truncate, store.
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{KnowledgeError, Result};
use crate::filters::{FilterDeclaration, FilterSpecBuilder};
use crate::security::SecurityPolicy;

pub mod cache;
pub mod command;
pub mod executor;
pub mod parser;

pub use cache::{CacheKey, CacheStats, SearchCache};
pub use command::{SEARCH_PROGRAM, SearchCommandBuilder};
pub use executor::{ExecOutput, SearchExecutor};

/// Upper bound on terms accepted by a multi-term search
pub const MAX_TERMS: usize = 10;

/// Queries longer than this are rejected outright
const MAX_QUERY_CHARS: usize = 1000;

/// A fully resolved search request
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Boolean query text, passed to the tool verbatim
    pub text: String,
    /// Resolved absolute scope path (directory or single file)
    pub scope_path: PathBuf,
    pub recursive: bool,
    pub context_lines: u32,
    pub max_results: usize,
    pub fuzzy: bool,
    pub timeout_seconds: u64,
}

/// One match with its surrounding context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    /// Path relative to the searched scope where possible
    pub file: String,
    pub line: u64,
    pub text: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

/// Outcome of a single search
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub matches: Vec<SearchMatch>,
    /// Total matches found before truncation
    pub total_matches: usize,
    pub truncated: bool,
    pub query: String,
    pub searched_path: String,
    pub duration_ms: u64,
}

/// One entry of a multi-term search: the term and what became of it
#[derive(Debug)]
pub struct TermResult {
    pub term: String,
    pub result: Result<SearchResult>,
}

/// Long-lived search orchestrator
pub struct SearchEngine {
    config: Arc<Config>,
    policy: SecurityPolicy,
    filters: Vec<FilterDeclaration>,
    include_extensions: HashSet<String>,
    executor: SearchExecutor,
    cache: Option<SearchCache>,
}

impl SearchEngine {
    pub fn new(config: Arc<Config>) -> Self {
        let policy = SecurityPolicy::new(&config.security);
        let filters = FilterSpecBuilder::new(&policy).build(&config);
        let include_extensions = config.supported_extensions();
        let executor = SearchExecutor::new(config.limits.max_concurrent_searches);
        let cache = config
            .cache
            .enabled
            .then(|| SearchCache::new(&config.cache));

        Self {
            config,
            policy,
            filters,
            include_extensions,
            executor,
            cache,
        }
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Run a single search through the full pipeline.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        validate_query_text(&query.text)?;

        let key = CacheKey::fingerprint(query);
        let scope_mtime = scope_mtime(&query.scope_path);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key, scope_mtime) {
                tracing::debug!(query = %query.text, "cache hit");
                return Ok(hit);
            }
        }

        let argv = SearchCommandBuilder::new(
            &self.filters,
            &self.include_extensions,
            &self.config.exclude.patterns,
        )
        .build(query);

        let started = Instant::now();
        let output = self
            .executor
            .execute(
                &argv,
                Duration::from_secs(query.timeout_seconds),
                &query.text,
            )
            .await?;

        let parsed = parser::parse(&output.stdout, &query.scope_path);
        let total_matches = parsed.len();
        let truncated = total_matches > query.max_results;
        let mut matches = parsed;
        matches.truncate(query.max_results);

        let result = SearchResult {
            matches,
            total_matches,
            truncated,
            query: query.text.clone(),
            searched_path: query.scope_path.display().to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            query = %query.text,
            matches = total_matches,
            truncated,
            duration_ms = result.duration_ms,
            "search complete"
        );

        if let Some(cache) = &self.cache {
            cache.insert(key, result.clone(), scope_mtime);
        }

        Ok(result)
    }

    /// Run one search per term concurrently. A failing term does not abort
    /// its siblings; each entry carries its own outcome, in input order.
    pub async fn search_many(
        &self,
        terms: &[String],
        template: &SearchQuery,
    ) -> Result<Vec<TermResult>> {
        if terms.is_empty() {
            return Err(KnowledgeError::InvalidQuery {
                query: String::new(),
                reason: "at least one search term is required".to_string(),
            });
        }
        // Excess terms are dropped, not an error.
        if terms.len() > MAX_TERMS {
            tracing::debug!(submitted = terms.len(), kept = MAX_TERMS, "term list capped");
        }
        let terms = &terms[..terms.len().min(MAX_TERMS)];

        let searches = terms.iter().map(|term| {
            let mut query = template.clone();
            query.text = term.clone();
            async move {
                TermResult {
                    term: term.clone(),
                    result: self.search(&query).await,
                }
            }
        });

        Ok(futures::future::join_all(searches).await)
    }

    /// Startup self-test for configured filters: per enabled format, does the
    /// filter pass policy and can its executable actually be spawned?
    /// Filterless formats trivially pass.
    pub async fn validate_filters(&self) -> Vec<FilterStatus> {
        let report = FilterSpecBuilder::new(&self.policy).validate(&self.config);

        let mut statuses = Vec::new();
        for (name, policy_ok) in report {
            let command = self
                .config
                .formats
                .get(&name)
                .and_then(|f| f.filter.clone());

            let usable = match (&command, policy_ok) {
                (None, _) => true,
                (Some(_), false) => false,
                (Some(cmd), true) => self.policy.probe(cmd).await,
            };

            if !usable {
                tracing::warn!(format = %name, "filter unavailable, format will not be searchable");
            }

            statuses.push(FilterStatus {
                format: name,
                command,
                usable,
            });
        }
        statuses
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }
}

/// Startup status of one configured format's filter
#[derive(Debug, Clone, Serialize)]
pub struct FilterStatus {
    pub format: String,
    pub command: Option<String>,
    pub usable: bool,
}

fn validate_query_text(text: &str) -> Result<()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(KnowledgeError::InvalidQuery {
            query: text.to_string(),
            reason: "query must not be empty".to_string(),
        });
    }
    if text.chars().count() > MAX_QUERY_CHARS {
        let preview: String = text.chars().take(64).collect();
        return Err(KnowledgeError::InvalidQuery {
            query: preview,
            reason: format!("query exceeds {} characters", MAX_QUERY_CHARS),
        });
    }
    Ok(())
}

/// Newest modification time under a scope, used for cache invalidation.
/// Errors (racing deletions, permission issues) degrade to `None`, which
/// disables smart invalidation for that lookup rather than failing the search.
fn scope_mtime(path: &std::path::Path) -> Option<SystemTime> {
    if path.is_file() {
        return path.metadata().and_then(|m| m.modified()).ok();
    }

    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .filter_map(|m| m.modified().ok())
        .max()
}
