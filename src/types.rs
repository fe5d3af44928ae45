use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::scope::ScopeKind;
use crate::search::{SearchMatch, SearchResult};

/// Scope of a search: the whole collection, one subdirectory, or one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Global,
    Collection,
    Document,
}

impl From<ScopeType> for ScopeKind {
    fn from(value: ScopeType) -> Self {
        match value {
            ScopeType::Global => ScopeKind::Global,
            ScopeType::Collection => ScopeKind::Collection,
            ScopeType::Document => ScopeKind::Document,
        }
    }
}

/// Where to search
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScopeRequest {
    /// Scope kind
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
    /// Path relative to the knowledge root; required for collection and
    /// document scope, ignored for global
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ScopeRequest {
    fn default() -> Self {
        Self {
            scope_type: ScopeType::Global,
            path: None,
        }
    }
}

impl ScopeRequest {
    pub fn validate(&self) -> Result<(), String> {
        match self.scope_type {
            ScopeType::Global => Ok(()),
            ScopeType::Collection | ScopeType::Document => {
                match self.path.as_deref().map(str::trim) {
                    Some(p) if !p.is_empty() => Ok(()),
                    _ => Err("collection and document scopes require a non-empty path".to_string()),
                }
            }
        }
    }
}

/// Request to search the document collection
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchDocumentsRequest {
    /// Boolean search query. Space means AND, `|` means OR, `-` negates,
    /// quotes match exact phrases.
    pub query: String,
    /// Where to search (default: the whole collection)
    #[serde(default)]
    pub scope: ScopeRequest,
    /// Lines of context around each match (0-50, default from config)
    #[serde(default)]
    pub context_lines: Option<u32>,
    /// Maximum matches to return (1-500, default from config)
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Enable fuzzy matching (default: false)
    #[serde(default)]
    pub fuzzy: bool,
}

impl SearchDocumentsRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        if let Some(n) = self.context_lines {
            if n > 50 {
                return Err(format!("context_lines must be at most 50, got {}", n));
            }
        }
        if let Some(n) = self.max_results {
            if n == 0 || n > 500 {
                return Err(format!("max_results must be between 1 and 500, got {}", n));
            }
        }
        self.scope.validate()
    }
}

/// Request to run several searches at once, one per term
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchMultipleRequest {
    /// Search terms, each run as its own query; at most 10 are used, excess
    /// terms are dropped
    pub terms: Vec<String>,
    /// Where to search (default: the whole collection)
    #[serde(default)]
    pub scope: ScopeRequest,
    /// Lines of context around each match (0-50, default from config)
    #[serde(default)]
    pub context_lines: Option<u32>,
    /// Maximum matches per term (1-500, default from config)
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl SearchMultipleRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.terms.is_empty() {
            return Err("at least one term is required".to_string());
        }
        // Terms beyond the engine cap are dropped downstream, not rejected.
        if self.terms.iter().any(|t| t.trim().is_empty()) {
            return Err("terms must not be empty".to_string());
        }
        if let Some(n) = self.context_lines {
            if n > 50 {
                return Err(format!("context_lines must be at most 50, got {}", n));
            }
        }
        if let Some(n) = self.max_results {
            if n == 0 || n > 500 {
                return Err(format!("max_results must be between 1 and 500, got {}", n));
            }
        }
        self.scope.validate()
    }
}

/// Request to read a single document
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadDocumentRequest {
    /// Document path relative to the knowledge root
    pub path: String,
    /// Maximum characters to return (default from config)
    #[serde(default)]
    pub max_chars: Option<usize>,
}

impl ReadDocumentRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.path.trim().is_empty() {
            return Err("path must not be empty".to_string());
        }
        if let Some(0) = self.max_chars {
            return Err("max_chars must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Response to a single search
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchDocumentsResponse {
    /// Matches in tool output order, truncated to max_results
    pub matches: Vec<MatchEntry>,
    /// Matches found before truncation
    pub total_matches: usize,
    /// Whether matches were dropped to honor max_results
    pub truncated: bool,
    /// The query as executed
    pub query: String,
    /// The resolved scope path that was searched
    pub searched_path: String,
    /// Wall-clock search duration in milliseconds
    pub duration_ms: u64,
}

/// One match with surrounding context
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatchEntry {
    /// File path relative to the searched scope
    pub file: String,
    /// 1-based line number of the matching line
    pub line: u64,
    /// The matching line itself
    pub text: String,
    /// Context lines before the match
    pub context_before: Vec<String>,
    /// Context lines after the match
    pub context_after: Vec<String>,
}

impl From<SearchMatch> for MatchEntry {
    fn from(m: SearchMatch) -> Self {
        Self {
            file: m.file,
            line: m.line,
            text: m.text,
            context_before: m.context_before,
            context_after: m.context_after,
        }
    }
}

impl From<SearchResult> for SearchDocumentsResponse {
    fn from(r: SearchResult) -> Self {
        Self {
            matches: r.matches.into_iter().map(MatchEntry::from).collect(),
            total_matches: r.total_matches,
            truncated: r.truncated,
            query: r.query,
            searched_path: r.searched_path,
            duration_ms: r.duration_ms,
        }
    }
}

/// Outcome of one term of a multi-term search
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TermEntry {
    /// The term as submitted
    pub term: String,
    /// Search outcome, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SearchDocumentsResponse>,
    /// Error message, present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to a multi-term search, entries in input order
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchMultipleResponse {
    pub results: Vec<TermEntry>,
}

/// Response to a document read
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadDocumentResponse {
    /// Document path relative to the knowledge root
    pub path: String,
    /// Document content, converted to text if the format has a filter
    pub content: String,
    /// Whether content was cut at the character cap
    pub truncated: bool,
    /// Filter command used for conversion, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_with: Option<String>,
}
