use crate::config::Config;
use crate::read::DocumentReader;
use crate::scope::resolve_scope;
use crate::search::{SearchEngine, SearchQuery};
use crate::types::*;

use anyhow::{Context, Result};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct KnowledgeMcpServer {
    config: Arc<Config>,
    engine: Arc<SearchEngine>,
    reader: Arc<DocumentReader>,
    tool_router: ToolRouter<Self>,
}

impl KnowledgeMcpServer {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            engine: Arc::new(SearchEngine::new(config.clone())),
            reader: Arc::new(DocumentReader::new(config.clone())),
            config,
            tool_router: Self::tool_router(),
        })
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Build the query a request resolves to, filling unset options from
    /// configured defaults.
    fn to_query(
        &self,
        text: String,
        scope: &ScopeRequest,
        context_lines: Option<u32>,
        max_results: Option<usize>,
        fuzzy: bool,
    ) -> Result<SearchQuery, String> {
        let resolved = resolve_scope(
            &self.config.knowledge.root,
            scope.scope_type.into(),
            scope.path.as_deref(),
            self.config.security.restrict_to_knowledge_root,
        )
        .map_err(|e| format!("{:#}", e))?;

        Ok(SearchQuery {
            text,
            scope_path: resolved.path,
            recursive: resolved.recursive,
            context_lines: context_lines.unwrap_or(self.config.search.context_lines),
            max_results: max_results.unwrap_or(self.config.search.max_results),
            fuzzy,
            timeout_seconds: self.config.search.timeout_seconds,
        })
    }
}

#[tool_router(router = tool_router)]
impl KnowledgeMcpServer {
    #[tool(
        description = "Search the document collection with a boolean query. Space means AND, `|` means OR, `-` negates, quotes match exact phrases. Matches come back with surrounding context lines."
    )]
    pub async fn search_documents(
        &self,
        Parameters(req): Parameters<SearchDocumentsRequest>,
    ) -> Result<String, String> {
        req.validate()?;

        let query = self.to_query(
            req.query,
            &req.scope,
            req.context_lines,
            req.max_results,
            req.fuzzy,
        )?;

        let result = self
            .engine
            .search(&query)
            .await
            .map_err(|e| format!("{:#}", e))?;

        let response = SearchDocumentsResponse::from(result);
        serde_json::to_string_pretty(&response).map_err(|e| format!("Serialization failed: {}", e))
    }

    #[tool(
        description = "Run several searches at once, one per term (up to 10). Each term succeeds or fails on its own; one bad term never discards the others."
    )]
    pub async fn search_multiple(
        &self,
        Parameters(req): Parameters<SearchMultipleRequest>,
    ) -> Result<String, String> {
        req.validate()?;

        let template = self.to_query(
            String::new(),
            &req.scope,
            req.context_lines,
            req.max_results,
            false,
        )?;

        let outcomes = self
            .engine
            .search_many(&req.terms, &template)
            .await
            .map_err(|e| format!("{:#}", e))?;

        let response = SearchMultipleResponse {
            results: outcomes
                .into_iter()
                .map(|o| match o.result {
                    Ok(r) => TermEntry {
                        term: o.term,
                        result: Some(SearchDocumentsResponse::from(r)),
                        error: None,
                    },
                    Err(e) => TermEntry {
                        term: o.term,
                        result: None,
                        error: Some(format!("{:#}", e)),
                    },
                })
                .collect(),
        };

        serde_json::to_string_pretty(&response).map_err(|e| format!("Serialization failed: {}", e))
    }

    #[tool(
        description = "Read a single document from the collection, converted to text through the configured filter for its format. Content is capped at a character limit."
    )]
    pub async fn read_document(
        &self,
        Parameters(req): Parameters<ReadDocumentRequest>,
    ) -> Result<String, String> {
        req.validate()?;

        let resolved = resolve_scope(
            &self.config.knowledge.root,
            crate::scope::ScopeKind::Document,
            Some(&req.path),
            self.config.security.restrict_to_knowledge_root,
        )
        .map_err(|e| format!("{:#}", e))?;

        let doc = self
            .reader
            .read(&resolved.path, req.max_chars)
            .await
            .map_err(|e| format!("{:#}", e))?;

        let response = ReadDocumentResponse {
            path: req.path,
            content: doc.content,
            truncated: doc.truncated,
            filtered_with: doc.filtered_with,
        };

        serde_json::to_string_pretty(&response).map_err(|e| format!("Serialization failed: {}", e))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for KnowledgeMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.config.server.name.clone(),
                title: Some("Knowledge MCP - Filtered Document Search".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Boolean search over a document collection, including PDFs and other \
                binary formats via filter commands. Use search_documents for a single \
                query, search_multiple to fan out several terms at once, and \
                read_document to fetch one document as text."
                    .into(),
            ),
        }
    }
}

impl KnowledgeMcpServer {
    pub async fn serve_stdio(config: Config) -> Result<()> {
        tracing::info!(
            root = %config.knowledge.root.display(),
            "starting knowledge MCP server"
        );

        let server = Self::new(config).context("Failed to create MCP server")?;

        // Startup self-test: log which formats are actually searchable.
        for status in server.engine.validate_filters().await {
            match (&status.command, status.usable) {
                (Some(cmd), true) => {
                    tracing::info!(format = %status.format, command = %cmd, "filter ready")
                }
                (Some(cmd), false) => {
                    tracing::warn!(format = %status.format, command = %cmd, "filter unusable")
                }
                (None, _) => {
                    tracing::debug!(format = %status.format, "direct read, no filter")
                }
            }
        }

        let transport = rmcp::transport::io::stdio();

        server.serve(transport).await?.waiting().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn server_for(root: &std::path::Path) -> KnowledgeMcpServer {
        let mut config = Config::default();
        config.knowledge.root = root.to_path_buf();
        KnowledgeMcpServer::new(config).unwrap()
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("rules")).unwrap();
        std::fs::write(
            dir.path().join("rules/combat.md"),
            "attack rolls add proficiency\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.search.max_results = 0;
        assert!(KnowledgeMcpServer::new(config).is_err());
    }

    #[test]
    fn test_to_query_applies_config_defaults() {
        let dir = fixture();
        let server = server_for(dir.path());

        let query = server
            .to_query("attack".to_string(), &ScopeRequest::default(), None, None, false)
            .unwrap();
        assert_eq!(query.context_lines, 5);
        assert_eq!(query.max_results, 50);
        assert_eq!(query.timeout_seconds, 30);
        assert!(query.recursive);
    }

    #[test]
    fn test_to_query_honors_overrides() {
        let dir = fixture();
        let server = server_for(dir.path());

        let query = server
            .to_query(
                "attack".to_string(),
                &ScopeRequest::default(),
                Some(2),
                Some(10),
                true,
            )
            .unwrap();
        assert_eq!(query.context_lines, 2);
        assert_eq!(query.max_results, 10);
        assert!(query.fuzzy);
    }

    #[test]
    fn test_to_query_document_scope_is_single_file() {
        let dir = fixture();
        let server = server_for(dir.path());

        let scope = ScopeRequest {
            scope_type: ScopeType::Document,
            path: Some("rules/combat.md".to_string()),
        };
        let query = server
            .to_query("attack".to_string(), &scope, None, None, false)
            .unwrap();
        assert!(!query.recursive);
        assert!(query.scope_path.ends_with("combat.md"));
    }

    #[test]
    fn test_to_query_rejects_traversal() {
        let dir = fixture();
        let server = server_for(dir.path());

        let scope = ScopeRequest {
            scope_type: ScopeType::Collection,
            path: Some("../outside".to_string()),
        };
        let err = server
            .to_query("attack".to_string(), &scope, None, None, false)
            .unwrap_err();
        assert!(err.contains("escapes") || err.contains("outside"));
    }

    #[tokio::test]
    async fn test_read_document_tool() {
        let dir = fixture();
        let server = server_for(dir.path());

        let out = server
            .read_document(Parameters(ReadDocumentRequest {
                path: "rules/combat.md".to_string(),
                max_chars: None,
            }))
            .await
            .unwrap();

        let response: ReadDocumentResponse = serde_json::from_str(&out).unwrap();
        assert_eq!(response.path, "rules/combat.md");
        assert!(response.content.contains("attack rolls"));
        assert!(!response.truncated);
    }

    #[tokio::test]
    async fn test_read_document_tool_missing_file() {
        let dir = fixture();
        let server = server_for(dir.path());

        let err = server
            .read_document(Parameters(ReadDocumentRequest {
                path: "rules/absent.md".to_string(),
                max_chars: None,
            }))
            .await
            .unwrap_err();
        assert!(!err.is_empty());
    }

    #[tokio::test]
    async fn test_search_documents_rejects_bad_request() {
        let dir = fixture();
        let server = server_for(dir.path());

        let err = server
            .search_documents(Parameters(SearchDocumentsRequest {
                query: "  ".to_string(),
                scope: ScopeRequest::default(),
                context_lines: None,
                max_results: None,
                fuzzy: false,
            }))
            .await
            .unwrap_err();
        assert!(err.contains("query"));
    }
}
