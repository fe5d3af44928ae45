/// Bounded document reads
///
/// Reading goes through the same format registry as search: formats with a
/// filter command are converted to text by running the filter under the
/// security policy, everything else is read directly. Two bounds apply: a
/// file-size cap checked before any bytes move, and a character cap on the
/// returned content.
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{KnowledgeError, Result};
use crate::security::SecurityPolicy;

/// Marker appended when content is cut at the character cap
const TRUNCATION_MARKER: &str = "\n...(truncated)";

/// Content of a document after filtering and bounding
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub content: String,
    pub truncated: bool,
    /// Filter command the content went through, if any
    pub filtered_with: Option<String>,
}

/// Reads documents through the format registry under resource bounds
pub struct DocumentReader {
    config: Arc<Config>,
    policy: SecurityPolicy,
}

impl DocumentReader {
    pub fn new(config: Arc<Config>) -> Self {
        let policy = SecurityPolicy::new(&config.security);
        Self { config, policy }
    }

    /// Read a single document. `path` must already be resolved and validated
    /// by scope resolution. `max_chars` overrides the configured character cap
    /// for this read only.
    pub async fn read(&self, path: &Path, max_chars: Option<usize>) -> Result<DocumentContent> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| KnowledgeError::DocumentNotFound(path.display().to_string()))?;
        if !metadata.is_file() {
            return Err(KnowledgeError::DocumentNotFound(path.display().to_string()));
        }

        let max_bytes = self.config.search.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(KnowledgeError::FileTooLarge {
                path: path.display().to_string(),
                size_mb: metadata.len() as f64 / (1024.0 * 1024.0),
                max_mb: self.config.search.max_file_size_mb,
            });
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let filter = self.config.filter_for_extension(extension);

        let (text, filtered_with) = match filter {
            Some(command) => {
                let raw = tokio::fs::read(path).await?;
                let converted = self.policy.run_bounded(command, &raw).await?;
                (
                    String::from_utf8_lossy(&converted).into_owned(),
                    Some(command.to_string()),
                )
            }
            None => (tokio::fs::read_to_string(path).await?, None),
        };

        let cap = max_chars.unwrap_or(self.config.limits.max_document_read_chars);
        let (content, truncated) = cap_chars(text, cap);

        Ok(DocumentContent {
            content,
            truncated,
            filtered_with,
        })
    }
}

fn cap_chars(text: String, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text, false);
    }
    let mut capped: String = text.chars().take(max_chars).collect();
    capped.push_str(TRUNCATION_MARKER);
    (capped, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterMode, FormatConfig};
    use tempfile::TempDir;

    fn reader_with(config: Config) -> DocumentReader {
        DocumentReader::new(Arc::new(config))
    }

    #[tokio::test]
    async fn test_direct_read() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.md");
        tokio::fs::write(&file, "plain markdown\n").await.unwrap();

        let doc = reader_with(Config::default()).read(&file, None).await.unwrap();
        assert_eq!(doc.content, "plain markdown\n");
        assert!(!doc.truncated);
        assert!(doc.filtered_with.is_none());
    }

    #[tokio::test]
    async fn test_missing_document() {
        let dir = TempDir::new().unwrap();
        let err = reader_with(Config::default())
            .read(&dir.path().join("absent.md"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_size_cap() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("big.md");
        tokio::fs::write(&file, "not actually big").await.unwrap();

        let mut config = Config::default();
        config.search.max_file_size_mb = 0;
        let err = reader_with(config).read(&file, None).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_char_cap_appends_marker() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("long.txt");
        tokio::fs::write(&file, "abcdefghij").await.unwrap();

        let mut config = Config::default();
        config.limits.max_document_read_chars = 4;
        let doc = reader_with(config).read(&file, None).await.unwrap();
        assert_eq!(doc.content, format!("abcd{}", TRUNCATION_MARKER));
        assert!(doc.truncated);
    }

    #[tokio::test]
    async fn test_content_at_cap_not_truncated() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("exact.txt");
        tokio::fs::write(&file, "abcd").await.unwrap();

        let mut config = Config::default();
        config.limits.max_document_read_chars = 4;
        let doc = reader_with(config).read(&file, None).await.unwrap();
        assert_eq!(doc.content, "abcd");
        assert!(!doc.truncated);
    }

    #[tokio::test]
    async fn test_filtered_read_runs_command() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doc.fake");
        tokio::fs::write(&file, "filtered body").await.unwrap();

        let mut config = Config::default();
        config.formats.insert(
            "fake".to_string(),
            FormatConfig {
                enabled: true,
                extensions: vec![".fake".to_string()],
                filter: Some("cat".to_string()),
            },
        );
        config.security.allowed_filter_commands.push("cat".to_string());

        let doc = reader_with(config).read(&file, None).await.unwrap();
        assert_eq!(doc.content, "filtered body");
        assert_eq!(doc.filtered_with.as_deref(), Some("cat"));
    }

    #[tokio::test]
    async fn test_filtered_read_blocked_by_policy() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doc.fake");
        tokio::fs::write(&file, "body").await.unwrap();

        let mut config = Config::default();
        config.formats.insert(
            "fake".to_string(),
            FormatConfig {
                enabled: true,
                extensions: vec![".fake".to_string()],
                filter: Some("cat".to_string()),
            },
        );
        config.security.filter_mode = FilterMode::Whitelist;
        // "cat" deliberately not in the allow-list

        let err = reader_with(config).read(&file, None).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::SecurityViolation { .. }));
    }

    #[tokio::test]
    async fn test_per_request_cap_overrides_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        tokio::fs::write(&file, "abcdefghij").await.unwrap();

        let doc = reader_with(Config::default())
            .read(&file, Some(6))
            .await
            .unwrap();
        assert_eq!(doc.content, format!("abcdef{}", TRUNCATION_MARKER));
        assert!(doc.truncated);
    }

    #[test]
    fn test_cap_chars_counts_characters_not_bytes() {
        let (capped, truncated) = cap_chars("héllo".to_string(), 3);
        assert!(truncated);
        assert!(capped.starts_with("hél"));
    }
}
