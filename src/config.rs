/// Configuration system for knowledge-mcp
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, KnowledgeError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Knowledge base root
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Server metadata
    #[serde(default)]
    pub server: ServerConfig,

    /// Search engine settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Performance limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Filter command security policy
    #[serde(default)]
    pub security: SecurityConfig,

    /// Search result cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// File exclusion settings
    #[serde(default)]
    pub exclude: ExcludeConfig,

    /// Document format registry
    #[serde(default = "default_formats")]
    pub formats: BTreeMap<String, FormatConfig>,
}

/// Knowledge base root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Root directory of the document collection
    #[serde(default = "default_knowledge_root")]
    pub root: PathBuf,
}

/// Server metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported over MCP
    #[serde(default = "default_server_name")]
    pub name: String,
}

/// Search engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default lines of context around each match (0-50)
    #[serde(default = "default_context_lines")]
    pub context_lines: u32,

    /// Default maximum matches per search (1-500)
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Per-search timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,

    /// Maximum file size readable through read_document (in MB)
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

/// Performance limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent external search processes (1-16)
    #[serde(default = "default_max_concurrent_searches")]
    pub max_concurrent_searches: usize,

    /// Maximum characters returned by a document read
    #[serde(default = "default_max_document_read_chars")]
    pub max_document_read_chars: usize,
}

/// Security mode for filter command validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Whitelist,
    Blacklist,
    Disabled,
}

/// Security settings for filter commands and file access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Security mode for filter commands
    #[serde(default = "default_filter_mode")]
    pub filter_mode: FilterMode,

    /// Whitelist of allowed filter commands and executables
    #[serde(default = "default_allowed_filter_commands")]
    pub allowed_filter_commands: Vec<String>,

    /// Blacklist of blocked filter commands (blacklist mode only)
    #[serde(default)]
    pub blocked_filter_commands: Vec<String>,

    /// Timeout for standalone filter execution in seconds
    #[serde(default = "default_filter_timeout")]
    pub filter_timeout_seconds: u64,

    /// Prevent access to files outside the knowledge root
    #[serde(default = "default_restrict_to_root")]
    pub restrict_to_knowledge_root: bool,
}

/// Search result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable the search result cache
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Invalidate entries when the search scope is modified
    #[serde(default = "default_cache_smart")]
    pub smart: bool,

    /// Entry time-to-live in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,

    /// Maximum number of cached entries
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

/// File exclusion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludeConfig {
    /// Glob patterns excluded from every search
    #[serde(default = "default_exclude_patterns")]
    pub patterns: Vec<String>,
}

/// Document format configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Whether the format participates in search and read
    #[serde(default = "default_format_enabled")]
    pub enabled: bool,

    /// File extensions claimed by the format (with leading dot)
    pub extensions: Vec<String>,

    /// Shell-less filter command converting the file to text on stdout.
    /// None means the file is read directly.
    #[serde(default)]
    pub filter: Option<String>,
}

// Default value functions
fn default_knowledge_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_server_name() -> String {
    "knowledge-mcp".to_string()
}

fn default_context_lines() -> u32 {
    5
}

fn default_max_results() -> usize {
    50
}

fn default_search_timeout() -> u64 {
    30
}

fn default_max_file_size_mb() -> u64 {
    100
}

fn default_max_concurrent_searches() -> usize {
    4
}

fn default_max_document_read_chars() -> usize {
    100_000
}

fn default_filter_mode() -> FilterMode {
    FilterMode::Whitelist
}

fn default_allowed_filter_commands() -> Vec<String> {
    [
        "pdftotext",
        "pdftotext - -",
        "pandoc",
        "antiword",
        "jq",
        "/usr/bin/pdftotext",
        "/usr/local/bin/pdftotext",
        "/opt/homebrew/bin/pdftotext",
        "/usr/bin/pandoc",
        "/usr/local/bin/pandoc",
        "/opt/homebrew/bin/pandoc",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_filter_timeout() -> u64 {
    30
}

fn default_restrict_to_root() -> bool {
    true
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_smart() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_max_entries() -> usize {
    100
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        ".git/*".to_string(),
        "*.draft.*".to_string(),
        "_archive/*".to_string(),
    ]
}

fn default_format_enabled() -> bool {
    true
}

fn default_formats() -> BTreeMap<String, FormatConfig> {
    let mut formats = BTreeMap::new();
    formats.insert(
        "pdf".to_string(),
        FormatConfig {
            enabled: true,
            extensions: vec![".pdf".to_string()],
            filter: Some("pdftotext - -".to_string()),
        },
    );
    formats.insert(
        "markdown".to_string(),
        FormatConfig {
            enabled: true,
            extensions: vec![".md".to_string(), ".markdown".to_string()],
            filter: None,
        },
    );
    formats.insert(
        "text".to_string(),
        FormatConfig {
            enabled: true,
            extensions: vec![".txt".to_string(), ".rst".to_string()],
            filter: None,
        },
    );
    formats.insert(
        "csv".to_string(),
        FormatConfig {
            enabled: true,
            extensions: vec![".csv".to_string()],
            filter: None,
        },
    );
    // Disabled until the converter is confirmed installed
    formats.insert(
        "word_docx".to_string(),
        FormatConfig {
            enabled: false,
            extensions: vec![".docx".to_string()],
            filter: Some("pandoc --wrap=preserve -f docx -t plain - -o -".to_string()),
        },
    );
    formats.insert(
        "epub".to_string(),
        FormatConfig {
            enabled: false,
            extensions: vec![".epub".to_string()],
            filter: Some("pandoc --wrap=preserve -f epub -t plain - -o -".to_string()),
        },
    );
    formats.insert(
        "html".to_string(),
        FormatConfig {
            enabled: false,
            extensions: vec![".html".to_string(), ".htm".to_string()],
            filter: Some("pandoc --wrap=preserve -f html -t plain - -o -".to_string()),
        },
    );
    formats
}

impl Default for Config {
    fn default() -> Self {
        Self {
            knowledge: KnowledgeConfig::default(),
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            limits: LimitsConfig::default(),
            security: SecurityConfig::default(),
            cache: CacheConfig::default(),
            exclude: ExcludeConfig::default(),
            formats: default_formats(),
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            root: default_knowledge_root(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            max_results: default_max_results(),
            timeout_seconds: default_search_timeout(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: default_max_concurrent_searches(),
            max_document_read_chars: default_max_document_read_chars(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            filter_mode: default_filter_mode(),
            allowed_filter_commands: default_allowed_filter_commands(),
            blocked_filter_commands: Vec::new(),
            filter_timeout_seconds: default_filter_timeout(),
            restrict_to_knowledge_root: default_restrict_to_root(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            smart: default_cache_smart(),
            ttl_seconds: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            patterns: default_exclude_patterns(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, KnowledgeError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, KnowledgeError> {
        let config_path = crate::paths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("KNOWLEDGE_MCP_ROOT") {
            self.knowledge.root = PathBuf::from(root);
        }

        if let Ok(timeout) = std::env::var("KNOWLEDGE_MCP_SEARCH_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.search.timeout_seconds = secs;
            }
        }

        if let Ok(concurrent) = std::env::var("KNOWLEDGE_MCP_MAX_CONCURRENT") {
            if let Ok(n) = concurrent.parse() {
                self.limits.max_concurrent_searches = n;
            }
        }

        if let Ok(mode) = std::env::var("KNOWLEDGE_MCP_FILTER_MODE") {
            match mode.as_str() {
                "whitelist" => self.security.filter_mode = FilterMode::Whitelist,
                "blacklist" => self.security.filter_mode = FilterMode::Blacklist,
                "disabled" => self.security.filter_mode = FilterMode::Disabled,
                _ => {}
            }
        }

        if let Ok(ttl) = std::env::var("KNOWLEDGE_MCP_CACHE_TTL") {
            if let Ok(secs) = ttl.parse() {
                self.cache.ttl_seconds = secs;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        if self.search.context_lines > 50 {
            return Err(ConfigError::InvalidValue {
                key: "search.context_lines".to_string(),
                reason: format!("must be at most 50, got {}", self.search.context_lines),
            }
            .into());
        }

        if self.search.max_results == 0 || self.search.max_results > 500 {
            return Err(ConfigError::InvalidValue {
                key: "search.max_results".to_string(),
                reason: format!("must be between 1 and 500, got {}", self.search.max_results),
            }
            .into());
        }

        if self.search.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search.timeout_seconds".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.limits.max_concurrent_searches == 0 || self.limits.max_concurrent_searches > 16 {
            return Err(ConfigError::InvalidValue {
                key: "limits.max_concurrent_searches".to_string(),
                reason: format!(
                    "must be between 1 and 16, got {}",
                    self.limits.max_concurrent_searches
                ),
            }
            .into());
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.max_entries".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        // Two enabled formats claiming the same extension would make filter
        // selection depend on map iteration order. Reject it up front.
        let mut claimed: HashMap<String, String> = HashMap::new();
        for (name, format) in self.formats.iter().filter(|(_, f)| f.enabled) {
            for ext in &format.extensions {
                let ext = normalize_extension(ext);
                if let Some(other) = claimed.insert(ext.clone(), name.clone()) {
                    return Err(ConfigError::InvalidValue {
                        key: format!("formats.{}", name),
                        reason: format!(
                            "extension '{}' is already claimed by enabled format '{}'",
                            ext, other
                        ),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, KnowledgeError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// All extensions of enabled formats, normalized to lowercase with a dot
    pub fn supported_extensions(&self) -> HashSet<String> {
        self.formats
            .values()
            .filter(|f| f.enabled)
            .flat_map(|f| f.extensions.iter().map(|e| normalize_extension(e)))
            .collect()
    }

    /// Filter command for a file extension, if any enabled format claims it
    pub fn filter_for_extension(&self, ext: &str) -> Option<&str> {
        let ext = normalize_extension(ext);
        self.formats
            .values()
            .filter(|f| f.enabled)
            .find(|f| f.extensions.iter().any(|e| normalize_extension(e) == ext))
            .and_then(|f| f.filter.as_deref())
    }

    /// Enabled formats in registry order
    pub fn enabled_formats(&self) -> impl Iterator<Item = (&String, &FormatConfig)> {
        self.formats.iter().filter(|(_, f)| f.enabled)
    }
}

/// Lowercase an extension and ensure a leading dot
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}
