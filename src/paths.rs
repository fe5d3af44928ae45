/// Platform-specific path computation
///
/// Follows the XDG Base Directory specification on Unix-like systems.
use std::path::PathBuf;

/// Get the appropriate config directory for the current platform
///
/// - Windows: %APPDATA%
/// - macOS: ~/Library/Application Support
/// - Linux/Unix: $XDG_CONFIG_HOME or ~/.config
pub fn config_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        std::env::var("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    } else if cfg!(target_os = "macos") {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join("Library/Application Support"))
            .unwrap_or_else(|_| PathBuf::from("."))
    } else {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|_| PathBuf::from("."))
    }
}

/// Default configuration file path
pub fn default_config_path() -> PathBuf {
    config_dir().join("knowledge-mcp").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_components() {
        let path = default_config_path();
        let s = path.to_string_lossy();
        assert!(s.contains("knowledge-mcp"));
        assert!(s.ends_with("config.toml"));
    }

    #[test]
    fn test_config_dir_not_empty() {
        assert!(!config_dir().as_os_str().is_empty());
    }
}
