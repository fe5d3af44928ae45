/// Filter declarations for the external search invocation
///
/// Per-format configuration (extension set + command template) is turned into
/// validated, security-cleared declarations once at startup. Search never
/// re-interprets free-form command strings at call time.
use std::collections::BTreeMap;

use crate::config::{Config, FormatConfig, normalize_extension};
use crate::security::SecurityPolicy;

/// A validated filter ready to hand to the search invocation. Immutable once
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDeclaration {
    /// Normalized extensions (leading dot, lowercase) the filter applies to
    pub extensions: Vec<String>,
    /// The filter command template as configured
    pub command: String,
}

impl FilterDeclaration {
    /// Render the ugrep `--filter=ext1,ext2:command` argument value
    pub fn ugrep_spec(&self) -> String {
        let exts: Vec<&str> = self
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.'))
            .collect();
        format!("{}:{}", exts.join(","), self.command)
    }

    /// Whether the filter claims the given extension
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = normalize_extension(ext);
        self.extensions.iter().any(|e| *e == ext)
    }
}

/// Builds filter declarations from configured formats
pub struct FilterSpecBuilder<'a> {
    policy: &'a SecurityPolicy,
}

impl<'a> FilterSpecBuilder<'a> {
    pub fn new(policy: &'a SecurityPolicy) -> Self {
        Self { policy }
    }

    /// Build declarations for every enabled format with a filter command that
    /// passes the security policy. Rejected commands are excluded, not fatal;
    /// the format simply falls back to not being filterable. Formats without
    /// a filter contribute extensions only (handled by the command builder)
    /// and never appear here. Order follows the format registry.
    pub fn build(&self, config: &Config) -> Vec<FilterDeclaration> {
        let mut declarations = Vec::new();

        for (name, format) in config.enabled_formats() {
            let Some(command) = format.filter.as_deref() else {
                continue;
            };

            let verdict = self.policy.check(command);
            if !verdict.allowed {
                tracing::warn!(
                    format = %name,
                    command = %command,
                    reason = verdict.reason.as_deref().unwrap_or("unknown"),
                    "filter command rejected by security policy, format excluded from filtering"
                );
                continue;
            }

            declarations.push(FilterDeclaration {
                extensions: format
                    .extensions
                    .iter()
                    .map(|e| normalize_extension(e))
                    .collect(),
                command: command.to_string(),
            });
        }

        declarations
    }

    /// Per-format policy verdicts for diagnostics. Formats without a filter
    /// command are always reported as allowed (they are read directly).
    pub fn validate(&self, config: &Config) -> BTreeMap<String, bool> {
        config
            .enabled_formats()
            .map(|(name, format)| (name.clone(), self.format_allowed(format)))
            .collect()
    }

    fn format_allowed(&self, format: &FormatConfig) -> bool {
        match format.filter.as_deref() {
            Some(command) => self.policy.check(command).allowed,
            None => true,
        }
    }
}
