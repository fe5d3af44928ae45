/// Deterministic construction of the ugrep argument vector
///
/// The external tool's argument conventions are a fixed contract: boolean
/// query mode (`-%`), case-insensitive (`-i`), context (`-C<n>`), fuzzy
/// (`-Z`), recursion (`-r`), include globs, `--filter=exts:cmd` declarations,
/// then the query text and the scope path as the final two positionals.
use std::collections::HashSet;

use crate::config::normalize_extension;
use crate::filters::FilterDeclaration;

use super::SearchQuery;

/// External search binary
pub const SEARCH_PROGRAM: &str = "ugrep";

/// Builds the full search invocation from a query, the cleared filter
/// declarations and the enabled extension set.
pub struct SearchCommandBuilder<'a> {
    filters: &'a [FilterDeclaration],
    include_extensions: &'a HashSet<String>,
    exclude_patterns: &'a [String],
}

impl<'a> SearchCommandBuilder<'a> {
    pub fn new(
        filters: &'a [FilterDeclaration],
        include_extensions: &'a HashSet<String>,
        exclude_patterns: &'a [String],
    ) -> Self {
        Self {
            filters,
            include_extensions,
            exclude_patterns,
        }
    }

    /// Build the argv for a query. The first element is the program name.
    pub fn build(&self, query: &SearchQuery) -> Vec<String> {
        let mut argv = vec![
            SEARCH_PROGRAM.to_string(),
            "-%".to_string(),
            "-i".to_string(),
            format!("-C{}", query.context_lines),
            "--line-number".to_string(),
            "--with-filename".to_string(),
        ];

        if query.fuzzy {
            argv.push("-Z".to_string());
        }

        if query.recursive {
            argv.push("-r".to_string());

            // Sorted for a stable argv, which also keeps cache keys honest.
            let mut extensions: Vec<&String> = self.include_extensions.iter().collect();
            extensions.sort();
            for ext in extensions {
                argv.push(format!("--include=*{}", ext));
            }

            for pattern in self.exclude_patterns {
                argv.push(format!("--exclude={}", pattern));
            }

            for declaration in self.filters {
                if declaration
                    .extensions
                    .iter()
                    .any(|e| self.include_extensions.contains(e))
                {
                    argv.push(format!("--filter={}", declaration.ugrep_spec()));
                }
            }
        } else if let Some(ext) = query
            .scope_path
            .extension()
            .and_then(|e| e.to_str())
            .map(normalize_extension)
        {
            // Single-file scope: only the filter matching this file applies.
            if let Some(declaration) = self.filters.iter().find(|d| d.matches_extension(&ext)) {
                let exts = ext.trim_start_matches('.');
                argv.push(format!("--filter={}:{}", exts, declaration.command));
            }
        }

        argv.push(query.text.clone());
        argv.push(query.scope_path.display().to_string());

        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn query(text: &str, path: &str, recursive: bool) -> SearchQuery {
        SearchQuery {
            text: text.to_string(),
            scope_path: PathBuf::from(path),
            recursive,
            context_lines: 5,
            max_results: 50,
            fuzzy: false,
            timeout_seconds: 30,
        }
    }

    fn pdf_filter() -> FilterDeclaration {
        FilterDeclaration {
            extensions: vec![".pdf".to_string()],
            command: "pdftotext - -".to_string(),
        }
    }

    fn extensions(exts: &[&str]) -> HashSet<String> {
        exts.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_base_flags_always_present() {
        let filters = vec![];
        let exts = extensions(&[]);
        let builder = SearchCommandBuilder::new(&filters, &exts, &[]);

        let argv = builder.build(&query("attack", "/kb", true));
        assert_eq!(argv[0], "ugrep");
        assert!(argv.contains(&"-%".to_string()));
        assert!(argv.contains(&"-i".to_string()));
        assert!(argv.contains(&"-C5".to_string()));
        assert!(argv.contains(&"--line-number".to_string()));
        assert!(argv.contains(&"--with-filename".to_string()));
    }

    #[test]
    fn test_query_and_path_are_final_positionals() {
        let filters = vec![];
        let exts = extensions(&[".md"]);
        let builder = SearchCommandBuilder::new(&filters, &exts, &[]);

        let argv = builder.build(&query("attack -ranged", "/kb", true));
        assert_eq!(argv[argv.len() - 2], "attack -ranged");
        assert_eq!(argv[argv.len() - 1], "/kb");
    }

    #[test]
    fn test_recursive_adds_sorted_includes() {
        let filters = vec![];
        let exts = extensions(&[".txt", ".md", ".pdf"]);
        let builder = SearchCommandBuilder::new(&filters, &exts, &[]);

        let argv = builder.build(&query("q", "/kb", true));
        let includes: Vec<&String> = argv.iter().filter(|a| a.starts_with("--include=")).collect();
        assert_eq!(includes, vec!["--include=*.md", "--include=*.pdf", "--include=*.txt"]);
        assert!(argv.contains(&"-r".to_string()));
    }

    #[test]
    fn test_recursive_adds_filters_and_excludes() {
        let filters = vec![pdf_filter()];
        let exts = extensions(&[".pdf", ".md"]);
        let excludes = vec![".git/*".to_string()];
        let builder = SearchCommandBuilder::new(&filters, &exts, &excludes);

        let argv = builder.build(&query("q", "/kb", true));
        assert!(argv.contains(&"--filter=pdf:pdftotext - -".to_string()));
        assert!(argv.contains(&"--exclude=.git/*".to_string()));
    }

    #[test]
    fn test_filter_outside_enabled_set_skipped() {
        let filters = vec![pdf_filter()];
        let exts = extensions(&[".md"]);
        let builder = SearchCommandBuilder::new(&filters, &exts, &[]);

        let argv = builder.build(&query("q", "/kb", true));
        assert!(!argv.iter().any(|a| a.starts_with("--filter=")));
    }

    #[test]
    fn test_single_file_scope_restricts_filter() {
        let filters = vec![pdf_filter()];
        let exts = extensions(&[".pdf", ".md"]);
        let builder = SearchCommandBuilder::new(&filters, &exts, &[]);

        let argv = builder.build(&query("q", "/kb/doc.pdf", false));
        assert!(!argv.contains(&"-r".to_string()));
        assert!(argv.contains(&"--filter=pdf:pdftotext - -".to_string()));
        assert!(!argv.iter().any(|a| a.starts_with("--include=")));
    }

    #[test]
    fn test_single_file_without_matching_filter() {
        let filters = vec![pdf_filter()];
        let exts = extensions(&[".pdf", ".md"]);
        let builder = SearchCommandBuilder::new(&filters, &exts, &[]);

        let argv = builder.build(&query("q", "/kb/notes.md", false));
        assert!(!argv.iter().any(|a| a.starts_with("--filter=")));
    }

    #[test]
    fn test_fuzzy_flag() {
        let filters = vec![];
        let exts = extensions(&[]);
        let builder = SearchCommandBuilder::new(&filters, &exts, &[]);

        let mut q = query("q", "/kb", true);
        q.fuzzy = true;
        let argv = builder.build(&q);
        assert!(argv.contains(&"-Z".to_string()));
    }

    #[test]
    fn test_context_lines_verbatim() {
        let filters = vec![];
        let exts = extensions(&[]);
        let builder = SearchCommandBuilder::new(&filters, &exts, &[]);

        let mut q = query("q", "/kb", true);
        q.context_lines = 0;
        let argv = builder.build(&q);
        assert!(argv.contains(&"-C0".to_string()));
    }

    #[test]
    fn test_deterministic_output() {
        let filters = vec![pdf_filter()];
        let exts = extensions(&[".pdf", ".md", ".txt"]);
        let builder = SearchCommandBuilder::new(&filters, &exts, &[]);

        let q = query("q", "/kb", true);
        assert_eq!(builder.build(&q), builder.build(&q));
    }
}
