/// Parsing of ugrep's line-oriented output into structured matches
///
/// Output arrives as groups separated by blank lines. Within a group, match
/// lines look like `path:line:text` and context lines like `path-line-text`.
/// Context lines before the first marker of a group belong to the next match
/// (leading context); lines after a marker belong to the match just opened
/// (trailing context). Parsing never fails: malformed lines are dropped.
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::SearchMatch;

static MATCH_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?):(\d+):(.*)$").expect("valid match regex"));

static CONTEXT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)-(\d+)-(.*)$").expect("valid context regex"));

/// Parse raw search output into matches, with file paths made relative to
/// `base_path` when possible.
pub fn parse(stdout: &str, base_path: &Path) -> Vec<SearchMatch> {
    if stdout.trim().is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<SearchMatch> = Vec::new();
    let mut current: Option<SearchMatch> = None;
    let mut context_before: Vec<String> = Vec::new();

    for line in stdout.split('\n') {
        if line.is_empty() {
            // group boundary finalizes the open match
            if let Some(m) = current.take() {
                matches.push(m);
            }
            context_before.clear();
            continue;
        }

        if let Some(caps) = MATCH_LINE.captures(line) {
            let line_number: u64 = match caps[2].parse() {
                Ok(n) if n >= 1 => n,
                _ => continue,
            };

            if let Some(m) = current.take() {
                matches.push(m);
            }

            current = Some(SearchMatch {
                file: relativize(&caps[1], base_path),
                line: line_number,
                text: caps[3].to_string(),
                context_before: std::mem::take(&mut context_before),
                context_after: Vec::new(),
            });
            continue;
        }

        if let Some(caps) = CONTEXT_LINE.captures(line) {
            let text = caps[3].to_string();
            match current.as_mut() {
                Some(m) => m.context_after.push(text),
                None => context_before.push(text),
            }
            continue;
        }

        // No path:line structure at all. Trailing lines of an open match are
        // still context (filter output can contain anything); otherwise drop.
        if let Some(m) = current.as_mut() {
            m.context_after.push(line.to_string());
        }
    }

    if let Some(m) = current.take() {
        matches.push(m);
    }

    matches
}

fn relativize(file: &str, base_path: &Path) -> String {
    Path::new(file)
        .strip_prefix(base_path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| file.to_string())
}
