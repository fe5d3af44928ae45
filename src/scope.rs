/// Search scope resolution against the knowledge root
///
/// A scope is global (whole root, recursive), a collection (subdirectory,
/// recursive) or a single document. Relative paths supplied by the client are
/// resolved under the root with traversal protection.
use std::path::{Component, Path, PathBuf};

use crate::error::{KnowledgeError, Result};

/// Scope kind as supplied by the tool layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Collection,
    Document,
}

/// A resolved, validated search scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub path: PathBuf,
    pub recursive: bool,
}

/// Resolve a scope against the knowledge root.
///
/// `rel_path` is ignored for global scope. Collection paths must name an
/// existing directory, document paths an existing file. When `restrict` is
/// set, any path that escapes the root (via `..`, absolute paths, or
/// symlinks) is rejected.
pub fn resolve_scope(
    root: &Path,
    kind: ScopeKind,
    rel_path: Option<&str>,
    restrict: bool,
) -> Result<ResolvedScope> {
    let root = root
        .canonicalize()
        .map_err(|_| KnowledgeError::PathNotFound(root.display().to_string()))?;

    match kind {
        ScopeKind::Global => Ok(ResolvedScope {
            path: root,
            recursive: true,
        }),
        ScopeKind::Collection => {
            let rel = rel_path.unwrap_or("");
            let path = resolve_under_root(&root, rel, restrict)?;
            if !path.is_dir() {
                return Err(KnowledgeError::PathNotFound(rel.to_string()));
            }
            Ok(ResolvedScope {
                path,
                recursive: true,
            })
        }
        ScopeKind::Document => {
            let rel = rel_path.unwrap_or("");
            let path = resolve_under_root(&root, rel, restrict)?;
            if !path.is_file() {
                return Err(KnowledgeError::DocumentNotFound(rel.to_string()));
            }
            Ok(ResolvedScope {
                path,
                recursive: false,
            })
        }
    }
}

fn resolve_under_root(root: &Path, rel: &str, restrict: bool) -> Result<PathBuf> {
    let rel_path = Path::new(rel);

    if restrict {
        if rel_path.is_absolute() {
            return Err(KnowledgeError::PathTraversal(rel.to_string()));
        }
        if rel_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(KnowledgeError::PathTraversal(rel.to_string()));
        }
    }

    let joined = root.join(rel_path);
    let resolved = joined
        .canonicalize()
        .map_err(|_| KnowledgeError::PathNotFound(rel.to_string()))?;

    // Canonicalization also resolves symlinks, so a link pointing outside the
    // root fails this check.
    if restrict && !resolved.starts_with(root) {
        return Err(KnowledgeError::PathTraversal(rel.to_string()));
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("rules")).unwrap();
        std::fs::write(dir.path().join("rules/combat.md"), "attack armor\n").unwrap();
        dir
    }

    #[test]
    fn test_global_scope() {
        let dir = fixture();
        let scope = resolve_scope(dir.path(), ScopeKind::Global, None, true).unwrap();
        assert!(scope.recursive);
        assert_eq!(scope.path, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_collection_scope() {
        let dir = fixture();
        let scope = resolve_scope(dir.path(), ScopeKind::Collection, Some("rules"), true).unwrap();
        assert!(scope.recursive);
        assert!(scope.path.ends_with("rules"));
    }

    #[test]
    fn test_document_scope_is_not_recursive() {
        let dir = fixture();
        let scope = resolve_scope(
            dir.path(),
            ScopeKind::Document,
            Some("rules/combat.md"),
            true,
        )
        .unwrap();
        assert!(!scope.recursive);
        assert!(scope.path.ends_with("combat.md"));
    }

    #[test]
    fn test_missing_collection() {
        let dir = fixture();
        let err =
            resolve_scope(dir.path(), ScopeKind::Collection, Some("nope"), true).unwrap_err();
        assert!(matches!(err, KnowledgeError::PathNotFound(_)));
    }

    #[test]
    fn test_document_scope_on_directory_fails() {
        let dir = fixture();
        let err = resolve_scope(dir.path(), ScopeKind::Document, Some("rules"), true).unwrap_err();
        assert!(matches!(err, KnowledgeError::DocumentNotFound(_)));
    }

    #[test]
    fn test_parent_dir_traversal_rejected() {
        let dir = fixture();
        let err = resolve_scope(
            dir.path(),
            ScopeKind::Collection,
            Some("../outside"),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, KnowledgeError::PathTraversal(_)));
    }

    #[test]
    fn test_absolute_path_rejected() {
        let dir = fixture();
        let err =
            resolve_scope(dir.path(), ScopeKind::Document, Some("/etc/passwd"), true).unwrap_err();
        assert!(matches!(err, KnowledgeError::PathTraversal(_)));
    }

    #[test]
    fn test_unrestricted_allows_absolute() {
        let dir = fixture();
        let doc = dir.path().join("rules/combat.md");
        let scope = resolve_scope(
            dir.path(),
            ScopeKind::Document,
            Some(doc.to_str().unwrap()),
            false,
        );
        assert!(scope.is_ok());
    }
}
