//! PRD document loading
//!
//! `analyze-prd` receives a path, not content. Hosts decide where documents
//! may live by choosing the loader's root.

use crate::error::{ScopeError, ScopeResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// A loaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    /// Name recorded as `extractedFrom` on requirements
    pub name: String,
    pub content: String,
}

/// Source of PRD documents
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the document at `path`
    async fn load(&self, path: &str) -> ScopeResult<LoadedDocument>;
}

/// Loads documents from a directory tree, refusing paths that leave it
#[derive(Debug, Clone)]
pub struct FsDocumentLoader {
    root: PathBuf,
}

impl FsDocumentLoader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` under the root without touching the filesystem
    ///
    /// # Errors
    /// Returns [`ScopeError::Validation`] for empty paths and paths that
    /// escape the root
    pub fn resolve(&self, path: &str) -> ScopeResult<PathBuf> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(ScopeError::validation("prdFilePath must not be empty"));
        }

        let requested = Path::new(trimmed);
        let relative = if requested.is_absolute() {
            requested
                .strip_prefix(&self.root)
                .map_err(|_| ScopeError::validation(format!("{trimmed} is outside the document root")))?
        } else {
            requested
        };

        let mut resolved = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(ScopeError::validation(format!(
                            "{trimmed} is outside the document root"
                        )));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ScopeError::validation(format!("{trimmed} is not a relative path")));
                }
            }
        }
        if resolved.as_os_str().is_empty() {
            return Err(ScopeError::validation(format!("{trimmed} does not name a file")));
        }
        Ok(self.root.join(resolved))
    }
}

#[async_trait]
impl DocumentLoader for FsDocumentLoader {
    async fn load(&self, path: &str) -> ScopeResult<LoadedDocument> {
        let full = self.resolve(path)?;
        let bytes = tokio::fs::read(&full).await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ScopeError::not_found("document", path.trim())
            } else {
                ScopeError::Document { path: full.clone(), source }
            }
        })?;
        let content = String::from_utf8(bytes)
            .map_err(|_| ScopeError::validation(format!("{} is not valid UTF-8 text", path.trim())))?;

        let name = full
            .file_name()
            .map_or_else(|| path.trim().to_string(), |n| n.to_string_lossy().into_owned());
        tracing::debug!(path = %full.display(), bytes = content.len(), "loaded document");
        Ok(LoadedDocument { name, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/prd.md"), "# PRD\n").unwrap();

        let loader = FsDocumentLoader::new(dir.path());
        let doc = loader.load("docs/./prd.md").await.unwrap();
        assert_eq!(doc.name, "prd.md");
        assert_eq!(doc.content, "# PRD\n");

        let absolute = dir.path().join("docs/prd.md");
        assert!(loader.load(&absolute.to_string_lossy()).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_escapes_and_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsDocumentLoader::new(dir.path());

        assert_eq!(loader.load("../secret.md").await.unwrap_err().status_code(), 400);
        assert_eq!(loader.load("docs/../../x.md").await.unwrap_err().status_code(), 400);
        assert_eq!(loader.load("   ").await.unwrap_err().status_code(), 400);

        let missing = loader.load("absent.md").await.unwrap_err();
        assert!(matches!(missing, ScopeError::NotFound { kind: "document", .. }));
    }

    #[tokio::test]
    async fn rejects_binary_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.md"), [0xff, 0xfe, 0x00]).unwrap();
        let loader = FsDocumentLoader::new(dir.path());
        assert_eq!(loader.load("blob.md").await.unwrap_err().status_code(), 400);
    }
}
