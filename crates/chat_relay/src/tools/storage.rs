use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Persists generated documents and tells where clients can fetch them
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `contents` under `filename` and return its public location
    async fn save(&self, filename: &str, contents: Vec<u8>) -> Result<String>;
}

/// Documents in a local directory, served by the relay's download route
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
    public_url: String,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Path of a stored document. Only plain file names are accepted, so
    /// nothing outside the storage directory can be addressed.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if !filename.contains('\\') => {
                Some(self.root.join(name))
            }
            _ => None,
        }
    }

    pub fn download_url(&self, filename: &str) -> String {
        format!("{}/download/{}", self.public_url, filename)
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn save(&self, filename: &str, contents: Vec<u8>) -> Result<String> {
        let Some(path) = self.resolve(filename) else {
            bail!("Invalid document name: {}", filename);
        };
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create {}", self.root.display()))?;
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved document {}", path.display());
        Ok(self.download_url(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_traversal() {
        let store = LocalDocumentStore::new("/srv/docs", "http://localhost:8000/");
        assert_eq!(
            store.resolve("quote.json"),
            Some(PathBuf::from("/srv/docs/quote.json"))
        );
        assert_eq!(store.resolve("../secret"), None);
        assert_eq!(store.resolve("a/b.json"), None);
        assert_eq!(store.resolve("/etc/passwd"), None);
        assert_eq!(store.resolve(".."), None);
        assert_eq!(store.resolve(""), None);
        assert_eq!(store.resolve("..\\x"), None);
    }

    #[tokio::test]
    async fn test_save_writes_file_and_returns_download_url() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalDocumentStore::new(dir.path().join("docs"), "http://localhost:8000/");

        let url = store.save("q1.json", b"{}".to_vec()).await?;
        assert_eq!(url, "http://localhost:8000/download/q1.json");
        assert_eq!(std::fs::read(dir.path().join("docs/q1.json"))?, b"{}");

        assert!(store.save("../q2.json", Vec::new()).await.is_err());
        Ok(())
    }
}
