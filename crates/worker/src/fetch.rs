//! Source fetch strategies
//!
//! One consumer core, pluggable source retrieval: the job's
//! `source_reference` is either a filename in a shared upload directory or
//! a key in a remote blob store. The fetcher turns it into a local path the
//! loader can read.

use crate::errors::ProcessError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What happens to the fetched file once the job is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Worker-owned scratch copy, removed however the job ends
    Scratch,
    /// Shared upload, removed only after a successful run
    RemoveOnSuccess,
}

/// A source document materialized on local disk
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub path: PathBuf,
    pub retention: Retention,
}

/// Strategy for turning a source reference into a readable local file
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<FetchedDocument, ProcessError>;
}

/// Shared upload directory on local disk
pub struct LocalUploads {
    root: PathBuf,
}

impl LocalUploads {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceFetcher for LocalUploads {
    async fn fetch(&self, reference: &str) -> Result<FetchedDocument, ProcessError> {
        // References come from the front end, but the upload dir is shared
        // with it; never let a reference climb out of it.
        if reference.contains("..") {
            return Err(ProcessError::SourceUnavailable {
                reference: reference.to_string(),
                detail: "Reference must stay inside the upload directory".to_string(),
            });
        }

        let path = self.root.join(reference);
        debug!(path = %path.display(), "Resolving upload");

        if !path.is_file() {
            return Err(ProcessError::SourceUnavailable {
                reference: reference.to_string(),
                detail: format!("File not found at {}", path.display()),
            });
        }

        Ok(FetchedDocument {
            path,
            retention: Retention::RemoveOnSuccess,
        })
    }
}

/// Remote blob store reached over HTTP
pub struct RemoteBlobs {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    scratch_dir: PathBuf,
}

impl RemoteBlobs {
    pub fn new(base_url: String, token: Option<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            scratch_dir: scratch_dir.into(),
        }
    }

    fn scratch_path(&self, reference: &str) -> PathBuf {
        // Keep the original extension so the loader can dispatch on it
        let name = Path::new(reference)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "download".to_string());

        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        self.scratch_dir
            .join(format!("{}-{}-{}", std::process::id(), nanos, name))
    }
}

#[async_trait]
impl SourceFetcher for RemoteBlobs {
    async fn fetch(&self, reference: &str) -> Result<FetchedDocument, ProcessError> {
        let url = format!("{}/{}", self.base_url, reference);
        debug!(url = %url, "Downloading blob");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProcessError::SourceUnavailable {
                reference: reference.to_string(),
                detail: format!("Blob download failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(ProcessError::SourceUnavailable {
                reference: reference.to_string(),
                detail: format!("Blob store returned status {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProcessError::SourceUnavailable {
                reference: reference.to_string(),
                detail: format!("Blob body read failed: {}", e),
            })?;

        tokio::fs::create_dir_all(&self.scratch_dir).await.map_err(|e| {
            ProcessError::SourceUnavailable {
                reference: reference.to_string(),
                detail: format!("Could not prepare scratch dir: {}", e),
            }
        })?;

        let path = self.scratch_path(reference);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ProcessError::SourceUnavailable {
                reference: reference.to_string(),
                detail: format!("Could not write scratch file: {}", e),
            })?;

        info!(reference, bytes = bytes.len(), "Blob downloaded to scratch file");

        Ok(FetchedDocument {
            path,
            retention: Retention::Scratch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("studymill-fetch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_local_fetch_existing_file() {
        let root = scratch_root();
        std::fs::write(root.join("doc.txt"), "content").unwrap();

        let fetcher = LocalUploads::new(&root);
        let doc = fetcher.fetch("doc.txt").await.unwrap();
        assert_eq!(doc.retention, Retention::RemoveOnSuccess);
        assert!(doc.path.ends_with("doc.txt"));
    }

    #[tokio::test]
    async fn test_local_fetch_missing_file() {
        let fetcher = LocalUploads::new(scratch_root());
        let err = fetcher.fetch("missing.txt").await.unwrap_err();
        assert!(matches!(err, ProcessError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_local_fetch_rejects_traversal() {
        let fetcher = LocalUploads::new(scratch_root());
        let err = fetcher.fetch("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, ProcessError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_scratch_path_keeps_extension() {
        let fetcher = RemoteBlobs::new("https://blobs.example".into(), None, scratch_root());
        let path = fetcher.scratch_path("folder/report.pdf");
        assert!(path.to_string_lossy().ends_with("report.pdf"));
    }
}
