//! Per-request scratch directories for uploaded documents.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use tempfile::TempDir;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

const WORKSPACE_PREFIX: &str = "pdfgen-";
const DEFAULT_STYLESHEET_NAME: &str = "default.css";
pub const DEFAULT_STYLESHEET: &str = "@page { size: A4; margin: 2cm 2.5cm; }";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create request workspace: {0}")]
    Create(#[source] std::io::Error),
    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("upload stream failed")]
    Stream {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A temporary directory holding one request's uploads, removed on drop.
#[derive(Debug)]
pub struct RequestWorkspace {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl RequestWorkspace {
    pub fn create() -> Result<Self, WorkspaceError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .map_err(WorkspaceError::Create)?;
        let path = dir.path().to_path_buf();
        debug!(
            target = "printgate::workspace",
            path = %path.display(),
            "Created request workspace"
        );
        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Choose where an upload lands: its final path component when usable,
    /// `fallback` otherwise. Clashing names get a numeric prefix.
    pub fn resolve(&self, original: Option<&str>, fallback: &str) -> PathBuf {
        let name = original
            .and_then(sanitize_file_name)
            .unwrap_or_else(|| fallback.to_string());

        let mut candidate = self.path.join(&name);
        let mut attempt = 1;
        while candidate.exists() {
            candidate = self.path.join(format!("{attempt}-{name}"));
            attempt += 1;
        }
        candidate
    }

    /// Stream an upload to `path`, returning the number of bytes written.
    pub async fn store_stream<S, E>(&self, path: &Path, stream: S) -> Result<u64, WorkspaceError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let write_error = |source: std::io::Error| WorkspaceError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut file = fs::File::create(path).await.map_err(write_error)?;
        let mut total_bytes: u64 = 0;

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| WorkspaceError::Stream {
                source: Box::new(err),
            })?;
            file.write_all(&chunk).await.map_err(write_error)?;
            total_bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(write_error)?;

        Ok(total_bytes)
    }

    /// Write the stylesheet used when a request supplies none.
    pub async fn write_default_stylesheet(&self) -> Result<PathBuf, WorkspaceError> {
        let path = self.resolve(None, DEFAULT_STYLESHEET_NAME);
        fs::write(&path, DEFAULT_STYLESHEET)
            .await
            .map_err(|source| WorkspaceError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(
                    target = "printgate::workspace",
                    path = %self.path.display(),
                    "Removed request workspace"
                ),
                Err(err) => warn!(
                    target = "printgate::workspace",
                    path = %self.path.display(),
                    error = %err,
                    "Failed to remove request workspace"
                ),
            }
        }
    }
}

/// Reduce a client-supplied file name to a single safe path component.
fn sanitize_file_name(original: &str) -> Option<String> {
    // Clients on Windows send backslash-separated paths.
    let normalized = original.replace('\\', "/");
    match Path::new(&normalized).components().next_back()? {
        Component::Normal(name) => {
            let name = name.to_str()?.trim();
            (!name.is_empty()).then(|| name.to_string())
        }
        _ => None,
    }
}
