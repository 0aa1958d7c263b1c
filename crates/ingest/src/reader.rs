use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::document::DocumentText;

const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("document not found: {0:?}")]
    NotFound(PathBuf),

    #[error("unsupported file format: {0:?}")]
    Unsupported(PathBuf),

    #[error("document {0:?} is not valid UTF-8")]
    Encoding(PathBuf),

    #[error("I/O error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    /// Interrupted or timed-out reads may succeed on another attempt;
    /// everything else fails the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            ReadError::Io { source, .. } => matches!(
                source.kind(),
                ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// The bytes were fetched but could not be turned into text.
    pub fn is_structural(&self) -> bool {
        matches!(self, ReadError::Unsupported(_) | ReadError::Encoding(_))
    }
}

/// Turns a document reference into text.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn read(&self, location: &Path) -> Result<DocumentText, ReadError>;
}

/// Reads plain-text and markdown documents from the local filesystem.
pub struct FileReader;

impl FileReader {
    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    pub async fn read_file(path: &Path) -> Result<DocumentText, ReadError> {
        if !Self::is_supported(path) {
            return Err(ReadError::Unsupported(path.to_path_buf()));
        }

        let bytes = fs::read(path).await.map_err(|source| match source.kind() {
            ErrorKind::NotFound => ReadError::NotFound(path.to_path_buf()),
            _ => ReadError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let text = String::from_utf8(bytes).map_err(|_| ReadError::Encoding(path.to_path_buf()))?;
        let document = DocumentText::new(text);
        debug!(path = ?path, pages = document.page_count, chars = document.char_len(), "read document");

        Ok(document)
    }

    /// Lists supported documents directly inside `dir`, sorted by path.
    pub async fn list_directory(dir: &Path) -> Result<Vec<PathBuf>, ReadError> {
        let mut entries = fs::read_dir(dir).await.map_err(|source| match source.kind() {
            ErrorKind::NotFound => ReadError::NotFound(dir.to_path_buf()),
            _ => ReadError::Io {
                path: dir.to_path_buf(),
                source,
            },
        })?;

        let mut files = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| ReadError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let Some(entry) = entry else { break };

            let path = entry.path();
            if path.is_file() && Self::is_supported(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl DocumentSource for FileReader {
    async fn read(&self, location: &Path) -> Result<DocumentText, ReadError> {
        Self::read_file(location).await
    }
}
