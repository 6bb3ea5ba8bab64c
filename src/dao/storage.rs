use std::{error::Error, path::Path};
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by the on-disk config and credential stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The file exists but could not be read.
    #[error("failed to read `{path}`")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The file or its directory could not be written.
    #[error("failed to write `{path}`")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The file was read but its contents could not be parsed.
    #[error("malformed contents in `{path}`")]
    Malformed {
        path: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        StorageError::Read {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn write(path: &Path, source: std::io::Error) -> Self {
        StorageError::Write {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Malformed {
            path: path.display().to_string(),
            source: Box::new(source),
        }
    }
}

/// Create the parent directory of `path` when it does not exist yet.
pub(crate) async fn ensure_parent(path: &Path) -> StorageResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StorageError::write(parent, source)),
        _ => Ok(()),
    }
}
