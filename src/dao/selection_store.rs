//! Persistence of the selected region/event, so a restart comes back on the same event.

use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;

use crate::dao::{
    models::EventSelection,
    storage::{StorageError, StorageResult, ensure_parent},
};

/// Key-value persistence of the current [`EventSelection`].
pub trait SelectionStore: Send + Sync {
    /// Load the persisted selection, falling back to defaults when nothing was saved.
    fn load(&self) -> BoxFuture<'static, StorageResult<EventSelection>>;
    /// Overwrite the persisted selection.
    fn save(&self, selection: EventSelection) -> BoxFuture<'static, StorageResult<()>>;
}

/// JSON file backed [`SelectionStore`].
#[derive(Debug, Clone)]
pub struct FileSelectionStore {
    path: Arc<PathBuf>,
}

impl FileSelectionStore {
    /// Store backed by the JSON file at `path`; the file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }
}

impl SelectionStore for FileSelectionStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<EventSelection>> {
        let path = self.path.clone();
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(path.as_path()).await {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Ok(EventSelection::default());
                }
                Err(err) => return Err(StorageError::read(&path, err)),
            };

            serde_json::from_str(&contents).map_err(|source| StorageError::malformed(&path, source))
        })
    }

    fn save(&self, selection: EventSelection) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            let payload = serde_json::to_string_pretty(&selection)
                .map_err(|source| StorageError::malformed(&path, source))?;
            ensure_parent(&path).await?;
            tokio::fs::write(path.as_path(), payload)
                .await
                .map_err(|source| StorageError::write(&path, source))
        })
    }
}
