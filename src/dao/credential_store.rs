//! Persistence of the long-lived refresh credential.

use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;

use crate::dao::storage::{StorageError, StorageResult, ensure_parent};

/// Load/save/delete access to the persisted refresh token.
pub trait CredentialStore: Send + Sync {
    /// Return the persisted refresh token, or `None` when none was saved.
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Replace the persisted refresh token.
    fn save(&self, refresh_token: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove the persisted token. Deleting a missing token succeeds.
    fn delete(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Plain-text file backed [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: Arc<PathBuf>,
}

impl FileCredentialStore {
    /// Store backed by the file at `path`; the file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let path = self.path.clone();
        Box::pin(async move {
            match tokio::fs::read_to_string(path.as_path()).await {
                Ok(contents) => {
                    let token = contents.trim();
                    Ok((!token.is_empty()).then(|| token.to_string()))
                }
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                Err(err) => Err(StorageError::read(&path, err)),
            }
        })
    }

    fn save(&self, refresh_token: String) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            ensure_parent(&path).await?;
            tokio::fs::write(path.as_path(), refresh_token.trim())
                .await
                .map_err(|source| StorageError::write(&path, source))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o600);
                let _ = tokio::fs::set_permissions(path.as_path(), perms).await;
            }

            Ok(())
        })
    }

    fn delete(&self) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            match tokio::fs::remove_file(path.as_path()).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(StorageError::write(&path, err)),
            }
        })
    }
}
