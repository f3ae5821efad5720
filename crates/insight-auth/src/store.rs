//! Persistent storage for the borrowed session tokens
//!
//! Two keys are kept: `activeToken` (serialized token object) and
//! `refreshToken` (plain string). Writes replace both keys at once and the
//! last write wins; there is no versioning. The store has no expiry of its
//! own, the manager decides validity from the JWT.
//!
//! `FileTokenStore` persists to a JSON file with atomic temp-file + rename.
//! `MemoryTokenStore` keeps everything in process and backs tests.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Snapshot of both keys, read in one call.
#[derive(Debug, Clone, Default)]
pub struct StoredTokens {
    /// Serialized `ActiveToken`; not validated at this layer
    pub active_token: Option<String>,
    pub refresh_token: Option<Secret<String>>,
}

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Key-value persistence for the token pair.
///
/// Uses `Pin<Box<dyn Future>>` return types so it can be shared as
/// `Arc<dyn TokenStore>`.
pub trait TokenStore: Send + Sync {
    /// Read both keys.
    fn get(&self) -> StoreFuture<'_, StoredTokens>;

    /// Overwrite both keys together.
    fn set(&self, active_token: String, refresh_token: Secret<String>) -> StoreFuture<'_, ()>;

    /// Remove both keys.
    fn clear(&self) -> StoreFuture<'_, ()>;
}

/// In-process store. State is lost on drop.
#[derive(Default)]
pub struct MemoryTokenStore {
    state: Mutex<StoredTokens>,
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> StoreFuture<'_, StoredTokens> {
        Box::pin(async move { Ok(self.state.lock().await.clone()) })
    }

    fn set(&self, active_token: String, refresh_token: Secret<String>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            *self.state.lock().await = StoredTokens {
                active_token: Some(active_token),
                refresh_token: Some(refresh_token),
            };
            Ok(())
        })
    }

    fn clear(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            *self.state.lock().await = StoredTokens::default();
            Ok(())
        })
    }
}

/// On-disk layout, keyed like the browser's storage.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(rename = "activeToken", default, skip_serializing_if = "Option::is_none")]
    active_token: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl From<&StoredTokens> for TokenFile {
    fn from(tokens: &StoredTokens) -> Self {
        Self {
            active_token: tokens.active_token.clone(),
            refresh_token: tokens.refresh_token.as_ref().map(|r| r.expose().clone()),
        }
    }
}

impl From<TokenFile> for StoredTokens {
    fn from(file: TokenFile) -> Self {
        Self {
            active_token: file.active_token,
            refresh_token: file.refresh_token.map(Secret::new),
        }
    }
}

/// JSON file store.
///
/// The Mutex serializes writers inside this process; reads return a clone of
/// the in-memory copy so they never touch the disk.
pub struct FileTokenStore {
    path: PathBuf,
    state: Mutex<StoredTokens>,
}

impl FileTokenStore {
    /// Load tokens from `path`, creating an empty file on cold start.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Store(format!("reading token file: {e}")))?;
            let file: TokenFile = serde_json::from_str(&contents)
                .map_err(|e| Error::Store(format!("parsing token file: {e}")))?;
            info!(
                path = %path.display(),
                has_active = file.active_token.is_some(),
                has_refresh = file.refresh_token.is_some(),
                "loaded token file"
            );
            StoredTokens::from(file)
        } else {
            info!(path = %path.display(), "token file not found, starting empty");
            let empty = StoredTokens::default();
            write_atomic(&path, &empty).await?;
            empty
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> StoreFuture<'_, StoredTokens> {
        Box::pin(async move { Ok(self.state.lock().await.clone()) })
    }

    fn set(&self, active_token: String, refresh_token: Secret<String>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let next = StoredTokens {
                active_token: Some(active_token),
                refresh_token: Some(refresh_token),
            };
            write_atomic(&self.path, &next).await?;
            *state = next;
            debug!("stored token pair");
            Ok(())
        })
    }

    fn clear(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let next = StoredTokens::default();
            write_atomic(&self.path, &next).await?;
            *state = next;
            debug!("cleared token pair");
            Ok(())
        })
    }
}

/// Write the token file atomically with 0600 permissions.
async fn write_atomic(path: &Path, tokens: &StoredTokens) -> Result<()> {
    let json = serde_json::to_string_pretty(&TokenFile::from(tokens))
        .map_err(|e| Error::Store(format!("serializing tokens: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Store("token path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Store(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Store(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Store(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted tokens");
    Ok(())
}
