use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::warn;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access token store at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode token store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The two credentials the dashboard persists between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKey {
    Access,
    Refresh,
}

impl TokenKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenKey::Access => "token",
            TokenKey::Refresh => "refreshToken",
        }
    }
}

/// Key-value persistence for auth tokens. Only `SessionManager` talks to it.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: TokenKey) -> Option<String>;
    fn set(&mut self, key: TokenKey, value: &str) -> StoreResult<()>;
    fn clear(&mut self, key: TokenKey) -> StoreResult<()>;
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    entries: BTreeMap<TokenKey, String>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        let mut entries = BTreeMap::new();
        if let Some(access) = access {
            entries.insert(TokenKey::Access, access.to_string());
        }
        if let Some(refresh) = refresh {
            entries.insert(TokenKey::Refresh, refresh.to_string());
        }
        Self { entries }
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn get(&self, key: TokenKey) -> Option<String> {
        self.entries.get(&key).cloned()
    }

    fn set(&mut self, key: TokenKey, value: &str) -> StoreResult<()> {
        self.entries.insert(key, value.to_string());
        Ok(())
    }

    fn clear(&mut self, key: TokenKey) -> StoreResult<()> {
        self.entries.remove(&key);
        Ok(())
    }
}

/// Tokens kept in a small JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileTokenStore {
    /// Loads the store, starting empty when the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(?err, file = %path.display(), "token store is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(?err, file = %path.display(), "failed to read token store, starting empty");
                BTreeMap::new()
            }
        };

        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let encoded = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, encoded).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: TokenKey) -> Option<String> {
        self.entries.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: TokenKey, value: &str) -> StoreResult<()> {
        self.entries
            .insert(key.as_str().to_string(), value.to_string());
        self.persist()
    }

    fn clear(&mut self, key: TokenKey) -> StoreResult<()> {
        if self.entries.remove(key.as_str()).is_none() {
            return Ok(());
        }
        self.persist()
    }
}
