//! Flat-file JSON tables, one document per logical table.
//!
//! Every table is read whole, mutated in memory and written back whole.
//! `Table::update` holds a per-table lock across that cycle so concurrent
//! handlers cannot clobber each other's writes.

use std::{
    io::ErrorKind,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::{AfkTable, GuildTable, LinkedAccountTable, PointsTable, Session, VoicePrefTable};

/// Store operation errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load a JSON document, treating a missing or blank file as empty
pub async fn load<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if contents.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a JSON document by replacing the file atomically
pub async fn save<T>(path: &Path, document: &T) -> Result<(), StoreError>
where
    T: Serialize,
{
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, json).await.map_err(io_error)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_error)?;

    Ok(())
}

/// Load a document, logging and substituting the default on any error
pub async fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match load(path).await {
        Ok(document) => document,
        Err(e) => {
            warn!("Falling back to an empty document: {}", e);
            T::default()
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A single JSON file guarded by its own lock
pub struct Table<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _document: PhantomData<fn() -> T>,
}

impl<T> Table<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _document: PhantomData,
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current document (empty on any load failure)
    pub async fn read(&self) -> T {
        let _guard = self.lock.lock().await;
        load_or_default(&self.path).await
    }

    /// Load, mutate and save the document while holding the table lock.
    ///
    /// A malformed file is reported instead of being overwritten with an
    /// empty document.
    pub async fn update<R, F>(&self, mutate: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.lock.lock().await;
        let mut document = load(&self.path).await?;
        let result = mutate(&mut document);
        save(&self.path, &document).await?;
        Ok(result)
    }

    /// Overwrite the whole document
    pub async fn replace(&self, document: &T) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        save(&self.path, document).await
    }
}

/// All tables used by the bot, rooted at one data directory
pub struct Store {
    pub afk: Table<AfkTable>,
    pub usernames: Table<LinkedAccountTable>,
    pub guilds: Table<GuildTable>,
    pub sessions: Table<Vec<Session>>,
    pub points: Table<PointsTable>,
    pub voice_prefs: Table<VoicePrefTable>,
}

impl Store {
    /// Open (and create if needed) the data directory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        info!("Using data directory {}", dir.display());

        Ok(Self {
            afk: Table::new(dir.join("afk.json")),
            usernames: Table::new(dir.join("username.json")),
            guilds: Table::new(dir.join("guild.json")),
            sessions: Table::new(dir.join("sessions.json")),
            points: Table::new(dir.join("venity.json")),
            voice_prefs: Table::new(dir.join("tempvoice.json")),
        })
    }
}
