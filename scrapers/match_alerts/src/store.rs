use serde::{de::DeserializeOwned, Serialize};
use std::{
    io::ErrorKind,
    marker::PhantomData,
    path::{Path, PathBuf},
};
use tokio::fs;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A whole-file JSON snapshot: read once at startup, rewritten after each change.
#[derive(Debug)]
pub struct JsonSnapshot<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonSnapshot<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when the file does not exist yet.
    pub async fn load(&self) -> Result<Option<T>, PersistError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| PersistError::Json {
                path: self.path.clone(),
                source,
            })
    }

    /// Writes to a sibling temp file, then renames it over the snapshot.
    pub async fn flush(&self, value: &T) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| PersistError::Json {
            path: self.path.clone(),
            source,
        })?;
        let io_err = |source| PersistError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}
