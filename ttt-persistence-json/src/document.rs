use std::{
    io::ErrorKind,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use log::{debug, error};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::{Mutex, MutexGuard};
use ttt_server_domain::{ServiceError, ServiceResult, mirror::ArcDocumentMirror};

/// One JSON file holding every entity of a kind. Each operation reloads the
/// whole document and rewrites it in full.
pub struct JsonDocument<T> {
    name: String,
    path: PathBuf,
    write_lock: Mutex<()>,
    mirror: ArcDocumentMirror,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(data_dir: &Path, name: &str, mirror: ArcDocumentMirror) -> Self {
        Self {
            name: name.to_string(),
            path: data_dir.join(name),
            write_lock: Mutex::new(()),
            mirror,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Held across a load/store pair so read-modify-write cycles don't interleave.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub async fn load(&self) -> ServiceResult<T> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist yet, starting empty", self.path.display());
                return Ok(T::default());
            }
            Err(e) => {
                error!("Failed to read {}: {}", self.path.display(), e);
                return ServiceError::internal(format!("Failed to read {}", self.name));
            }
        };
        if contents.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&contents).map_err(|e| {
            error!("Failed to parse {}: {}", self.path.display(), e);
            ServiceError::Internal(format!("Failed to parse {}", self.name))
        })
    }

    pub async fn store(&self, document: &T) -> ServiceResult<()> {
        let contents = serde_json::to_string_pretty(document)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &contents)
            .await
            .map_err(|e| self.write_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.write_error(e))?;
        self.mirror.enqueue(&self.name, contents);
        Ok(())
    }

    fn write_error(&self, e: std::io::Error) -> ServiceError {
        error!("Failed to write {}: {}", self.path.display(), e);
        ServiceError::Internal(format!("Failed to write {}", self.name))
    }
}
