//! Typed JSON files

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::MaintainerError;

/// A JSON document of type `T` stored at a fixed path
#[derive(Debug)]
pub struct JsonFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonFile<T> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

impl<T> JsonFile<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }
}

impl<T: DeserializeOwned> JsonFile<T> {
    pub async fn read(&self) -> Result<T, MaintainerError> {
        let contents = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl<T: DeserializeOwned + Default> JsonFile<T> {
    /// Read the document, or `T::default()` when the file does not exist
    pub async fn read_or_default(&self) -> Result<T, MaintainerError> {
        if !self.exists().await {
            return Ok(T::default());
        }
        self.read().await
    }
}

impl<T: Serialize> JsonFile<T> {
    /// Write through a temporary file and rename it over the target
    pub async fn write(&self, value: &T) -> Result<(), MaintainerError> {
        let contents = serde_json::to_vec_pretty(value)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
