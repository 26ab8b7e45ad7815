//! File storage used for task images and reception documents

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::{Mutex, RwLock};

use autoshop_rust_drive::{file_id_from_url, public_url, DriveClient};

use crate::error::{Error, Result};

/// A file to upload
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        }
    }
}

/// Remote file storage returning publicly viewable URLs
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Upload into `folder` (a `/`-separated path, created on demand) and
    /// return the file's public URL
    async fn upload(&self, file: &Upload, folder: &str) -> Result<String>;

    /// Delete by URL or raw id
    async fn delete(&self, url: &str) -> Result<()>;
}

/// [`FileStore`] on Google Drive
#[derive(Clone)]
pub struct DriveFiles {
    client: DriveClient,
    root_folder: Option<String>,
    // serialises folder creation so two uploads never create twin folders
    folders: Arc<Mutex<()>>,
}

impl DriveFiles {
    pub fn new(client: DriveClient, root_folder: Option<&str>) -> Self {
        Self {
            client,
            root_folder: root_folder.map(|f| f.to_string()),
            folders: Arc::new(Mutex::new(())),
        }
    }

    async fn resolve_folder(&self, path: &str) -> Result<Option<String>> {
        let _guard = self.folders.lock().await;
        let mut parent: Option<String> = None;
        let segments = self
            .root_folder
            .iter()
            .map(String::as_str)
            .chain(path.split('/'))
            .map(str::trim)
            .filter(|s| !s.is_empty());

        for name in segments {
            let id = self
                .client
                .find_or_create_folder(name, parent.as_deref())
                .await?;
            parent = Some(id);
        }
        Ok(parent)
    }
}

#[async_trait]
impl FileStore for DriveFiles {
    async fn upload(&self, file: &Upload, folder: &str) -> Result<String> {
        let folder_id = self.resolve_folder(folder).await?;
        let uploaded = self
            .client
            .upload(file.bytes.clone(), &file.name, &file.mime_type, folder_id.as_deref())
            .await?;
        Ok(public_url(&uploaded.id))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        self.client.delete(url).await?;
        Ok(())
    }
}

/// In-memory [`FileStore`]; names listed in `fail_names` are rejected
#[derive(Clone, Default)]
pub struct MemoryFiles {
    files: Arc<RwLock<HashMap<String, (String, Upload)>>>,
    fail_names: Arc<RwLock<Vec<String>>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make uploads of `name` fail
    pub async fn fail_on(&self, name: &str) {
        self.fail_names.write().await.push(name.to_string());
    }

    /// Stored files as `(folder, upload)`, keyed by id
    pub async fn files(&self) -> HashMap<String, (String, Upload)> {
        self.files.read().await.clone()
    }
}

#[async_trait]
impl FileStore for MemoryFiles {
    async fn upload(&self, file: &Upload, folder: &str) -> Result<String> {
        if self.fail_names.read().await.contains(&file.name) {
            return Err(Error::Unavailable(format!("upload of {} rejected", file.name)));
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        debug!("Stored {} in {} as {}", file.name, folder, id);
        self.files
            .write()
            .await
            .insert(id.clone(), (folder.to_string(), file.clone()));
        Ok(public_url(&id))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let id = file_id_from_url(url).unwrap_or_else(|| url.to_string());
        match self.files.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("file {}", id))),
        }
    }
}
