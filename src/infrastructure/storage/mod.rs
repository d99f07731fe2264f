//! File-based storage implementation

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::application::errors::StorageError;
use crate::domain::entities::SessionCredential;
use crate::domain::traits::CredentialStore;

/// File name of the credential inside the data directory
pub const CREDENTIAL_FILE: &str = "remarkable.json";

/// JSON file-based credential store
pub struct JsonCredentialStore {
    path: PathBuf,
}

impl JsonCredentialStore {
    pub fn new(data_path: impl AsRef<Path>) -> Self {
        Self {
            path: data_path.as_ref().join(CREDENTIAL_FILE),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    async fn load(&self) -> Result<Option<SessionCredential>, StorageError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn save(&self, credential: &SessionCredential) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string(credential)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
