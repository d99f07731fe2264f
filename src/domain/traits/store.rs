use async_trait::async_trait;
use crate::application::errors::StorageError;
use crate::domain::entities::SessionCredential;

/// CredentialStore trait - persistence of the cloud session credential
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the stored credential; `Ok(None)` when nothing was ever saved
    async fn load(&self) -> Result<Option<SessionCredential>, StorageError>;

    /// Replace the stored credential
    async fn save(&self, credential: &SessionCredential) -> Result<(), StorageError>;
}
