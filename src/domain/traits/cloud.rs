use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::errors::CloudError;
use crate::domain::entities::{DeviceToken, RemoteItem};

/// Entry point to the cloud document store
#[async_trait]
pub trait CloudConnector: Send + Sync {
    /// Exchange a one-time pairing code for a durable device token
    async fn register(&self, code: &str) -> Result<DeviceToken, CloudError>;

    /// Refresh the session for a device token and return an authenticated client
    async fn connect(&self, token: &DeviceToken) -> Result<Arc<dyn CloudClient>, CloudError>;
}

/// Authenticated handle to the cloud document store
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn list_items(&self) -> Result<Vec<RemoteItem>, CloudError>;

    /// Store a PDF under `name` as a new item identified by `id`
    async fn upload_pdf(&self, name: &str, id: Uuid, data: Vec<u8>) -> Result<(), CloudError>;
}
