//! Cloud session manager - registration and authenticated session lifecycle

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::application::errors::CloudError;
use crate::domain::entities::{RemoteItem, SessionCredential};
use crate::domain::traits::{CloudClient, CloudConnector, CredentialStore};

/// Session state, only reachable through the manager
#[derive(Clone)]
enum SessionState {
    Unregistered,
    Registered { client: Arc<dyn CloudClient> },
}

/// Owns the authenticated cloud client and the persisted credential
pub struct CloudSessionManager {
    connector: Arc<dyn CloudConnector>,
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    // Single-flight guards for the one session of this deployment
    register_lock: Mutex<()>,
    upload_lock: Mutex<()>,
}

impl CloudSessionManager {
    pub fn new(connector: Arc<dyn CloudConnector>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            connector,
            store,
            state: RwLock::new(SessionState::Unregistered),
            register_lock: Mutex::new(()),
            upload_lock: Mutex::new(()),
        }
    }

    /// Try to resume the session from the stored credential.
    ///
    /// Never fails: a missing, unreadable or rejected credential leaves the
    /// manager unregistered and is only logged.
    pub async fn load(&self) {
        let credential = match self.store.load().await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                tracing::info!("No reMarkable credential found, starting unregistered");
                self.set_state(SessionState::Unregistered).await;
                return;
            }
            Err(e) => {
                tracing::error!("Failed to read reMarkable credential: {}", e);
                self.set_state(SessionState::Unregistered).await;
                return;
            }
        };

        match self.connector.connect(&credential.device_token).await {
            Ok(client) => {
                tracing::info!("Resumed reMarkable session");
                self.set_state(SessionState::Registered { client }).await;
            }
            Err(e) => {
                tracing::error!("Error refreshing reMarkable token: {}", e);
                self.set_state(SessionState::Unregistered).await;
            }
        }
    }

    pub async fn is_registered(&self) -> bool {
        matches!(*self.state.read().await, SessionState::Registered { .. })
    }

    /// Exchange a pairing code for a credential and switch to the new session.
    ///
    /// The credential is written as soon as the exchange succeeds, since the
    /// pairing code cannot be used twice. A failed write is logged only; the
    /// session stays usable until restart. A failed exchange or refresh leaves
    /// the previous state untouched.
    pub async fn register(&self, code: &str) -> Result<(), CloudError> {
        let _guard = self.register_lock.lock().await;

        let token = self.connector.register(code).await?;
        tracing::info!("Registered new reMarkable device: {:?}", token);

        let credential = SessionCredential::new(token);
        if let Err(e) = self.store.save(&credential).await {
            tracing::error!("Error saving reMarkable credential, registration will not survive a restart: {}", e);
        }

        let client = self.connector.connect(&credential.device_token).await?;
        self.set_state(SessionState::Registered { client }).await;

        Ok(())
    }

    pub async fn list_items(&self) -> Result<Vec<RemoteItem>, CloudError> {
        let client = self.client().await?;
        client.list_items().await
    }

    /// Upload a PDF as a new item and return the stored display name
    pub async fn upload_document(&self, name: &str, data: Vec<u8>) -> Result<String, CloudError> {
        let client = self.client().await?;
        let name = strip_pdf_suffix(name).to_string();
        let id = Uuid::new_v4();

        let _guard = self.upload_lock.lock().await;
        tracing::info!("Uploading '{}' ({} bytes) as {}", name, data.len(), id);
        client.upload_pdf(&name, id, data).await?;

        Ok(name)
    }

    /// Snapshot of the current client; callers never see the state itself
    async fn client(&self) -> Result<Arc<dyn CloudClient>, CloudError> {
        match &*self.state.read().await {
            SessionState::Registered { client } => Ok(Arc::clone(client)),
            SessionState::Unregistered => Err(CloudError::NotRegistered),
        }
    }

    async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
    }
}

/// Drop one trailing ".pdf" from a display name
pub fn strip_pdf_suffix(name: &str) -> &str {
    name.strip_suffix(".pdf").unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{FakeCloud, GatedCloud, MemoryCredentialStore};
    use crate::domain::entities::DeviceToken;
    use crate::infrastructure::storage::JsonCredentialStore;
    use std::time::Duration;

    fn manager(cloud: &Arc<FakeCloud>, store: Arc<dyn CredentialStore>) -> CloudSessionManager {
        CloudSessionManager::new(cloud.clone(), store)
    }

    #[test]
    fn test_strip_pdf_suffix() {
        assert_eq!(strip_pdf_suffix("report.pdf"), "report");
        assert_eq!(strip_pdf_suffix("report"), "report");
        assert_eq!(strip_pdf_suffix("report.pdf.pdf"), "report.pdf");
        assert_eq!(strip_pdf_suffix("my.pdf.notes"), "my.pdf.notes");
    }

    #[tokio::test]
    async fn test_starts_unregistered() {
        let cloud = Arc::new(FakeCloud::new());
        let manager = manager(&cloud, Arc::new(MemoryCredentialStore::new()));
        assert!(!manager.is_registered().await);

        manager.load().await;
        assert!(!manager.is_registered().await);
        assert_eq!(cloud.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_register_persists_and_promotes() {
        let cloud = Arc::new(FakeCloud::new());
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = manager(&cloud, store.clone());

        manager.register("abcdefgh").await.unwrap();

        assert!(manager.is_registered().await);
        let saved = store.current().expect("credential saved");
        assert_eq!(saved.device_token, DeviceToken::new("device-abcdefgh"));
    }

    #[tokio::test]
    async fn test_failed_register_keeps_previous_state() {
        let cloud = Arc::new(FakeCloud::new());
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = manager(&cloud, store.clone());

        cloud.fail_register(true);
        assert!(manager.register("bad").await.is_err());
        assert!(!manager.is_registered().await);
        assert!(store.current().is_none());

        cloud.fail_register(false);
        manager.register("good").await.unwrap();
        cloud.fail_register(true);
        assert!(manager.register("bad").await.is_err());
        assert!(manager.is_registered().await);
    }

    #[tokio::test]
    async fn test_register_survives_failed_persist() {
        let cloud = Arc::new(FakeCloud::new());
        let store = Arc::new(MemoryCredentialStore::new());
        store.fail_saves(true);
        let manager = manager(&cloud, store.clone());

        manager.register("abcdefgh").await.unwrap();
        assert!(manager.is_registered().await);
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_token_kept_when_refresh_after_register_fails() {
        let cloud = Arc::new(FakeCloud::new());
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = manager(&cloud, store.clone());

        cloud.fail_connect(true);
        assert!(manager.register("onetime").await.is_err());
        assert!(!manager.is_registered().await);
        assert_eq!(cloud.register_calls(), 1);
        assert_eq!(
            store.current().map(|c| c.device_token),
            Some(DeviceToken::new("device-onetime"))
        );

        // The saved device token resumes the session without a new pairing code
        cloud.fail_connect(false);
        manager.load().await;
        assert!(manager.is_registered().await);
        assert_eq!(cloud.register_calls(), 1);
    }

    #[tokio::test]
    async fn test_load_resumes_session() {
        let cloud = Arc::new(FakeCloud::new());
        let store = Arc::new(MemoryCredentialStore::with(SessionCredential::new(DeviceToken::new("device-x"))));
        let manager = manager(&cloud, store);

        manager.load().await;
        assert!(manager.is_registered().await);
        assert_eq!(cloud.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_reverts_to_unregistered() {
        let cloud = Arc::new(FakeCloud::new());
        let store = Arc::new(MemoryCredentialStore::with(SessionCredential::new(DeviceToken::new("device-x"))));
        let manager = manager(&cloud, store);

        manager.load().await;
        assert!(manager.is_registered().await);

        cloud.fail_connect(true);
        manager.load().await;
        assert!(!manager.is_registered().await);
    }

    #[tokio::test]
    async fn test_register_then_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = Arc::new(FakeCloud::new());

        let first = manager(&cloud, Arc::new(JsonCredentialStore::new(dir.path())));
        first.register("abcdefgh").await.unwrap();

        let second = manager(&cloud, Arc::new(JsonCredentialStore::new(dir.path())));
        assert!(!second.is_registered().await);
        second.load().await;
        assert!(second.is_registered().await);
        assert_eq!(cloud.last_connected_token(), Some(DeviceToken::new("device-abcdefgh")));
    }

    #[tokio::test]
    async fn test_operations_require_registration() {
        let cloud = Arc::new(FakeCloud::new());
        let manager = manager(&cloud, Arc::new(MemoryCredentialStore::new()));

        assert!(matches!(manager.list_items().await, Err(CloudError::NotRegistered)));
        assert!(matches!(
            manager.upload_document("a.pdf", vec![1]).await,
            Err(CloudError::NotRegistered)
        ));
        assert_eq!(cloud.list_calls(), 0);
        assert!(cloud.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_upload_names_and_ids() {
        let cloud = Arc::new(FakeCloud::new());
        let manager = manager(&cloud, Arc::new(MemoryCredentialStore::new()));
        manager.register("abcdefgh").await.unwrap();

        let first = manager.upload_document("report.pdf", b"%PDF-1.4".to_vec()).await.unwrap();
        let second = manager.upload_document("report", b"%PDF-1.4".to_vec()).await.unwrap();
        assert_eq!(first, "report");
        assert_eq!(second, "report");

        let uploads = cloud.uploads();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].name, "report");
        assert_eq!(uploads[1].name, "report");
        assert_ne!(uploads[0].id, uploads[1].id);
    }

    #[tokio::test]
    async fn test_upload_errors_are_not_retried() {
        let cloud = Arc::new(FakeCloud::new());
        let manager = manager(&cloud, Arc::new(MemoryCredentialStore::new()));
        manager.register("abcdefgh").await.unwrap();

        cloud.fail_uploads(true);
        assert!(manager.upload_document("a.pdf", vec![1]).await.is_err());
        assert_eq!(cloud.upload_attempts(), 1);
    }

    #[tokio::test]
    async fn test_list_items() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.add_item(RemoteItem::new("id-1", "Notes"));
        let manager = manager(&cloud, Arc::new(MemoryCredentialStore::new()));
        manager.register("abcdefgh").await.unwrap();

        let items = manager.list_items().await.unwrap();
        assert_eq!(items, vec![RemoteItem::new("id-1", "Notes")]);
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_concurrent_uploads_run_one_at_a_time() {
        let cloud = Arc::new(GatedCloud::new());
        let manager = Arc::new(CloudSessionManager::new(cloud.clone(), Arc::new(MemoryCredentialStore::new())));
        manager.register("abcdefgh").await.unwrap();

        let uploads: Vec<_> = ["first.pdf", "second.pdf"]
            .into_iter()
            .map(|name| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.upload_document(name, vec![1]).await })
            })
            .collect();

        wait_until(|| cloud.entered() == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cloud.entered(), 1, "second upload reached the cloud while the first was in flight");

        cloud.release();
        wait_until(|| cloud.entered() == 2).await;
        cloud.release();

        for upload in uploads {
            upload.await.unwrap().unwrap();
        }
        assert_eq!(cloud.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_registrations_run_one_at_a_time() {
        let cloud = Arc::new(GatedCloud::new());
        let manager = Arc::new(CloudSessionManager::new(cloud.clone(), Arc::new(MemoryCredentialStore::new())));
        cloud.gate_register(true);

        let registrations: Vec<_> = ["code-a", "code-b"]
            .into_iter()
            .map(|code| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.register(code).await })
            })
            .collect();

        wait_until(|| cloud.entered() == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cloud.entered(), 1, "second registration reached the cloud while the first was in flight");

        cloud.release();
        wait_until(|| cloud.entered() == 2).await;
        cloud.release();

        for registration in registrations {
            registration.await.unwrap().unwrap();
        }
        assert_eq!(cloud.max_in_flight(), 1);
        assert!(manager.is_registered().await);
    }
}
