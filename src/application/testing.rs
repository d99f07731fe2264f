//! In-memory fakes for the collaborator traits, shared by unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::application::errors::{BotError, CloudError, RenderError, StorageError};
use crate::domain::entities::{ContentRef, DeviceToken, RemoteItem, SessionCredential};
use crate::domain::traits::{
    Bot, BotInfo, CloudClient, CloudConnector, CredentialStore, DownloadedContent, PageLayout, PdfRenderer,
};

pub const BOT_USER: &str = "@bot:example.org";

#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub name: String,
    pub id: Uuid,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct CloudState {
    fail_register: bool,
    fail_connect: bool,
    fail_list: bool,
    fail_uploads: bool,
    register_calls: usize,
    connect_calls: usize,
    list_calls: usize,
    upload_attempts: usize,
    last_connected: Option<DeviceToken>,
    items: Vec<RemoteItem>,
    uploads: Vec<UploadRecord>,
}

/// Cloud connector and client in one, sharing recorded calls
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut CloudState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn fail_register(&self, fail: bool) {
        self.with_state(|s| s.fail_register = fail);
    }

    pub fn fail_connect(&self, fail: bool) {
        self.with_state(|s| s.fail_connect = fail);
    }

    pub fn fail_list(&self, fail: bool) {
        self.with_state(|s| s.fail_list = fail);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.with_state(|s| s.fail_uploads = fail);
    }

    pub fn add_item(&self, item: RemoteItem) {
        self.with_state(|s| s.items.push(item));
    }

    pub fn register_calls(&self) -> usize {
        self.with_state(|s| s.register_calls)
    }

    pub fn connect_calls(&self) -> usize {
        self.with_state(|s| s.connect_calls)
    }

    pub fn list_calls(&self) -> usize {
        self.with_state(|s| s.list_calls)
    }

    pub fn upload_attempts(&self) -> usize {
        self.with_state(|s| s.upload_attempts)
    }

    pub fn last_connected_token(&self) -> Option<DeviceToken> {
        self.with_state(|s| s.last_connected.clone())
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.with_state(|s| s.uploads.clone())
    }
}

#[async_trait]
impl CloudConnector for FakeCloud {
    async fn register(&self, code: &str) -> Result<DeviceToken, CloudError> {
        self.with_state(|s| {
            s.register_calls += 1;
            if s.fail_register {
                return Err(CloudError::Api { status: 400, message: "invalid code".to_string() });
            }
            Ok(DeviceToken::new(format!("device-{}", code)))
        })
    }

    async fn connect(&self, token: &DeviceToken) -> Result<Arc<dyn CloudClient>, CloudError> {
        self.with_state(|s| {
            s.connect_calls += 1;
            if s.fail_connect {
                return Err(CloudError::Auth("token revoked".to_string()));
            }
            s.last_connected = Some(token.clone());
            Ok(())
        })?;
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl CloudClient for FakeCloud {
    async fn list_items(&self) -> Result<Vec<RemoteItem>, CloudError> {
        self.with_state(|s| {
            s.list_calls += 1;
            if s.fail_list {
                return Err(CloudError::Network("connection reset".to_string()));
            }
            Ok(s.items.clone())
        })
    }

    async fn upload_pdf(&self, name: &str, id: Uuid, data: Vec<u8>) -> Result<(), CloudError> {
        self.with_state(|s| {
            s.upload_attempts += 1;
            if s.fail_uploads {
                return Err(CloudError::Api { status: 500, message: "upload rejected".to_string() });
            }
            s.uploads.push(UploadRecord { name: name.to_string(), id, data });
            Ok(())
        })
    }
}

#[derive(Default)]
struct GateState {
    gate_register: AtomicBool,
    entered: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    release: Notify,
}

/// Cloud whose uploads (and optionally registrations) block until released
#[derive(Clone, Default)]
pub struct GatedCloud {
    state: Arc<GateState>,
}

impl GatedCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate_register(&self, gate: bool) {
        self.state.gate_register.store(gate, Ordering::SeqCst);
    }

    /// Calls that reached the gate so far
    pub fn entered(&self) -> usize {
        self.state.entered.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Let one blocked call through
    pub fn release(&self) {
        self.state.release.notify_one();
    }

    async fn pass(&self) {
        self.state.entered.fetch_add(1, Ordering::SeqCst);
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.state.release.notified().await;
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CloudConnector for GatedCloud {
    async fn register(&self, code: &str) -> Result<DeviceToken, CloudError> {
        if self.state.gate_register.load(Ordering::SeqCst) {
            self.pass().await;
        }
        Ok(DeviceToken::new(format!("device-{}", code)))
    }

    async fn connect(&self, _token: &DeviceToken) -> Result<Arc<dyn CloudClient>, CloudError> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl CloudClient for GatedCloud {
    async fn list_items(&self) -> Result<Vec<RemoteItem>, CloudError> {
        Ok(Vec::new())
    }

    async fn upload_pdf(&self, _name: &str, _id: Uuid, _data: Vec<u8>) -> Result<(), CloudError> {
        self.pass().await;
        Ok(())
    }
}

/// Credential store kept in memory
#[derive(Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<SessionCredential>>,
    fail_saves: Mutex<bool>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credential: SessionCredential) -> Self {
        let store = Self::default();
        *store.credential.lock().unwrap() = Some(credential);
        store
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    pub fn current(&self) -> Option<SessionCredential> {
        self.credential.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<SessionCredential>, StorageError> {
        Ok(self.current())
    }

    async fn save(&self, credential: &SessionCredential) -> Result<(), StorageError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only data path",
            )));
        }
        *self.credential.lock().unwrap() = Some(credential.clone());
        Ok(())
    }
}

/// Sent message as seen by the fake transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Notice { room_id: String, text: String },
    Text { room_id: String, text: String },
}

impl Sent {
    pub fn text(&self) -> &str {
        match self {
            Sent::Notice { text, .. } | Sent::Text { text, .. } => text,
        }
    }
}

#[derive(Default)]
struct BotState {
    sent: Vec<Sent>,
    downloads: Vec<ContentRef>,
    content: Option<DownloadedContent>,
    fail_downloads: bool,
}

/// Chat transport that records everything it is asked to do
#[derive(Clone, Default)]
pub struct FakeBot {
    state: Arc<Mutex<BotState>>,
}

impl FakeBot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content returned by every download
    pub fn serve(&self, data: &[u8], content_type: Option<&str>) {
        self.state.lock().unwrap().content = Some(DownloadedContent {
            data: data.to_vec(),
            content_type: content_type.map(|c| c.to_string()),
        });
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.state.lock().unwrap().fail_downloads = fail;
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().iter().map(|s| s.text().to_string()).collect()
    }

    pub fn downloads(&self) -> Vec<ContentRef> {
        self.state.lock().unwrap().downloads.clone()
    }
}

#[async_trait]
impl Bot for FakeBot {
    async fn start(&mut self) -> Result<(), BotError> {
        Ok(())
    }

    async fn send_notice(&self, room_id: &str, text: &str) -> Result<String, BotError> {
        self.state.lock().unwrap().sent.push(Sent::Notice {
            room_id: room_id.to_string(),
            text: text.to_string(),
        });
        Ok("$notice".to_string())
    }

    async fn send_text(&self, room_id: &str, text: &str) -> Result<String, BotError> {
        self.state.lock().unwrap().sent.push(Sent::Text {
            room_id: room_id.to_string(),
            text: text.to_string(),
        });
        Ok("$text".to_string())
    }

    async fn download(&self, content: &ContentRef) -> Result<DownloadedContent, BotError> {
        let mut state = self.state.lock().unwrap();
        state.downloads.push(content.clone());
        if state.fail_downloads {
            return Err(BotError::Network("media repository unavailable".to_string()));
        }
        state.content.clone().ok_or_else(|| BotError::NotFound(content.to_string()))
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo {
            user_id: BOT_USER.to_string(),
        }
    }
}

/// Renderer returning canned bytes
#[derive(Clone, Default)]
pub struct FakeRenderer {
    calls: Arc<Mutex<Vec<(String, PageLayout)>>>,
    fail: Arc<Mutex<bool>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<(String, PageLayout)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfRenderer for FakeRenderer {
    async fn render(&self, url: &url::Url, layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
        self.calls.lock().unwrap().push((url.to_string(), *layout));
        if *self.fail.lock().unwrap() {
            return Err(RenderError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string()));
        }
        Ok(format!("%PDF-1.7 {}", url).into_bytes())
    }
}
