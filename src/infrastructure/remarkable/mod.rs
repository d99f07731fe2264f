//! reMarkable cloud client
//!
//! Device registration and token refresh go to the auth host, items live in
//! the document-storage service. Uploads follow the request/blob/update-status
//! sequence with a zip bundle per document.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use uuid::Uuid;
use zip::write::SimpleFileOptions;

use crate::application::errors::CloudError;
use crate::domain::entities::{DeviceToken, RemoteItem};
use crate::domain::traits::{CloudClient, CloudConnector};
use crate::infrastructure::config::RemarkableConfig;

const REGISTER_PATH: &str = "/token/json/2/device/new";
const REFRESH_PATH: &str = "/token/json/2/user/new";
const DOCS_PATH: &str = "/document-storage/json/2/docs";
const UPLOAD_REQUEST_PATH: &str = "/document-storage/json/2/upload/request";
const UPLOAD_STATUS_PATH: &str = "/document-storage/json/2/upload/update-status";

const DOCUMENT_TYPE: &str = "DocumentType";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    code: &'a str,
    device_desc: &'a str,
    #[serde(rename = "deviceID")]
    device_id: String,
}

/// Document as returned by the storage service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredDocument {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub vissible_name: String,
    #[serde(default, rename = "Type")]
    pub doc_type: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub modified_client: Option<String>,
}

impl From<StoredDocument> for RemoteItem {
    fn from(doc: StoredDocument) -> Self {
        RemoteItem {
            id: doc.id,
            name: doc.vissible_name,
            kind: doc.doc_type,
            parent: doc.parent.filter(|p| !p.is_empty()),
            modified: doc.modified_client,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UploadRequest<'a> {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Type")]
    doc_type: &'a str,
    version: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UploadTicket {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(rename = "BlobURLPut", default)]
    blob_url_put: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateStatusRequest<'a> {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Type")]
    doc_type: &'a str,
    version: u32,
    vissible_name: &'a str,
    parent: &'a str,
    modified_client: String,
    bookmarked: bool,
    current_page: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateStatus {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
}

/// Map non-success responses to errors
async fn check(response: Response) -> Result<Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(CloudError::Auth(message));
    }
    Err(CloudError::Api { status: status.as_u16(), message })
}

/// Zip bundle the storage service expects for a PDF document
pub fn pdf_bundle(id: Uuid, pdf: &[u8]) -> Result<Vec<u8>, CloudError> {
    let content = serde_json::json!({
        "extraMetadata": {},
        "fileType": "pdf",
        "lastOpenedPage": 0,
        "lineHeight": -1,
        "margins": 180,
        "pageCount": 0,
        "textScale": 1,
        "transform": {}
    });

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let entries: [(String, Vec<u8>); 3] = [
        (format!("{}.content", id), content.to_string().into_bytes()),
        (format!("{}.pagedata", id), Vec::new()),
        (format!("{}.pdf", id), pdf.to_vec()),
    ];

    for (name, data) in entries {
        zip.start_file(name, options)
            .map_err(|e| CloudError::Bundle(e.to_string()))?;
        zip.write_all(&data)
            .map_err(|e| CloudError::Bundle(e.to_string()))?;
    }

    let cursor = zip.finish().map_err(|e| CloudError::Bundle(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Connector for the reMarkable cloud
pub struct RemarkableCloud {
    client: Client,
    config: RemarkableConfig,
}

impl RemarkableCloud {
    pub fn new(config: RemarkableConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}{}", self.config.auth_host.trim_end_matches('/'), path)
    }

    /// Exchange the device token for a short-lived user token
    async fn refresh_user_token(&self, token: &DeviceToken) -> Result<String, CloudError> {
        let response = self.client
            .post(self.auth_url(REFRESH_PATH))
            .bearer_auth(token.as_str())
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| CloudError::Network(e.to_string()))?;

        let user_token = check(response).await?
            .text()
            .await
            .map_err(|e| CloudError::Parse(e.to_string()))?;

        if user_token.trim().is_empty() {
            return Err(CloudError::Auth("Empty user token".to_string()));
        }
        Ok(user_token.trim().to_string())
    }
}

#[async_trait]
impl CloudConnector for RemarkableCloud {
    async fn register(&self, code: &str) -> Result<DeviceToken, CloudError> {
        let request = RegisterRequest {
            code,
            device_desc: &self.config.device_desc,
            device_id: Uuid::new_v4().to_string(),
        };

        let response = self.client
            .post(self.auth_url(REGISTER_PATH))
            .json(&request)
            .send()
            .await
            .map_err(|e| CloudError::Network(e.to_string()))?;

        let token = check(response).await?
            .text()
            .await
            .map_err(|e| CloudError::Parse(e.to_string()))?;

        if token.trim().is_empty() {
            return Err(CloudError::Auth("Empty device token".to_string()));
        }
        Ok(DeviceToken::new(token.trim()))
    }

    async fn connect(&self, token: &DeviceToken) -> Result<Arc<dyn CloudClient>, CloudError> {
        let user_token = self.refresh_user_token(token).await?;
        Ok(Arc::new(RemarkableClient {
            client: self.client.clone(),
            storage_host: self.config.storage_host.trim_end_matches('/').to_string(),
            user_token,
        }))
    }
}

/// Authenticated document-storage client
pub struct RemarkableClient {
    client: Client,
    storage_host: String,
    user_token: String,
}

impl RemarkableClient {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.storage_host, path)
    }

    async fn request_upload(&self, id: Uuid) -> Result<String, CloudError> {
        let request = [UploadRequest {
            id: id.to_string(),
            doc_type: DOCUMENT_TYPE,
            version: 1,
        }];

        let response = self.client
            .put(self.url(UPLOAD_REQUEST_PATH))
            .bearer_auth(&self.user_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| CloudError::Network(e.to_string()))?;

        let tickets: Vec<UploadTicket> = check(response).await?
            .json()
            .await
            .map_err(|e| CloudError::Parse(e.to_string()))?;

        let ticket = tickets.into_iter().next()
            .ok_or_else(|| CloudError::Parse("Empty upload response".to_string()))?;

        match ticket {
            UploadTicket { success: true, blob_url_put: Some(url), .. } => Ok(url),
            UploadTicket { message, .. } => Err(CloudError::Api { status: 200, message }),
        }
    }

    async fn put_blob(&self, blob_url: &str, bundle: Vec<u8>) -> Result<(), CloudError> {
        let response = self.client
            .put(blob_url)
            .body(bundle)
            .send()
            .await
            .map_err(|e| CloudError::Network(e.to_string()))?;

        check(response).await?;
        Ok(())
    }

    async fn update_status(&self, id: Uuid, name: &str) -> Result<(), CloudError> {
        let request = [UpdateStatusRequest {
            id: id.to_string(),
            doc_type: DOCUMENT_TYPE,
            version: 1,
            vissible_name: name,
            parent: "",
            modified_client: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            bookmarked: false,
            current_page: 0,
        }];

        let response = self.client
            .put(self.url(UPLOAD_STATUS_PATH))
            .bearer_auth(&self.user_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| CloudError::Network(e.to_string()))?;

        let statuses: Vec<UpdateStatus> = check(response).await?
            .json()
            .await
            .map_err(|e| CloudError::Parse(e.to_string()))?;

        match statuses.into_iter().next() {
            Some(UpdateStatus { success: true, .. }) => Ok(()),
            Some(UpdateStatus { message, .. }) => Err(CloudError::Api { status: 200, message }),
            None => Err(CloudError::Parse("Empty update-status response".to_string())),
        }
    }
}

#[async_trait]
impl CloudClient for RemarkableClient {
    async fn list_items(&self) -> Result<Vec<RemoteItem>, CloudError> {
        let response = self.client
            .get(self.url(DOCS_PATH))
            .bearer_auth(&self.user_token)
            .send()
            .await
            .map_err(|e| CloudError::Network(e.to_string()))?;

        let docs: Vec<StoredDocument> = check(response).await?
            .json()
            .await
            .map_err(|e| CloudError::Parse(e.to_string()))?;

        Ok(docs.into_iter().map(RemoteItem::from).collect())
    }

    async fn upload_pdf(&self, name: &str, id: Uuid, data: Vec<u8>) -> Result<(), CloudError> {
        let bundle = pdf_bundle(id, &data)?;
        let blob_url = self.request_upload(id).await?;
        self.put_blob(&blob_url, bundle).await?;
        self.update_status(id, name).await
    }
}
