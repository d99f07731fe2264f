//! Matrix adapter (client-server API over plain HTTP)

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::BotError;
use crate::domain::entities::{ContentRef, FileAttachment, InboundEvent, MessageBody, MessageEvent};
use crate::domain::traits::{Bot, BotInfo, DownloadedContent, EventSource};

/// Client-server API prefix
const CLIENT_API: &str = "/_matrix/client/v3";

/// Authenticated media API prefix
const MEDIA_API: &str = "/_matrix/client/v1/media";

/// Sync response, reduced to what the bot reads
#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: Rooms,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rooms {
    #[serde(default)]
    pub join: HashMap<String, JoinedRoom>,
    #[serde(default)]
    pub invite: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<RoomEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub sender: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub unsigned: Unsigned,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Unsigned {
    pub redacted_because: Option<serde_json::Value>,
}

impl RoomEvent {
    /// Convert a timeline event into a message event; `None` for non-message events
    pub fn to_message(&self, room_id: &str) -> Option<MessageEvent> {
        if self.event_type != "m.room.message" {
            return None;
        }

        let content = &self.content;
        // Redacted events keep their type but lose their content
        let redacted = self.unsigned.redacted_because.is_some()
            || content.as_object().map_or(true, |c| c.is_empty());

        let msgtype = content["msgtype"].as_str().unwrap_or_default();
        let body_text = content["body"].as_str().unwrap_or_default();

        let body = match msgtype {
            "m.text" => MessageBody::Text(body_text.to_string()),
            "m.file" | "m.image" | "m.audio" | "m.video" => match content["url"].as_str() {
                Some(url) => MessageBody::File(FileAttachment {
                    name: body_text.to_string(),
                    mimetype: content["info"]["mimetype"].as_str().map(|m| m.to_string()),
                    content: ContentRef::new(url),
                }),
                // Encrypted attachments carry `file` instead of `url`
                None => MessageBody::Other(msgtype.to_string()),
            },
            "" => MessageBody::Other(self.event_type.clone()),
            other => MessageBody::Other(other.to_string()),
        };

        Some(MessageEvent::new(room_id, &self.sender, body).with_redacted(redacted))
    }
}

impl SyncResponse {
    /// Message events across all joined rooms, in timeline order per room
    pub fn messages(&self) -> Vec<MessageEvent> {
        self.rooms.join.iter()
            .flat_map(|(room_id, room)| {
                room.timeline.events.iter().filter_map(move |e| e.to_message(room_id))
            })
            .collect()
    }

    pub fn invites(&self) -> Vec<String> {
        self.rooms.invite.keys().cloned().collect()
    }
}

/// Split `mxc://server/media-id` into its parts
pub fn parse_mxc(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("mxc://")?;
    let (server, media_id) = rest.split_once('/')?;
    if server.is_empty() || media_id.is_empty() || media_id.contains('/') {
        return None;
    }
    Some((server, media_id))
}

/// Shared HTTP plumbing for the adapter and the sync loop
#[derive(Clone)]
struct MatrixApi {
    client: Client,
    homeserver: String,
    access_token: String,
}

impl MatrixApi {
    fn url(&self, prefix: &str, path: &str) -> String {
        format!("{}{}{}", self.homeserver.trim_end_matches('/'), prefix, path)
    }

    async fn check(response: Response) -> Result<Response, BotError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(BotError::Auth(format!("Matrix API error {}: {}", status, error)))
            }
            StatusCode::NOT_FOUND => Err(BotError::NotFound(error)),
            _ => Err(BotError::Network(format!("Matrix API error {}: {}", status, error))),
        }
    }

    async fn whoami(&self) -> Result<String, BotError> {
        #[derive(Deserialize)]
        struct Response {
            user_id: String,
        }

        let response = self.client
            .get(self.url(CLIENT_API, "/account/whoami"))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let data: Response = Self::check(response).await?
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;

        Ok(data.user_id)
    }

    async fn set_display_name(&self, user_id: &str, name: &str) -> Result<(), BotError> {
        let path = format!("/profile/{}/displayname", urlencoding::encode(user_id));
        let response = self.client
            .put(self.url(CLIENT_API, &path))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "displayname": name }))
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn sync(&self, since: Option<&str>, timeout_ms: u64) -> Result<SyncResponse, BotError> {
        let mut query = vec![("timeout", timeout_ms.to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }

        let response = self.client
            .get(self.url(CLIENT_API, "/sync"))
            .bearer_auth(&self.access_token)
            .query(&query)
            .timeout(Duration::from_millis(timeout_ms) + Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        Self::check(response).await?
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))
    }

    async fn join(&self, room_id: &str) -> Result<(), BotError> {
        let path = format!("/join/{}", urlencoding::encode(room_id));
        let response = self.client
            .post(self.url(CLIENT_API, &path))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn send_message(&self, room_id: &str, msgtype: &str, text: &str) -> Result<String, BotError> {
        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            msgtype: &'a str,
            body: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            event_id: String,
        }

        let path = format!(
            "/rooms/{}/send/m.room.message/{}",
            urlencoding::encode(room_id),
            uuid::Uuid::new_v4()
        );
        let response = self.client
            .put(self.url(CLIENT_API, &path))
            .bearer_auth(&self.access_token)
            .json(&SendMessageRequest { msgtype, body: text })
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let data: Response = Self::check(response).await?
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;

        Ok(data.event_id)
    }

    async fn download(&self, content: &ContentRef) -> Result<DownloadedContent, BotError> {
        let (server, media_id) = parse_mxc(content.as_str())
            .ok_or_else(|| BotError::Parse(format!("Invalid content URI: {}", content)))?;

        let path = format!("/download/{}/{}", urlencoding::encode(server), urlencoding::encode(media_id));
        let response = self.client
            .get(self.url(MEDIA_API, &path))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let response = Self::check(response).await?;
        let content_type = response.headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let data = response.bytes()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        Ok(DownloadedContent {
            data: data.to_vec(),
            content_type,
        })
    }
}

/// Matrix bot adapter
pub struct MatrixAdapter {
    api: MatrixApi,
    info: BotInfo,
    display_name: Option<String>,
}

impl MatrixAdapter {
    pub fn new(homeserver: impl Into<String>, access_token: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            api: MatrixApi {
                client: Client::new(),
                homeserver: homeserver.into(),
                access_token: access_token.into(),
            },
            info: BotInfo {
                user_id: "unknown".to_string(),
            },
            display_name,
        }
    }

    /// Long-poll event source sharing this adapter's connection
    pub async fn event_source(&self, session_file: impl Into<PathBuf>, timeout_ms: u64) -> MatrixSync {
        MatrixSync::open(self.api.clone(), session_file.into(), timeout_ms).await
    }
}

#[async_trait]
impl Bot for MatrixAdapter {
    async fn start(&mut self) -> Result<(), BotError> {
        let user_id = self.api.whoami().await?;
        tracing::info!("Logged in to {} as {}", self.api.homeserver, user_id);

        if let Some(name) = &self.display_name {
            if let Err(e) = self.api.set_display_name(&user_id, name).await {
                tracing::warn!("Failed to set display name: {}", e);
            }
        }

        self.info.user_id = user_id;
        Ok(())
    }

    async fn send_notice(&self, room_id: &str, text: &str) -> Result<String, BotError> {
        tracing::debug!("Sending notice to {}: {}", room_id, text);
        self.api.send_message(room_id, "m.notice", text).await
    }

    async fn send_text(&self, room_id: &str, text: &str) -> Result<String, BotError> {
        tracing::debug!("Sending text to {}: {}", room_id, text);
        self.api.send_message(room_id, "m.text", text).await
    }

    async fn download(&self, content: &ContentRef) -> Result<DownloadedContent, BotError> {
        tracing::debug!("Downloading {}", content);
        self.api.download(content).await
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

/// Sync cursor persisted in the bot session file
#[derive(Debug, Default, Serialize, Deserialize)]
struct BotSession {
    next_batch: Option<String>,
}

/// Long-poll `/sync` loop producing inbound events
pub struct MatrixSync {
    api: MatrixApi,
    session_file: PathBuf,
    next_batch: Option<String>,
    timeout_ms: u64,
}

impl MatrixSync {
    async fn open(api: MatrixApi, session_file: PathBuf, timeout_ms: u64) -> Self {
        let session: BotSession = match tokio::fs::read_to_string(&session_file).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable bot session file: {}", e);
                BotSession::default()
            }),
            Err(_) => BotSession::default(),
        };

        Self {
            api,
            session_file,
            next_batch: session.next_batch,
            timeout_ms,
        }
    }

    async fn save_cursor(&self) {
        let session = BotSession { next_batch: self.next_batch.clone() };
        let result: std::io::Result<()> = async {
            if let Some(parent) = self.session_file.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_string(&session).map_err(std::io::Error::other)?;
            tokio::fs::write(&self.session_file, json).await
        }.await;

        if let Err(e) = result {
            tracing::warn!("Failed to save bot session file: {}", e);
        }
    }
}

#[async_trait]
impl EventSource for MatrixSync {
    async fn next_events(&mut self) -> Result<Option<Vec<InboundEvent>>, BotError> {
        // Without a cursor the first sync only primes it; history is not replayed
        let primed = self.next_batch.is_some();
        let timeout = if primed { self.timeout_ms } else { 0 };

        let response = self.api.sync(self.next_batch.as_deref(), timeout).await?;
        self.next_batch = Some(response.next_batch.clone());
        self.save_cursor().await;

        let mut events = Vec::new();
        for room_id in response.invites() {
            match self.api.join(&room_id).await {
                Ok(()) => events.push(InboundEvent::Join { room_id }),
                Err(e) => tracing::warn!("Failed to join {}: {}", room_id, e),
            }
        }

        if primed {
            events.extend(response.messages().into_iter().map(InboundEvent::Message));
        } else {
            tracing::info!("Initial sync done, skipping room history");
        }

        Ok(Some(events))
    }
}
