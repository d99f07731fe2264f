use async_trait::async_trait;
use crate::domain::entities::{ContentRef, InboundEvent};
use crate::application::errors::BotError;

/// Bot trait - abstraction for messaging platform adapters
#[async_trait]
pub trait Bot: Send + Sync {
    /// Start the bot and resolve its own identity
    async fn start(&mut self) -> Result<(), BotError>;

    /// Send a bot notice to a room
    async fn send_notice(&self, room_id: &str, text: &str) -> Result<String, BotError>;

    /// Send a regular text message to a room
    async fn send_text(&self, room_id: &str, text: &str) -> Result<String, BotError>;

    /// Fetch attachment content hosted by the platform
    async fn download(&self, content: &ContentRef) -> Result<DownloadedContent, BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Source of inbound events (long-poll, stdin, ...)
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next batch of events, possibly empty; `None` once the source is exhausted
    async fn next_events(&mut self) -> Result<Option<Vec<InboundEvent>>, BotError>;
}

/// Downloaded attachment with the content type the server reported
#[derive(Debug, Clone)]
pub struct DownloadedContent {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub user_id: String,
}
