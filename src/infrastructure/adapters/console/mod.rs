//! Console adapter for development/testing

use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::application::errors::BotError;
use crate::domain::entities::{ContentRef, InboundEvent, MessageEvent};
use crate::domain::traits::{Bot, BotInfo, DownloadedContent, EventSource};

pub const CONSOLE_ROOM: &str = "console";
pub const CONSOLE_USER: &str = "@console:local";

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
}

impl ConsoleAdapter {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                user_id: "@bot:local".to_string(),
            },
        }
    }

    /// Stdin reader turning each line into a message
    pub fn event_source(&self) -> ConsoleEvents {
        ConsoleEvents {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Guess a content type from a file extension, the way a media server would
fn guess_content_type(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

/// Turn a console line into an event; `file <path>` sends a local file as an attachment
pub fn parse_line(line: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(path) = line.strip_prefix("file ") {
        let path = Path::new(path.trim());
        let name = path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        return Some(
            MessageEvent::file(
                CONSOLE_ROOM,
                CONSOLE_USER,
                name,
                guess_content_type(path),
                format!("file://{}", path.display()),
            )
            .into(),
        );
    }

    Some(MessageEvent::text(CONSOLE_ROOM, CONSOLE_USER, line).into())
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&mut self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        Ok(())
    }

    async fn send_notice(&self, _room_id: &str, text: &str) -> Result<String, BotError> {
        println!("[BOT] {}", text);
        Ok("console_msg".to_string())
    }

    async fn send_text(&self, _room_id: &str, text: &str) -> Result<String, BotError> {
        println!("[BOT] {}", text);
        Ok("console_msg".to_string())
    }

    async fn download(&self, content: &ContentRef) -> Result<DownloadedContent, BotError> {
        let path = content.as_str().strip_prefix("file://")
            .ok_or_else(|| BotError::Parse(format!("Not a local file: {}", content)))?;

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| BotError::NotFound(format!("{}: {}", path, e)))?;

        Ok(DownloadedContent {
            data,
            content_type: guess_content_type(Path::new(path)).map(|c| c.to_string()),
        })
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

/// Stdin event source
pub struct ConsoleEvents {
    lines: Lines<BufReader<Stdin>>,
}

#[async_trait]
impl EventSource for ConsoleEvents {
    async fn next_events(&mut self) -> Result<Option<Vec<InboundEvent>>, BotError> {
        let line = self.lines.next_line()
            .await
            .map_err(|e| BotError::Internal(e.to_string()))?;

        Ok(line.map(|line| parse_line(&line).into_iter().collect()))
    }
}
