//! Message parser - Classifies message bodies into intents

use crate::domain::entities::{FileAttachment, Intent, InvalidCommand, MessageBody};

/// MIME type accepted for uploads
pub const PDF_MIME: &str = "application/pdf";

/// Name used when an attachment comes without one
pub const DEFAULT_FILE_NAME: &str = "matrix.pdf";

/// Compare the media type essence of a content type against `expected`,
/// ignoring parameters and case
pub fn media_type_is(content_type: Option<&str>, expected: &str) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// Parses incoming message bodies into intents
pub struct CommandParser {
    register_word: String,
    list_word: String,
}

impl CommandParser {
    pub fn new() -> Self {
        Self {
            register_word: "register".to_string(),
            list_word: "list".to_string(),
        }
    }

    /// Classify a message body; `None` for kinds the bot does not act on
    pub fn parse(&self, body: &MessageBody) -> Option<Intent> {
        match body {
            MessageBody::Text(text) => Some(self.parse_text(text)),
            MessageBody::File(file) => Some(self.parse_file(file)),
            MessageBody::Other(_) => None,
        }
    }

    /// Parse a text message
    pub fn parse_text(&self, text: &str) -> Intent {
        let text = text.trim();

        if text.starts_with(&self.register_word) {
            return self.parse_register(text);
        }

        if text == self.list_word {
            return Intent::List;
        }

        if text.starts_with("http://") || text.starts_with("https://") {
            return match parse_http_url(text) {
                Some(url) => Intent::ConvertUrl { url, text: text.to_string() },
                None => Intent::Invalid(InvalidCommand::InvalidUrl),
            };
        }

        Intent::Help
    }

    /// `register <code>`, exactly two words
    fn parse_register(&self, text: &str) -> Intent {
        let words: Vec<&str> = text.split_whitespace().collect();
        match words.as_slice() {
            [_, code] => Intent::Register(code.to_string()),
            _ => Intent::Invalid(InvalidCommand::RegisterUsage),
        }
    }

    /// Parse an attachment; only the declared type is checked here
    pub fn parse_file(&self, file: &FileAttachment) -> Intent {
        if !media_type_is(file.mimetype.as_deref(), PDF_MIME) {
            return Intent::Invalid(InvalidCommand::NotAPdf);
        }

        let name = match file.name.trim() {
            "" => DEFAULT_FILE_NAME.to_string(),
            name => name.to_string(),
        };

        Intent::UploadFile {
            name,
            content: file.content.clone(),
        }
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_http_url(text: &str) -> Option<url::Url> {
    let url = url::Url::parse(text).ok()?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Some(url),
        _ => None,
    }
}
