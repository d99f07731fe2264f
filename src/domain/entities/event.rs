/// Reference to content hosted by the chat transport (e.g. an `mxc://` URI)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef(pub String);

impl ContentRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An attachment as announced by the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// File name / body the sender gave the attachment
    pub name: String,
    /// MIME type declared in the event metadata, untrusted
    pub mimetype: Option<String>,
    pub content: ContentRef,
}

/// Message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    File(FileAttachment),
    /// Any message kind the bot does not act on (notices, emotes, locations...)
    Other(String),
}

impl MessageBody {
    pub fn kind(&self) -> &str {
        match self {
            MessageBody::Text(_) => "text",
            MessageBody::File(_) => "file",
            MessageBody::Other(kind) => kind,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            MessageBody::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A room message delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub room_id: String,
    pub sender: String,
    pub redacted: bool,
    pub body: MessageBody,
}

impl MessageEvent {
    pub fn new(room_id: impl Into<String>, sender: impl Into<String>, body: MessageBody) -> Self {
        Self {
            room_id: room_id.into(),
            sender: sender.into(),
            redacted: false,
            body,
        }
    }

    pub fn text(room_id: impl Into<String>, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(room_id, sender, MessageBody::Text(text.into()))
    }

    pub fn file(
        room_id: impl Into<String>,
        sender: impl Into<String>,
        name: impl Into<String>,
        mimetype: Option<&str>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(room_id, sender, MessageBody::File(FileAttachment {
            name: name.into(),
            mimetype: mimetype.map(|m| m.to_string()),
            content: ContentRef::new(content),
        }))
    }

    pub fn with_redacted(mut self, redacted: bool) -> Self {
        self.redacted = redacted;
        self
    }
}

/// Inbound chat event, lives for one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// The bot joined a room
    Join { room_id: String },
    Message(MessageEvent),
}

impl InboundEvent {
    pub fn room_id(&self) -> &str {
        match self {
            InboundEvent::Join { room_id } => room_id,
            InboundEvent::Message(msg) => &msg.room_id,
        }
    }
}

impl From<MessageEvent> for InboundEvent {
    fn from(msg: MessageEvent) -> Self {
        InboundEvent::Message(msg)
    }
}
