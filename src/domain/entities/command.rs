use super::ContentRef;

/// Why a command could not be turned into an actionable intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidCommand {
    /// `register` without exactly one code argument
    RegisterUsage,
    /// Looked like a URL but did not parse as an absolute http(s) URL
    InvalidUrl,
    /// Attachment declared with a MIME type other than PDF
    NotAPdf,
}

/// What the sender asked the bot to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Register(String),
    List,
    /// `text` is the URL as the sender wrote it, used as the document name
    ConvertUrl { url: url::Url, text: String },
    UploadFile { name: String, content: ContentRef },
    Help,
    Invalid(InvalidCommand),
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Register(_) => "register",
            Intent::List => "list",
            Intent::ConvertUrl { .. } => "convert-url",
            Intent::UploadFile { .. } => "upload-file",
            Intent::Help => "help",
            Intent::Invalid(_) => "invalid",
        }
    }

    /// Whether the intent needs a registered cloud session
    pub fn requires_session(&self) -> bool {
        matches!(self, Intent::List | Intent::ConvertUrl { .. } | Intent::UploadFile { .. })
    }
}
