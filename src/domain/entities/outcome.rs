use super::{InvalidCommand, RemoteItem};

/// Precondition violations reported back to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotRegistered,
    NotAPdf,
    ContentMismatch,
    InvalidUrl,
    RegisterUsage,
}

impl From<InvalidCommand> for RejectReason {
    fn from(invalid: InvalidCommand) -> Self {
        match invalid {
            InvalidCommand::RegisterUsage => RejectReason::RegisterUsage,
            InvalidCommand::InvalidUrl => RejectReason::InvalidUrl,
            InvalidCommand::NotAPdf => RejectReason::NotAPdf,
        }
    }
}

/// Pipeline stage a remote failure happened in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureStage {
    Download,
    Render { url: String },
    Upload,
    List,
}

/// Result of handling one event, consumed by the reporter
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Welcome,
    Help,
    Listed(Vec<RemoteItem>),
    Uploaded { name: String },
    RegistrationSucceeded,
    RegistrationFailed,
    Rejected(RejectReason),
    Failed { stage: FailureStage, reason: String },
}

impl Outcome {
    pub fn failed(stage: FailureStage, reason: impl std::fmt::Display) -> Self {
        Outcome::Failed { stage, reason: reason.to_string() }
    }
}
