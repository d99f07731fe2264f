//! Outcome reporter - Turns handler outcomes into chat notices

use crate::domain::entities::{FailureStage, Outcome, RejectReason};

pub const HELP_TEXT: &str = "This bot can be used to send PDFs and URLs (as PDFs) to the reMarkable™ cloud.\n\
Just send me a PDF, or type an URL and I'll send it to your reMarkable™!\n\n\
Commands:\n    \
- help: Prints this help message.\n    \
- register: Registers this bot in the reMarkable™ cloud.\n    \
- list: Lists all items in the reMarkable™ cloud.";

pub const REGISTER_USAGE_TEXT: &str = "To register the bot, go to https://my.remarkable.com/device/desktop/connect copy the code \
and then use the following command:\n\n    \
register <code>";

pub const NOT_REGISTERED_TEXT: &str =
    "Bot not registered in the reMarkable™ cloud. Please use the `register` command first.";

pub const REGISTRATION_PROGRESS_TEXT: &str = "Registration in progress...";
pub const CONVERSION_PROGRESS_TEXT: &str = "Converting URL to PDF...";

/// Maps every outcome to exactly one notice
pub struct OutcomeReporter {
    greeting: String,
}

impl OutcomeReporter {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
        }
    }

    pub fn notice(&self, outcome: &Outcome) -> String {
        match outcome {
            Outcome::Welcome => self.greeting.clone(),
            Outcome::Help => HELP_TEXT.to_string(),
            Outcome::Listed(items) => {
                let mut reply = "Items:\n\n".to_string();
                for item in items {
                    reply.push_str(&format!("{}\n", item));
                }
                reply
            }
            Outcome::Uploaded { .. } => "PDF sent to reMarkable™!".to_string(),
            Outcome::RegistrationSucceeded => "Bot registered!".to_string(),
            Outcome::RegistrationFailed => "Registration failed!".to_string(),
            Outcome::Rejected(reason) => Self::rejection(*reason).to_string(),
            Outcome::Failed { stage, .. } => Self::failure(stage),
        }
    }

    fn rejection(reason: RejectReason) -> &'static str {
        match reason {
            RejectReason::NotRegistered => NOT_REGISTERED_TEXT,
            RejectReason::NotAPdf => "File is not a PDF.",
            RejectReason::ContentMismatch => "File content is not a PDF.",
            RejectReason::InvalidUrl => "Invalid URL.",
            RejectReason::RegisterUsage => REGISTER_USAGE_TEXT,
        }
    }

    fn failure(stage: &FailureStage) -> String {
        match stage {
            FailureStage::Download => "Failed to download file.".to_string(),
            FailureStage::Render { url } => format!("PDF could not be generated for {}", url),
            FailureStage::Upload => "Failed to send PDF to reMarkable™.".to_string(),
            FailureStage::List => "Failed to list items in the reMarkable™ cloud.".to_string(),
        }
    }
}

impl Default for OutcomeReporter {
    fn default() -> Self {
        Self::new("Hello, world!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::RemoteItem;

    #[test]
    fn test_rejections() {
        let reporter = OutcomeReporter::default();
        assert_eq!(reporter.notice(&Outcome::Rejected(RejectReason::NotAPdf)), "File is not a PDF.");
        assert_eq!(
            reporter.notice(&Outcome::Rejected(RejectReason::ContentMismatch)),
            "File content is not a PDF."
        );
        assert_eq!(reporter.notice(&Outcome::Rejected(RejectReason::NotRegistered)), NOT_REGISTERED_TEXT);
        assert_eq!(reporter.notice(&Outcome::Rejected(RejectReason::RegisterUsage)), REGISTER_USAGE_TEXT);
    }

    #[test]
    fn test_failures_hide_details() {
        let reporter = OutcomeReporter::default();
        let notice = reporter.notice(&Outcome::failed(FailureStage::Upload, "HTTP 500: secret internals"));
        assert_eq!(notice, "Failed to send PDF to reMarkable™.");

        let notice = reporter.notice(&Outcome::failed(
            FailureStage::Render { url: "https://example.com/".to_string() },
            "net::ERR_NAME_NOT_RESOLVED",
        ));
        assert_eq!(notice, "PDF could not be generated for https://example.com/");
    }

    #[test]
    fn test_listing() {
        let reporter = OutcomeReporter::default();
        let items = vec![
            RemoteItem::new("id-1", "Notes"),
            RemoteItem::new("id-2", "Books").with_kind("CollectionType"),
        ];
        let notice = reporter.notice(&Outcome::Listed(items));
        assert_eq!(notice, "Items:\n\nNotes (DocumentType, id-1)\nBooks (CollectionType, id-2)\n");
    }

    #[test]
    fn test_welcome_uses_greeting() {
        let reporter = OutcomeReporter::new("Hi there");
        assert_eq!(reporter.notice(&Outcome::Welcome), "Hi there");
    }

    #[test]
    fn test_usage_mentions_command() {
        assert!(REGISTER_USAGE_TEXT.ends_with("    register <code>"));
        assert!(HELP_TEXT.contains("- list:"));
    }
}
