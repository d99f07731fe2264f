//! Message dispatcher - Routes inbound events to handlers

use std::sync::Arc;

use crate::application::errors::{CloudError, PipelineError};
use crate::application::services::{CloudSessionManager, PdfPipeline, PdfSource};
use crate::domain::entities::{FailureStage, InboundEvent, Intent, Outcome, RejectReason};
use crate::domain::traits::{Bot, PdfRenderer};
use super::middleware::{Context, Middleware, MiddlewareChain, Next};
use super::parser::CommandParser;
use super::reporter::{OutcomeReporter, CONVERSION_PROGRESS_TEXT, REGISTRATION_PROGRESS_TEXT};

/// Message dispatcher - filters, classifies and executes one event at a time
pub struct MessageDispatcher {
    bot: Arc<dyn Bot>,
    bot_user_id: String,
    session: Arc<CloudSessionManager>,
    pipeline: PdfPipeline,
    parser: CommandParser,
    middleware: Vec<Arc<dyn Middleware>>,
    reporter: OutcomeReporter,
}

impl MessageDispatcher {
    pub fn new(
        bot: Arc<dyn Bot>,
        session: Arc<CloudSessionManager>,
        renderer: Arc<dyn PdfRenderer>,
        reporter: OutcomeReporter,
    ) -> Self {
        let bot_user_id = bot.bot_info().user_id;
        Self {
            pipeline: PdfPipeline::new(bot.clone(), renderer),
            bot,
            bot_user_id,
            session,
            parser: CommandParser::new(),
            middleware: MiddlewareChain::standard().build(),
            reporter,
        }
    }

    /// Handle an event end to end, sending at most one outcome notice
    pub async fn handle(&self, event: InboundEvent) {
        let room_id = event.room_id().to_string();

        let Some(outcome) = self.dispatch(event).await else {
            return;
        };

        let text = self.reporter.notice(&outcome);
        let sent = match outcome {
            Outcome::Welcome => self.bot.send_text(&room_id, &text).await,
            _ => self.bot.send_notice(&room_id, &text).await,
        };

        if let Err(e) = sent {
            tracing::error!("[{}] Failed to send reply: {}", room_id, e);
        }
    }

    /// Run an event through filters and handlers; `None` when it was filtered out
    pub async fn dispatch(&self, event: InboundEvent) -> Option<Outcome> {
        let message = match event {
            InboundEvent::Join { room_id } => {
                tracing::info!("Joined room {}", room_id);
                return Some(Outcome::Welcome);
            }
            InboundEvent::Message(message) => message,
        };

        let ctx = Next::new(self.middleware.clone())
            .run(Context::new(message, self.bot_user_id.clone()))
            .ok()?;
        let message = ctx.message;

        let intent = self.parser.parse(&message.body)?;
        tracing::info!("[{}] Handling {} from {}", message.room_id, intent.name(), message.sender);

        Some(self.execute(&message.room_id, intent).await)
    }

    async fn execute(&self, room_id: &str, intent: Intent) -> Outcome {
        if intent.requires_session() && !self.session.is_registered().await {
            tracing::info!("[{}] Rejected {}: not registered", room_id, intent.name());
            return Outcome::Rejected(RejectReason::NotRegistered);
        }

        match intent {
            Intent::Help => Outcome::Help,
            Intent::Invalid(invalid) => {
                tracing::info!("[{}] Rejected: {:?}", room_id, invalid);
                Outcome::Rejected(invalid.into())
            }
            Intent::Register(code) => self.register(room_id, &code).await,
            Intent::List => self.list(room_id).await,
            Intent::ConvertUrl { url, text } => {
                self.progress(room_id, CONVERSION_PROGRESS_TEXT).await;
                self.forward(room_id, PdfSource::Url(&url), &text).await
            }
            Intent::UploadFile { name, content } => {
                self.forward(room_id, PdfSource::File(&content), &name).await
            }
        }
    }

    async fn register(&self, room_id: &str, code: &str) -> Outcome {
        self.progress(room_id, REGISTRATION_PROGRESS_TEXT).await;

        match self.session.register(code).await {
            Ok(()) => Outcome::RegistrationSucceeded,
            Err(e) => {
                tracing::error!("[{}] Registration failed: {}", room_id, e);
                Outcome::RegistrationFailed
            }
        }
    }

    async fn list(&self, room_id: &str) -> Outcome {
        match self.session.list_items().await {
            Ok(items) => Outcome::Listed(items),
            Err(CloudError::NotRegistered) => Outcome::Rejected(RejectReason::NotRegistered),
            Err(e) => {
                tracing::error!("[{}] Listing items failed: {}", room_id, e);
                Outcome::failed(FailureStage::List, e)
            }
        }
    }

    /// Produce PDF bytes and upload them; no step is retried
    async fn forward(&self, room_id: &str, source: PdfSource<'_>, name: &str) -> Outcome {
        let stage = match &source {
            PdfSource::File(_) => FailureStage::Download,
            PdfSource::Url(_) => FailureStage::Render { url: name.to_string() },
        };

        let data = match self.pipeline.produce(source).await {
            Ok(data) => data,
            Err(PipelineError::ContentMismatch(content_type)) => {
                tracing::info!("[{}] Rejected file with content type {}", room_id, content_type);
                return Outcome::Rejected(RejectReason::ContentMismatch);
            }
            Err(e) => {
                tracing::error!("[{}] {}", room_id, e);
                return Outcome::failed(stage, e);
            }
        };

        match self.session.upload_document(name, data).await {
            Ok(name) => {
                tracing::info!("[{}] Sent '{}' to reMarkable", room_id, name);
                Outcome::Uploaded { name }
            }
            Err(CloudError::NotRegistered) => Outcome::Rejected(RejectReason::NotRegistered),
            Err(e) => {
                tracing::error!("[{}] Upload failed: {}", room_id, e);
                Outcome::failed(FailureStage::Upload, e)
            }
        }
    }

    /// Progress notices are best effort and never count as the outcome
    async fn progress(&self, room_id: &str, text: &str) {
        if let Err(e) = self.bot.send_notice(room_id, text).await {
            tracing::warn!("[{}] Failed to send progress notice: {}", room_id, e);
        }
    }
}
