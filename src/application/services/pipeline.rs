//! PDF pipeline - produces PDF bytes for a file or URL event

use std::sync::Arc;

use crate::application::errors::PipelineError;
use crate::application::messaging::parser::{media_type_is, PDF_MIME};
use crate::domain::entities::ContentRef;
use crate::domain::traits::{Bot, PageLayout, PdfRenderer};

/// Where the PDF bytes come from
#[derive(Debug, Clone)]
pub enum PdfSource<'a> {
    /// An attachment already hosted by the chat transport
    File(&'a ContentRef),
    /// A web page to render
    Url(&'a url::Url),
}

/// Turns a [`PdfSource`] into PDF bytes
pub struct PdfPipeline {
    bot: Arc<dyn Bot>,
    renderer: Arc<dyn PdfRenderer>,
    layout: PageLayout,
}

impl PdfPipeline {
    pub fn new(bot: Arc<dyn Bot>, renderer: Arc<dyn PdfRenderer>) -> Self {
        Self {
            bot,
            renderer,
            layout: PageLayout::default(),
        }
    }

    pub async fn produce(&self, source: PdfSource<'_>) -> Result<Vec<u8>, PipelineError> {
        match source {
            PdfSource::File(content) => self.fetch_file(content).await,
            PdfSource::Url(url) => {
                tracing::debug!("Rendering {}", url);
                Ok(self.renderer.render(url, &self.layout).await?)
            }
        }
    }

    /// Download an attachment; the bytes are used as-is once the server agrees it is a PDF
    async fn fetch_file(&self, content: &ContentRef) -> Result<Vec<u8>, PipelineError> {
        let downloaded = self.bot.download(content).await?;

        if !media_type_is(downloaded.content_type.as_deref(), PDF_MIME) {
            return Err(PipelineError::ContentMismatch(
                downloaded.content_type.unwrap_or_else(|| "none".to_string()),
            ));
        }

        Ok(downloaded.data)
    }
}
