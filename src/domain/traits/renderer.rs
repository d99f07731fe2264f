use async_trait::async_trait;
use crate::application::errors::RenderError;

const MM_PER_INCH: f64 = 25.4;

/// Paper size and margins for rendered pages, in millimetres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_top_mm: f64,
    pub margin_right_mm: f64,
    pub margin_bottom_mm: f64,
    pub margin_left_mm: f64,
    pub print_background: bool,
}

impl Default for PageLayout {
    /// 210mm x 280mm with a wider left margin for the reader's toolbar
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 280.0,
            margin_top_mm: 10.0,
            margin_right_mm: 10.0,
            margin_bottom_mm: 10.0,
            margin_left_mm: 20.0,
            print_background: true,
        }
    }
}

impl PageLayout {
    pub fn to_inches(mm: f64) -> f64 {
        mm / MM_PER_INCH
    }
}

/// Renders a web page to PDF bytes
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, url: &url::Url, layout: &PageLayout) -> Result<Vec<u8>, RenderError>;
}
