//! Application services - Business logic orchestration

pub mod session_service;
pub mod pipeline;

pub use session_service::CloudSessionManager;
pub use pipeline::{PdfPipeline, PdfSource};
