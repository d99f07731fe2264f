//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod store;
pub mod cloud;
pub mod renderer;

pub use bot::{Bot, BotInfo, DownloadedContent, EventSource};
pub use store::CredentialStore;
pub use cloud::{CloudClient, CloudConnector};
pub use renderer::{PageLayout, PdfRenderer};
