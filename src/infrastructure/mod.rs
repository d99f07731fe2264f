//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Credential persistence
//! - Adapters: Chat platform integrations (Matrix, console)
//! - Remarkable: Cloud document storage
//! - Renderer: Headless browser PDF rendering

pub mod config;
pub mod storage;
pub mod adapters;
pub mod remarkable;
pub mod renderer;
