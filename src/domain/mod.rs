//! Domain layer - Core business logic with no external dependencies
//! 
//! This layer contains:
//! - Entities: Core business objects (InboundEvent, Intent, Outcome, SessionCredential)
//! - Traits: Abstractions for infrastructure (Bot, CloudConnector, PdfRenderer, CredentialStore)

pub mod entities;
pub mod traits;
