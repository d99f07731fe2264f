//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: Session lifecycle and the PDF pipeline
//! - Errors: Domain-specific errors
//! - Messaging: Message parsing, middleware, dispatching, reporting

pub mod errors;
pub mod services;
pub mod messaging;

#[cfg(test)]
pub mod testing;
