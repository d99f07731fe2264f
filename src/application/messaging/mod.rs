//! Message handling - Event-driven message processing

pub mod dispatcher;
pub mod middleware;
pub mod parser;
pub mod reporter;


pub use dispatcher::MessageDispatcher;
pub use reporter::OutcomeReporter;
