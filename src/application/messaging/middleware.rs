//! Middleware system for filtering inbound messages before dispatch

use std::sync::Arc;
use crate::domain::entities::{MessageBody, MessageEvent};

/// Context passed through middleware chain
#[derive(Debug, Clone)]
pub struct Context {
    pub message: MessageEvent,
    /// User id of the bot itself
    pub bot_user_id: String,
}

impl Context {
    pub fn new(message: MessageEvent, bot_user_id: impl Into<String>) -> Self {
        Self {
            message,
            bot_user_id: bot_user_id.into(),
        }
    }
}

/// Middleware trait - processors that can drop a message before it is dispatched
pub trait Middleware: Send + Sync {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult;
}

/// Result of middleware processing
pub type MiddlewareResult = Result<Context, MiddlewareError>;

/// Middleware errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareError {
    /// Drop the message silently
    Skipped(&'static str),
}

impl std::fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareError::Skipped(reason) => write!(f, "Skipped: {}", reason),
        }
    }
}

impl std::error::Error for MiddlewareError {}

/// Next middleware in chain
#[derive(Clone)]
pub struct Next {
    remaining: Arc<Vec<Arc<dyn Middleware>>>,
}

impl Next {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            remaining: Arc::new(middlewares),
        }
    }

    /// Process remaining middleware
    pub fn run(self, ctx: Context) -> MiddlewareResult {
        if let Some(first) = self.remaining.first() {
            let remaining = self.remaining[1..].to_vec();
            let next = Next::new(remaining);
            first.process(ctx, next)
        } else {
            Ok(ctx)
        }
    }
}

/// Middleware chain builder
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Chain with the filters every bot needs
    pub fn standard() -> Self {
        Self::new()
            .add(LoggingMiddleware)
            .add(IgnoreRedacted)
            .add(IgnoreOwnMessages)
            .add(IgnoreUnsupported)
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Drops redacted events
pub struct IgnoreRedacted;

impl Middleware for IgnoreRedacted {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        if ctx.message.redacted {
            return Err(MiddlewareError::Skipped("redacted"));
        }
        next.run(ctx)
    }
}

/// Drops events the bot sent itself, which would otherwise loop
pub struct IgnoreOwnMessages;

impl Middleware for IgnoreOwnMessages {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        if ctx.message.sender == ctx.bot_user_id {
            return Err(MiddlewareError::Skipped("own message"));
        }
        next.run(ctx)
    }
}

/// Drops message kinds that are neither text nor attachments
pub struct IgnoreUnsupported;

impl Middleware for IgnoreUnsupported {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        if let MessageBody::Other(_) = ctx.message.body {
            return Err(MiddlewareError::Skipped("unsupported message kind"));
        }
        next.run(ctx)
    }
}

/// Logging middleware for debugging
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        let preview = ctx.message.body.text()
            .map(|s| s.chars().take(50).collect::<String>())
            .unwrap_or_else(|| format!("[{}]", ctx.message.body.kind()));

        tracing::debug!("[{}] {}: {}", ctx.message.room_id, ctx.message.sender, preview);

        let room_id = ctx.message.room_id.clone();
        let result = next.run(ctx);

        if let Err(e) = &result {
            tracing::debug!("[{}] {}", room_id, e);
        }

        result
    }
}
