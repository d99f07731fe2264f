//! Domain entities - Core business objects with no external dependencies

pub mod event;
pub mod command;
pub mod outcome;
pub mod credential;
pub mod item;

pub use event::{InboundEvent, MessageEvent, MessageBody, FileAttachment, ContentRef};
pub use command::{Intent, InvalidCommand};
pub use outcome::{Outcome, RejectReason, FailureStage};
pub use credential::{SessionCredential, DeviceToken};
pub use item::RemoteItem;
