//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Core session record (`Session`, `SessionStatus`)
//! - `blob`: Immutable artifacts attached to a session (`Blob`, `NewBlob`)
//! - `message`: Chat history types (`ChatMessage`, `MessageRole`)
//! - `project`: Project records

mod blob;
mod message;
mod model;
mod project;

pub use blob::{Blob, NewBlob};
pub use message::{ChatMessage, MessageRole, latest_reply};
pub use model::{Session, SessionStatus};
pub use project::Project;
