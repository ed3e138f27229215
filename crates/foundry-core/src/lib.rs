pub mod backend;
pub mod bom;
pub mod config;
pub mod content;
pub mod error;
pub mod progress;
pub mod session;
pub mod wizard;

// Re-export common error type
pub use error::{FoundryError, Result};
