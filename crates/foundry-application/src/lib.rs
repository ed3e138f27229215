//! Application layer for Foundry.
//!
//! Coordinates the domain model in `foundry-core` with a backend
//! implementation: the per-session controller and its poll loop,
//! conflict-safe content writes, artifact replacement and the dashboard.

pub mod blob_version;
pub mod content_writer;
pub mod dashboard;
#[cfg(any(test, feature = "testing"))]
pub mod in_memory;
pub mod lifecycle_generator;
pub mod poll_loop;
pub mod session;

pub use blob_version::{BlobReplaceError, BlobVersionManager, ReplaceOutcome, ReplaceStep};
pub use content_writer::ContentWriter;
pub use dashboard::{Dashboard, SessionCard};
#[cfg(any(test, feature = "testing"))]
pub use in_memory::InMemoryBackend;
pub use lifecycle_generator::LifecycleGenerator;
pub use poll_loop::{PollEvent, PollLoop, PollOutcome};
pub use session::{SessionController, SessionSelector, SessionView};
