//! Session content: the section document stored in `Session::content`.

pub mod codec;
pub mod comments;
pub mod lifecycle;
pub mod patch;

pub use codec::{ContentOrigin, ContentSection, SessionContent, COMMENTS_KEY, LIFECYCLE_KEY};
pub use comments::Comments;
pub use lifecycle::{extract_string_array, Lifecycle, LifecycleSummary, StepState};
pub use patch::{merge_into, ContentPatch, MergedContent};
