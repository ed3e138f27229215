//! Session application services.
//!
//! The controller owns one session's snapshot, wizard and poll loop; the
//! selector makes sure only the selected session has one.

mod controller;
mod selector;

pub use controller::{SessionController, SessionView};
pub use selector::SessionSelector;
