pub mod chat;
pub mod comment;
pub mod context;
pub mod dashboard;
pub mod deliverables;
pub mod inspect_bom;
pub mod lifecycle;
pub mod output;
pub mod replace_blob;
pub mod run;
pub mod session;
