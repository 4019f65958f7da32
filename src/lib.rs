pub mod anki;
pub mod config;
pub mod content;
pub mod core;
pub mod logseq;
pub mod sync;

pub use crate::core::SyncError;
