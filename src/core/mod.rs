pub mod errors;
pub mod models;

pub use errors::SyncError;
pub use models::{ GraphInfo, MessageLevel, NoteFields, PageInfo, SourceItem, SyncReport };
