use async_trait::async_trait;

use crate::core::{
    models::MessageLevel,
    GraphInfo,
    PageInfo,
    SourceItem,
    SyncError,
};

pub mod api;

pub use api::LogseqClient;

/// The host note graph. The only mutation the sync engine performs through
/// this trait is `persist_item_id`.
#[async_trait]
pub trait NoteGraph {
    async fn graph_info(&self) -> Result<GraphInfo, SyncError>;
    /// All blocks carrying a cloze pattern property.
    async fn cloze_items(&self) -> Result<Vec<SourceItem>, SyncError>;
    /// Write the block's own uuid as its `id` property so the identifier
    /// survives a graph re-index.
    async fn persist_item_id(&self, uuid: &str) -> Result<(), SyncError>;
    async fn page(&self, page_id: u64) -> Result<PageInfo, SyncError>;
    async fn show_message(&self, message: &str, level: MessageLevel) -> Result<(), SyncError>;
}
