use std::{
    collections::HashMap,
    path::Path,
};

use async_trait::async_trait;

use crate::core::SyncError;

pub mod api;
pub mod templates;

pub use api::AnkiConnectClient;

/// The remote flashcard store. One implementation talks to AnkiConnect;
/// tests substitute an in-memory fake.
#[async_trait]
pub trait CardStore {
    async fn request_permission(&self) -> Result<(), SyncError>;
    async fn create_backup(&self) -> Result<(), SyncError>;
    /// Idempotent: creating a model that already exists is a success.
    async fn ensure_model(
        &self,
        model_name: &str,
        fields: &[&str],
        front_template: &str,
        back_template: &str,
    ) -> Result<(), SyncError>;
    async fn find_note_ids(&self, query: &str) -> Result<Vec<u64>, SyncError>;
    async fn add_note(
        &self,
        deck: &str,
        model_name: &str,
        fields: HashMap<String, String>,
        tags: &[String],
    ) -> Result<u64, SyncError>;
    async fn update_note(
        &self,
        note_id: u64,
        deck: &str,
        model_name: &str,
        fields: HashMap<String, String>,
        tags: &[String],
    ) -> Result<(), SyncError>;
    async fn delete_note(&self, note_id: u64) -> Result<(), SyncError>;
    async fn store_media_file(&self, filename: &str, path: &Path) -> Result<(), SyncError>;
    async fn reload_collection(&self) -> Result<(), SyncError>;
    async fn remove_empty_notes(&self) -> Result<(), SyncError>;
}

fn quote_model_name(model_name: &str) -> String {
    if model_name.contains(' ') || model_name.contains(':') || model_name.contains('"') {
        format!("\"{}\"", model_name.replace('"', "\\\""))
    } else {
        model_name.to_string()
    }
}

/// Search query matching every note of the given model.
pub fn model_query(model_name: &str) -> String {
    format!("note:{}", quote_model_name(model_name))
}

/// Search query matching the single note joined to a source item.
pub fn identity_query(uuid: &str, model_name: &str) -> String {
    format!("uuid:{} note:{}", uuid, quote_model_name(model_name))
}

/// Map a source item's identifier to its remote note id, if one exists.
/// Lookup only; creation is the reconciliation engine's job.
pub async fn resolve_note_id<S: CardStore + ?Sized>(
    store: &S,
    uuid: &str,
    model_name: &str,
) -> Result<Option<u64>, SyncError> {
    let ids = store.find_note_ids(&identity_query(uuid, model_name)).await?;
    Ok(ids.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_model_names_are_not_quoted() {
        assert_eq!(model_query("NotesModel"), "note:NotesModel");
        assert_eq!(identity_query("abc-123", "NotesModel"), "uuid:abc-123 note:NotesModel");
    }

    #[test]
    fn model_names_with_specials_are_quoted() {
        assert_eq!(model_query("My GraphModel"), "note:\"My GraphModel\"");
        assert_eq!(model_query("a\"bModel"), "note:\"a\\\"bModel\"");
    }
}
