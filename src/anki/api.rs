use std::{
    collections::HashMap,
    path::Path,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{
    de::DeserializeOwned,
    Deserialize,
};
use serde_json::json;

use super::CardStore;
use crate::core::SyncError;

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermissionResult {
    permission: String,
}

/// AnkiConnect (protocol version 6) HTTP client. Every call is a single
/// awaited POST; the engine never fans out remote calls.
pub struct AnkiConnectClient {
    client: Client,
    url: String,
}

impl AnkiConnectClient {
    pub fn new(url: &str) -> Self {
        Self { client: Client::new(), url: url.to_string() }
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Option<serde_json::Value>,
    ) -> Result<Option<T>, SyncError> {
        let mut body = serde_json::Map::new();
        body.insert("action".to_string(), serde_json::Value::String(action.to_string()));
        body.insert("version".to_string(), serde_json::Value::Number((6).into()));

        if let Some(params) = params {
            body.insert("params".to_string(), params);
        }

        let response: ApiResponse<T> =
            self.client.post(&self.url).json(&body).send().await?.json().await?;

        if let Some(error) = response.error {
            return Err(SyncError::AnkiConnect(error));
        }
        Ok(response.result)
    }

    /// `invoke` for actions whose result must be present.
    async fn expect<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Option<serde_json::Value>,
    ) -> Result<T, SyncError> {
        self.invoke(action, params)
            .await?
            .ok_or_else(|| SyncError::EmptyResult(action.to_string()))
    }
}

#[async_trait]
impl CardStore for AnkiConnectClient {
    async fn request_permission(&self) -> Result<(), SyncError> {
        let result: PermissionResult = self.expect("requestPermission", None).await?;
        if result.permission != "granted" {
            return Err(SyncError::PermissionDenied);
        }
        Ok(())
    }

    async fn create_backup(&self) -> Result<(), SyncError> {
        self.invoke::<serde_json::Value>("createBackup", Some(json!({}))).await?;
        Ok(())
    }

    async fn ensure_model(
        &self,
        model_name: &str,
        fields: &[&str],
        front_template: &str,
        back_template: &str,
    ) -> Result<(), SyncError> {
        let params = json!({
            "modelName": model_name,
            "inOrderFields": fields,
            "isCloze": true,
            "cardTemplates": [{
                "Name": "Cloze",
                "Front": front_template,
                "Back": back_template,
            }],
        });
        match self.invoke::<serde_json::Value>("createModel", Some(params)).await {
            Ok(_) => Ok(()),
            // Ensure-exists semantics: the model surviving from a previous
            // run is the expected steady state.
            Err(SyncError::AnkiConnect(msg)) if msg.contains("already exists") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn find_note_ids(&self, query: &str) -> Result<Vec<u64>, SyncError> {
        let params = json!({ "query": query });
        Ok(self.invoke("findNotes", Some(params)).await?.unwrap_or_default())
    }

    async fn add_note(
        &self,
        deck: &str,
        model_name: &str,
        fields: HashMap<String, String>,
        tags: &[String],
    ) -> Result<u64, SyncError> {
        // addNote rejects unknown decks, so make sure the target exists.
        self.invoke::<serde_json::Value>("createDeck", Some(json!({ "deck": deck }))).await?;

        let params = json!({
            "note": {
                "deckName": deck,
                "modelName": model_name,
                "fields": fields,
                "tags": tags,
                "options": { "allowDuplicate": false },
            }
        });
        self.expect("addNote", Some(params)).await
    }

    async fn update_note(
        &self,
        note_id: u64,
        _deck: &str,
        _model_name: &str,
        fields: HashMap<String, String>,
        _tags: &[String],
    ) -> Result<(), SyncError> {
        // AnkiConnect v6 has no single update action covering deck and
        // model; the field map is what changes between runs.
        let params = json!({
            "note": {
                "id": note_id,
                "fields": fields,
            }
        });
        self.invoke::<serde_json::Value>("updateNoteFields", Some(params)).await?;
        Ok(())
    }

    async fn delete_note(&self, note_id: u64) -> Result<(), SyncError> {
        let params = json!({ "notes": [note_id] });
        self.invoke::<serde_json::Value>("deleteNotes", Some(params)).await?;
        Ok(())
    }

    async fn store_media_file(&self, filename: &str, path: &Path) -> Result<(), SyncError> {
        let params = json!({
            "filename": filename,
            "path": path.display().to_string(),
        });
        self.invoke::<serde_json::Value>("storeMediaFile", Some(params)).await?;
        Ok(())
    }

    async fn reload_collection(&self) -> Result<(), SyncError> {
        self.invoke::<serde_json::Value>("reloadCollection", Some(json!({}))).await?;
        Ok(())
    }

    async fn remove_empty_notes(&self) -> Result<(), SyncError> {
        self.invoke::<serde_json::Value>("removeEmptyNotes", Some(json!({}))).await?;
        Ok(())
    }
}
