use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{
    json,
    Value,
};

use super::NoteGraph;
use crate::core::{
    models::MessageLevel,
    GraphInfo,
    PageInfo,
    SourceItem,
    SyncError,
};

/// Blocks carrying the cloze pattern property.
const CLOZE_BLOCKS_QUERY: &str = r#"
[:find (pull ?b [*])
 :where
   [?b :block/properties ?p]
   [(get ?p :ankicloze) ?t]
]"#;

/// Client for the Logseq local HTTP API.
pub struct LogseqClient {
    client: Client,
    url: String,
    token: String,
}

impl LogseqClient {
    pub fn new(url: &str, token: &str) -> Self {
        Self { client: Client::new(), url: url.to_string(), token: token.to_string() }
    }

    async fn invoke<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T, SyncError> {
        let body = json!({ "method": method, "args": args });
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::GraphApi(format!(
                "{} failed with status {}",
                method,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

fn string_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The cloze property arrives as a string, a number, or a vector of values
/// depending on how the user wrote it; flatten back to the comma form.
fn cloze_spec_value(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(string_value).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        other => string_value(other),
    }
}

fn block_uuid(block: &Value) -> Option<String> {
    match block.get("uuid") {
        Some(Value::String(s)) => Some(s.clone()),
        // Older API shape wraps the uuid in a tagged object.
        Some(Value::Object(map)) => map.get("$uuid$").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn parse_source_item(block: &Value) -> Result<SourceItem, SyncError> {
    let uuid = block_uuid(block)
        .ok_or_else(|| SyncError::GraphApi(format!("block without uuid: {}", block)))?;
    let properties = block.get("properties").cloned().unwrap_or_else(|| json!({}));
    let cloze_spec = properties
        .get("ankicloze")
        .and_then(cloze_spec_value)
        .ok_or_else(|| SyncError::GraphApi(format!("block {} has no usable cloze property", uuid)))?;

    Ok(SourceItem {
        uuid,
        content: block.get("content").and_then(Value::as_str).unwrap_or_default().to_string(),
        cloze_spec,
        page_id: block.get("page").and_then(|p| p.get("id")).and_then(Value::as_u64),
        has_persisted_id: properties.get("id").is_some(),
    })
}

fn parse_page(value: &Value) -> PageInfo {
    let properties = value.get("properties");
    let tags = properties.and_then(|p| p.get("tags")).and_then(|tags| match tags {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => {
            Some(items.iter().filter_map(string_value).collect())
        }
        _ => None,
    });

    PageInfo {
        original_name: value
            .get("originalName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        deck: properties.and_then(|p| p.get("deck")).and_then(string_value),
        tags,
    }
}

#[async_trait]
impl NoteGraph for LogseqClient {
    async fn graph_info(&self) -> Result<GraphInfo, SyncError> {
        self.invoke("logseq.App.getCurrentGraph", json!([])).await
    }

    async fn cloze_items(&self) -> Result<Vec<SourceItem>, SyncError> {
        let result: Value =
            self.invoke("logseq.DB.datascriptQuery", json!([CLOZE_BLOCKS_QUERY])).await?;
        let rows = result
            .as_array()
            .ok_or_else(|| SyncError::GraphApi(format!("unexpected query result: {}", result)))?;

        let mut items = Vec::new();
        for row in rows {
            // Each datascript row is a one-element vector holding the pull.
            let block = row.get(0).unwrap_or(row);
            items.push(parse_source_item(block)?);
        }
        Ok(items)
    }

    async fn persist_item_id(&self, uuid: &str) -> Result<(), SyncError> {
        let _: Value = self
            .invoke("logseq.Editor.upsertBlockProperty", json!([uuid, "id", uuid]))
            .await?;
        Ok(())
    }

    async fn page(&self, page_id: u64) -> Result<PageInfo, SyncError> {
        let value: Value = self.invoke("logseq.Editor.getPage", json!([page_id])).await?;
        Ok(parse_page(&value))
    }

    async fn show_message(&self, message: &str, level: MessageLevel) -> Result<(), SyncError> {
        let _: Value =
            self.invoke("logseq.App.showMsg", json!([message, level.as_str()])).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_pulled_block() {
        let block = json!({
            "uuid": "645a1b2c-0000-0000-0000-000000000000",
            "content": "The capital of France is Paris\nankicloze:: Paris",
            "properties": { "ankicloze": "Paris", "id": "645a1b2c-0000-0000-0000-000000000000" },
            "page": { "id": 42 },
        });
        let item = parse_source_item(&block).unwrap();
        assert_eq!(item.uuid, "645a1b2c-0000-0000-0000-000000000000");
        assert_eq!(item.cloze_spec, "Paris");
        assert_eq!(item.page_id, Some(42));
        assert!(item.has_persisted_id);
    }

    #[test]
    fn missing_id_property_marks_item_unpersisted() {
        let block = json!({
            "uuid": "u1",
            "content": "text",
            "properties": { "ankicloze": "text" },
        });
        let item = parse_source_item(&block).unwrap();
        assert!(!item.has_persisted_id);
        assert_eq!(item.page_id, None);
    }

    #[test]
    fn vector_cloze_property_is_flattened() {
        let block = json!({
            "uuid": "u1",
            "content": "a b",
            "properties": { "ankicloze": ["a", "b"] },
        });
        let item = parse_source_item(&block).unwrap();
        assert_eq!(item.cloze_spec, "a, b");
    }

    #[test]
    fn tagged_uuid_shape_is_accepted() {
        let block = json!({
            "uuid": { "$uuid$": "u2" },
            "properties": { "ankicloze": "x" },
        });
        assert_eq!(parse_source_item(&block).unwrap().uuid, "u2");
    }

    #[test]
    fn block_without_cloze_property_is_an_error() {
        let block = json!({ "uuid": "u1", "properties": {} });
        assert!(matches!(parse_source_item(&block), Err(SyncError::GraphApi(_))));
    }

    #[test]
    fn page_properties_parse_with_defaults() {
        let page = parse_page(&json!({
            "originalName": "Chemistry",
            "properties": { "deck": "Science", "tags": ["school", "chem"] },
        }));
        assert_eq!(page.original_name, "Chemistry");
        assert_eq!(page.deck(), "Science");
        assert_eq!(page.tags(), ["school".to_string(), "chem".to_string()]);

        let bare = parse_page(&json!({ "originalName": "Scratch" }));
        assert_eq!(bare.deck(), "Default");
        assert!(bare.tags().is_empty());
    }
}
