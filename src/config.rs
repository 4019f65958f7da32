use std::{
    fs,
    path::PathBuf,
};

use serde::{
    Deserialize,
    Serialize,
};

const APP_NAME: &str = "clozesync";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub anki_connect_url: String,
    pub logseq_api_url: String,
    pub logseq_api_token: String,
    /// Request an Anki collection backup before syncing.
    pub backup: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            anki_connect_url: "http://localhost:8765/".to_string(),
            logseq_api_url: "http://127.0.0.1:12315/api".to_string(),
            logseq_api_token: String::new(),
            backup: false,
        }
    }
}

pub fn config_file_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        let app_dir = config_dir.join(APP_NAME);
        let _ = fs::create_dir_all(&app_dir);
        app_dir.join(CONFIG_FILE)
    } else {
        PathBuf::from(CONFIG_FILE)
    }
}

pub fn load_config() -> SyncConfig {
    let file_path = config_file_path();
    if !file_path.exists() {
        return SyncConfig::default();
    }

    match fs::read_to_string(&file_path)
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}. Using defaults.", file_path.display(), e);
            SyncConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{ "backup": true }"#).unwrap();
        assert!(config.backup);
        assert_eq!(config.anki_connect_url, "http://localhost:8765/");
        assert!(config.logseq_api_token.is_empty());
    }
}
