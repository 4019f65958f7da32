use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Reqwest error: {0}")]
    Reqwest(Box<reqwest::Error>),

    #[error("AnkiConnect error: {0}")]
    AnkiConnect(String),

    #[error("AnkiConnect returned no result for '{0}'")]
    EmptyResult(String),

    #[error("AnkiConnect permission not granted")]
    PermissionDenied,

    #[error("Logseq API error: {0}")]
    GraphApi(String),

    #[error("Invalid cloze pattern spec: {0}")]
    BadClozeSpec(String),

    #[error("SyncError: {0}")]
    Custom(String),
}

impl From<std::io::Error> for SyncError {
    fn from(error: std::io::Error) -> Self {
        SyncError::Io(Box::new(error))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        SyncError::Reqwest(Box::new(error))
    }
}
