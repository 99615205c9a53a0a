use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Open DB failed for {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Failed to encode attributes: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Connection slot unavailable on this thread")]
    ThreadLocal,
}
