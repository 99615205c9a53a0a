use crate::scraper::FetchFailure;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("Region not found: {name}")]
    RegionNotFound { name: String },

    #[error("Failed to read region table {path}: {source}")]
    TableIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Region table {path} is neither UTF-8 nor CP949")]
    TableEncoding { path: String },

    #[error("Region discovery request failed: {0}")]
    Discovery(#[from] FetchFailure),
}
