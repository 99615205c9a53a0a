// errors.rs
use crate::config::ConfigError;
use crate::db::StoreError;
use crate::notify::NotifyError;
use crate::region::RegionError;
use crate::scraper::ApiError;
use crate::spreadsheets::ExportError;
use thiserror::Error;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}
