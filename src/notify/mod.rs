pub mod format;
pub mod telegram;

pub use telegram::TelegramNotifier;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Notifier not configured: {0}")]
    NotConfigured(&'static str),
}

/// Delivers a finished report somewhere a person will read it.
pub trait Notifier {
    fn send(&self, text: &str) -> Result<(), NotifyError>;
}
