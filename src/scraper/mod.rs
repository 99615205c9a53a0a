pub mod client;
pub mod collector;
pub mod models;
pub mod retry;
mod scraper_error;

pub use client::{ListingSource, NaverLandClient};
pub use collector::{CollectionRequest, Collector, CollectorOptions, ContinuationPolicy};
pub use models::{BoundingBox, UpstreamFilter};
pub use retry::{RequestPolicy, RetryPolicy};
pub use scraper_error::{ApiError, FetchFailure};
