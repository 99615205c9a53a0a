pub mod connection;
pub mod listings;
pub mod runs;
mod store_error;

pub use connection::{init_db, Database};
pub use listings::{latest_collection_date, load_listings, save_collection, ListingQuery};
pub use runs::{finish_run, latest_runs, start_run, CollectionRun};
pub use store_error::StoreError;
