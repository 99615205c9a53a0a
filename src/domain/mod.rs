pub mod collection;
pub mod listing;

pub use collection::{complex_key, CollectionResult, CollectionStatus, ComplexInfo};
pub use listing::{Listing, PropertyType, TradeType};
