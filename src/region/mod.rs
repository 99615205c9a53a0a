pub mod region_error;
pub mod resolver;
pub mod table;

pub use region_error::RegionError;
pub use resolver::{
    candidate_names, discover_region, normalize_name, resolve, resolve_all, RegionSource,
    ResolvedRegion,
};
pub use table::{RegionRef, RegionTable};
