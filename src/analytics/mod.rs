pub mod bracket;
pub mod filter;
pub mod floors;
pub mod report;
pub mod stats;

pub use bracket::{BracketPolicy, SizeBracket};
pub use filter::ListingFilter;
pub use floors::{DirectionSummary, FloorSummary};
pub use report::{
    build_comparison, build_report, AnalyticsReport, AnalyzeOptions, BracketComparison,
    BracketStats, ComparisonReport, ComplexReport, MedianGap,
};
pub use stats::PriceStats;
