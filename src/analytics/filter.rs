use crate::domain::{Listing, TradeType};

/// Inclusive bounds applied before grouping. Prices in 10k won, areas in pyeong.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ListingFilter {
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub area_min: Option<f64>,
    pub area_max: Option<f64>,
    pub trade_type: Option<TradeType>,
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        let price = listing.price_main;
        let area = listing.area_exclusive_pyeong;

        self.price_min.map_or(true, |min| price >= min)
            && self.price_max.map_or(true, |max| price <= max)
            && self.area_min.map_or(true, |min| area >= min)
            && self.area_max.map_or(true, |max| area <= max)
            && self.trade_type.map_or(true, |t| listing.trade_type == t)
    }
}
