// src/domain/collection.rs

use crate::domain::listing::Listing;
use crate::scraper::FetchFailure;
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata about a complex seen while collecting a region.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexInfo {
    pub name: String,
    /// Coordinate of the first listing seen for the complex.
    pub latitude: f64,
    pub longitude: f64,
    pub listing_count: usize,
    /// Only present when upstream ships it with the listing.
    pub median_unit_price: Option<f64>,
}

/// How a region collection ended.
#[derive(Debug, Clone)]
pub enum CollectionStatus {
    Complete,
    /// The page safety bound was hit; more data may exist upstream.
    Truncated { max_pages: u32 },
    /// The caller raised the stop flag at a page boundary.
    Cancelled { after_page: u32 },
    /// A page could not be fetched; listings from earlier pages are kept.
    Failed { page: u32, failure: FetchFailure },
}

impl CollectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CollectionStatus::Complete => "complete",
            CollectionStatus::Truncated { .. } => "truncated",
            CollectionStatus::Cancelled { .. } => "cancelled",
            CollectionStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_partial(&self) -> bool {
        !matches!(self, CollectionStatus::Complete)
    }

    pub fn describe(&self) -> Option<String> {
        match self {
            CollectionStatus::Complete => None,
            CollectionStatus::Truncated { max_pages } => {
                Some(format!("stopped at the {max_pages}-page limit"))
            }
            CollectionStatus::Cancelled { after_page } => {
                Some(format!("cancelled after page {after_page}"))
            }
            CollectionStatus::Failed { page, failure } => {
                Some(format!("page {page} failed: {failure}"))
            }
        }
    }
}

/// Everything one region collection produced.
#[derive(Debug, Clone)]
pub struct CollectionResult {
    pub region_code: String,
    pub listings: Vec<Listing>,
    /// Keyed by normalized complex name.
    pub complexes: BTreeMap<String, ComplexInfo>,
    pub status: CollectionStatus,
    pub pages_fetched: u32,
    pub duplicates_dropped: usize,
    pub records_skipped: usize,
}

impl CollectionResult {
    pub fn new(region_code: impl Into<String>) -> Self {
        Self {
            region_code: region_code.into(),
            listings: Vec::new(),
            complexes: BTreeMap::new(),
            status: CollectionStatus::Complete,
            pages_fetched: 0,
            duplicates_dropped: 0,
            records_skipped: 0,
        }
    }

    /// Appends a listing and folds it into the complex index.
    /// The caller is responsible for deduplication.
    pub fn push(&mut self, listing: Listing) {
        let key = complex_key(&listing.complex_name);
        if !key.is_empty() {
            let unit_price = listing
                .attributes
                .get("dealMedianUnitPrice")
                .and_then(unit_price_value);

            let entry = self.complexes.entry(key).or_insert_with(|| ComplexInfo {
                name: listing.complex_name.trim().to_string(),
                latitude: listing.latitude,
                longitude: listing.longitude,
                listing_count: 0,
                median_unit_price: None,
            });
            entry.listing_count += 1;
            if entry.median_unit_price.is_none() {
                entry.median_unit_price = unit_price;
            }
        }
        self.listings.push(listing);
    }
}

/// Case- and whitespace-insensitive complex key: "산성역 포레스티아" and
/// "산성역포레스티아" are the same complex.
pub fn complex_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn unit_price_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}
