use crate::domain::Listing;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const LOW_MAX: i32 = 10;
const MID_MAX: i32 = 20;
/// Share of the building height from which a floor counts as upper.
const UPPER_SHARE: f64 = 0.8;

/// Floor bands over the listings whose `floor_info` starts with a number.
/// Floors given only as 저/중/고 are not counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FloorSummary {
    pub parsed: usize,
    /// Floors up to 10.
    pub low: usize,
    /// 11 to 20.
    pub mid: usize,
    /// Above 20.
    pub high: usize,
    /// In the top fifth of their building, when the total is known.
    pub upper: usize,
}

impl FloorSummary {
    pub fn from_listings(listings: &[&Listing]) -> Option<Self> {
        let mut summary = Self::default();
        for listing in listings {
            let Some(floor) = listing.current_floor() else {
                continue;
            };
            summary.parsed += 1;
            match floor {
                f if f <= LOW_MAX => summary.low += 1,
                f if f <= MID_MAX => summary.mid += 1,
                _ => summary.high += 1,
            }
            if let Some(total) = listing.total_floors().filter(|&t| t > 0) {
                if f64::from(floor) / f64::from(total) >= UPPER_SHARE {
                    summary.upper += 1;
                }
            }
        }
        (summary.parsed > 0).then_some(summary)
    }

    pub fn upper_ratio(&self) -> f64 {
        if self.parsed == 0 {
            0.0
        } else {
            self.upper as f64 / self.parsed as f64
        }
    }
}

/// Most common facing direction, read from the upstream `direction` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionSummary {
    pub most_common: String,
    pub count: usize,
    /// Distinct directions seen.
    pub varieties: usize,
}

impl DirectionSummary {
    pub fn from_listings(listings: &[&Listing]) -> Option<Self> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for listing in listings {
            let direction = listing
                .attributes
                .get("direction")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|d| !d.is_empty());
            if let Some(direction) = direction {
                *counts.entry(direction).or_default() += 1;
            }
        }

        let varieties = counts.len();
        // Ties go to the name that sorts first.
        let (name, count) = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))?;
        Some(Self {
            most_common: name.to_string(),
            count,
            varieties,
        })
    }
}
