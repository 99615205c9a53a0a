// src/analytics/report.rs

use crate::analytics::{
    BracketPolicy, DirectionSummary, FloorSummary, ListingFilter, PriceStats, SizeBracket,
};
use crate::domain::{complex_key, Listing};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    pub filter: ListingFilter,
    pub brackets: BracketPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketStats {
    pub bracket: SizeBracket,
    pub stats: PriceStats,
}

/// Per-bracket price statistics for one complex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexReport {
    pub complex_name: String,
    /// Listings that passed the filter and landed in a bracket.
    pub listing_count: usize,
    /// Ascending by bracket. Empty means "no data".
    pub brackets: Vec<BracketStats>,
    /// Across all brackets.
    pub overall: Option<PriceStats>,
    pub floors: Option<FloorSummary>,
    pub direction: Option<DirectionSummary>,
}

impl ComplexReport {
    pub fn has_data(&self) -> bool {
        !self.brackets.is_empty()
    }

    pub fn stats_for(&self, bracket: SizeBracket) -> Option<&PriceStats> {
        self.brackets
            .iter()
            .find(|b| b.bracket == bracket)
            .map(|b| &b.stats)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub complexes: Vec<ComplexReport>,
    /// Listings of the selected complexes rejected by the price/area/trade filter.
    pub excluded_by_filter: usize,
    /// Listings that passed the filter but have no usable area.
    pub without_area: usize,
    /// Listings without a complex name; never part of any complex.
    pub without_name: usize,
}

impl AnalyticsReport {
    pub fn complexes_without_data(&self) -> Vec<&str> {
        self.complexes
            .iter()
            .filter(|c| !c.has_data())
            .map(|c| c.complex_name.as_str())
            .collect()
    }
}

/// Difference between a target's median and the home complex's median.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MedianGap {
    /// target − home, in 10k won.
    pub absolute: f64,
    /// Relative to the home median; `None` when the home median is zero.
    pub percent: Option<f64>,
}

impl MedianGap {
    pub fn between(home: &PriceStats, target: &PriceStats) -> Self {
        let absolute = target.median - home.median;
        let percent = (home.median != 0.0).then(|| absolute / home.median * 100.0);
        Self { absolute, percent }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketComparison {
    pub bracket: SizeBracket,
    pub home: Option<PriceStats>,
    /// One entry per target, in configured order.
    pub targets: Vec<Option<PriceStats>>,
    /// Gap per target; present only when both sides have data.
    pub gaps: Vec<Option<MedianGap>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub home: ComplexReport,
    pub targets: Vec<ComplexReport>,
    /// Union of all brackets, ascending.
    pub rows: Vec<BracketComparison>,
}

impl ComparisonReport {
    /// Home first, then targets in configured order.
    pub fn complexes(&self) -> impl Iterator<Item = &ComplexReport> {
        std::iter::once(&self.home).chain(self.targets.iter())
    }
}

#[derive(Default)]
struct Exclusions {
    by_filter: usize,
    without_area: usize,
}

/// Groups by complex key. Listings with a blank name are only counted.
fn group_by_complex(listings: &[Listing]) -> (BTreeMap<String, Vec<&Listing>>, usize) {
    let mut groups: BTreeMap<String, Vec<&Listing>> = BTreeMap::new();
    let mut without_name = 0;
    for listing in listings {
        let key = complex_key(&listing.complex_name);
        if key.is_empty() {
            without_name += 1;
            continue;
        }
        groups.entry(key).or_default().push(listing);
    }
    (groups, without_name)
}

fn summarize(
    name: &str,
    listings: &[&Listing],
    options: &AnalyzeOptions,
    excluded: &mut Exclusions,
) -> ComplexReport {
    let mut by_bracket: BTreeMap<SizeBracket, Vec<i64>> = BTreeMap::new();
    let mut all_prices = Vec::new();
    let mut kept: Vec<&Listing> = Vec::new();

    for &listing in listings {
        if !options.filter.matches(listing) {
            excluded.by_filter += 1;
            continue;
        }
        let Some(bracket) = options.brackets.bracket_for(listing.area_exclusive_pyeong) else {
            excluded.without_area += 1;
            continue;
        };
        by_bracket.entry(bracket).or_default().push(listing.price_main);
        all_prices.push(listing.price_main);
        kept.push(listing);
    }

    let brackets = by_bracket
        .into_iter()
        .filter_map(|(bracket, prices)| {
            PriceStats::from_prices(&prices).map(|stats| BracketStats { bracket, stats })
        })
        .collect();

    ComplexReport {
        complex_name: name.to_string(),
        listing_count: all_prices.len(),
        brackets,
        overall: PriceStats::from_prices(&all_prices),
        floors: FloorSummary::from_listings(&kept),
        direction: DirectionSummary::from_listings(&kept),
    }
}

/// Drops blank names and later duplicates (by complex key), keeping order.
fn distinct_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .map(str::trim)
        .filter(|n| !n.is_empty() && seen.insert(complex_key(n)))
        .collect()
}

/// Per-complex, per-bracket price statistics.
///
/// With an empty `complex_filter` every complex in `listings` is reported,
/// ordered by complex key. Otherwise the named complexes are reported in the
/// given order, each one present even when it has no listings.
pub fn build_report(
    listings: &[Listing],
    complex_filter: &[String],
    options: &AnalyzeOptions,
) -> AnalyticsReport {
    let (groups, without_name) = group_by_complex(listings);
    let mut excluded = Exclusions::default();

    let complexes = if complex_filter.is_empty() {
        groups
            .values()
            .map(|group| {
                let name = group[0].complex_name.trim();
                summarize(name, group, options, &mut excluded)
            })
            .collect()
    } else {
        distinct_names(complex_filter.iter().map(String::as_str))
            .into_iter()
            .map(|name| {
                let group = groups.get(&complex_key(name)).map(Vec::as_slice).unwrap_or(&[]);
                summarize(name, group, options, &mut excluded)
            })
            .collect()
    };

    AnalyticsReport {
        complexes,
        excluded_by_filter: excluded.by_filter,
        without_area: excluded.without_area,
        without_name,
    }
}

/// Compares the home complex against each target, bracket by bracket.
/// A target with the same key as the home complex (or an earlier target) is ignored.
pub fn build_comparison(
    listings: &[Listing],
    home: &str,
    targets: &[String],
    options: &AnalyzeOptions,
) -> ComparisonReport {
    let names = distinct_names(std::iter::once(home).chain(targets.iter().map(String::as_str)));
    let home_key = complex_key(home);

    let mut report = build_report(
        listings,
        &names.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
        options,
    );

    // distinct_names drops a blank home; keep a placeholder so home stays first.
    let home_report = if report
        .complexes
        .first()
        .is_some_and(|c| !home_key.is_empty() && complex_key(&c.complex_name) == home_key)
    {
        report.complexes.remove(0)
    } else {
        summarize(home.trim(), &[], options, &mut Exclusions::default())
    };
    let target_reports = report.complexes;

    let all_brackets: BTreeSet<SizeBracket> = std::iter::once(&home_report)
        .chain(target_reports.iter())
        .flat_map(|c| c.brackets.iter().map(|b| b.bracket))
        .collect();

    let rows = all_brackets
        .into_iter()
        .map(|bracket| {
            let home_stats = home_report.stats_for(bracket).cloned();
            let target_stats: Vec<Option<PriceStats>> = target_reports
                .iter()
                .map(|t| t.stats_for(bracket).cloned())
                .collect();
            let gaps = target_stats
                .iter()
                .map(|t| match (&home_stats, t) {
                    (Some(h), Some(t)) => Some(MedianGap::between(h, t)),
                    _ => None,
                })
                .collect();
            BracketComparison {
                bracket,
                home: home_stats,
                targets: target_stats,
                gaps,
            }
        })
        .collect();

    ComparisonReport {
        home: home_report,
        targets: target_reports,
        rows,
    }
}
