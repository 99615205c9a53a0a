// src/pipeline.rs

use crate::analytics::{build_comparison, build_report};
use crate::config::AppConfig;
use crate::db::runs::{fail_run, finish_run, latest_runs, start_run};
use crate::db::{latest_collection_date, load_listings, save_collection, Database, ListingQuery};
use crate::domain::Listing;
use crate::errors::AppError;
use crate::notify::format::{format_analysis, format_comparison, format_notes};
use crate::notify::Notifier;
use crate::region::{discover_region, resolve, RegionError, RegionTable, ResolvedRegion};
use crate::scraper::{BoundingBox, CollectionRequest, Collector, ListingSource};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;

/// What happened to one configured region during `collect`.
#[derive(Debug)]
pub struct RegionOutcome {
    pub label: String,
    pub region: Option<ResolvedRegion>,
    /// `CollectionStatus` label, when a collection ran.
    pub status: Option<&'static str>,
    pub saved: usize,
    pub error: Option<String>,
}

impl RegionOutcome {
    fn failed(label: &str, region: Option<ResolvedRegion>, error: String) -> Self {
        Self {
            label: label.to_string(),
            region,
            status: None,
            saved: 0,
            error: Some(error),
        }
    }
}

fn resolve_region<S: ListingSource>(
    config: &AppConfig,
    table: &RegionTable,
    collector: &mut Collector<S>,
    label: &str,
) -> Result<ResolvedRegion, RegionError> {
    match resolve(table, label) {
        Err(RegionError::RegionNotFound { .. }) if config.fallback_center.is_some() => {
            let center = config.fallback_center.unwrap_or_default();
            tracing::info!(label, ?center, "region not in table, trying discovery");
            let (source, policy) = collector.parts_mut();
            discover_region(
                source,
                policy,
                label,
                center,
                config.property_type,
                config.trade_type,
            )
        }
        other => other,
    }
}

/// Collects and stores every configured region, one after another. A region
/// that fails never stops the others.
pub fn run_collection<S: ListingSource>(
    config: &AppConfig,
    table: &RegionTable,
    collector: &mut Collector<S>,
    db: &Database,
    collected_on: NaiveDate,
) -> Vec<RegionOutcome> {
    let mut outcomes = Vec::new();

    for label in &config.regions {
        let region = match resolve_region(config, table, collector, label) {
            Ok(region) => region,
            Err(e) => {
                tracing::warn!(label = %label, error = %e, "skipping region");
                outcomes.push(RegionOutcome::failed(label, None, e.to_string()));
                continue;
            }
        };

        let run_id = match start_run(db, &region.code, label, Utc::now().timestamp()) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(label = %label, error = %e, "failed to record run start");
                outcomes.push(RegionOutcome::failed(label, Some(region), e.to_string()));
                continue;
            }
        };

        let request = CollectionRequest {
            region_code: region.code.clone(),
            trade_type: config.trade_type,
            property_type: config.property_type,
            bbox: BoundingBox::around_region(region.center_lat, region.center_lon),
            filter: config.upstream_filter(),
        };
        let result = collector.collect_region(&request);

        let outcome = match save_collection(db, &result, label, collected_on) {
            Ok(saved) => {
                if let Err(e) = finish_run(db, run_id, Utc::now().timestamp(), &result, saved, None) {
                    tracing::error!(label = %label, error = %e, "failed to record run end");
                }
                RegionOutcome {
                    label: label.clone(),
                    region: Some(region),
                    status: Some(result.status.label()),
                    saved,
                    error: result.status.describe(),
                }
            }
            Err(e) => {
                tracing::error!(label = %label, error = %e, "failed to store listings");
                if let Err(run_err) = fail_run(db, run_id, Utc::now().timestamp(), &e.to_string()) {
                    tracing::error!(label = %label, error = %run_err, "failed to record run failure");
                }
                RegionOutcome::failed(label, Some(region), e.to_string())
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}

/// Date range for `report`. With neither bound set each region's most recent
/// collection is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Keeps the last occurrence of each (region, listing id). Input is ordered by
/// collection date, so the newest snapshot wins.
fn latest_snapshot(listings: Vec<Listing>) -> Vec<Listing> {
    let mut position: HashMap<(String, String), usize> = HashMap::new();
    let mut out: Vec<Listing> = Vec::with_capacity(listings.len());
    for listing in listings {
        let key = (listing.region_code.clone(), listing.id.clone());
        match position.get(&key) {
            Some(&i) => out[i] = listing,
            None => {
                position.insert(key, out.len());
                out.push(listing);
            }
        }
    }
    out
}

/// Loads stored listings for the configured regions and renders the report
/// messages: the per-complex analysis, then the comparison when a home and at
/// least one target are configured.
pub fn build_report_messages(
    config: &AppConfig,
    table: &RegionTable,
    db: &Database,
    range: ReportRange,
    generated_at: NaiveDateTime,
) -> Result<Vec<String>, AppError> {
    let mut notes = Vec::new();
    let runs = latest_runs(db, 0)?;

    let mut regions: Vec<(String, String)> = Vec::new();
    for label in &config.regions {
        let code = match resolve(table, label) {
            Ok(r) => Some(r.code),
            Err(_) => runs.iter().find(|r| &r.region_name == label).map(|r| r.region_code.clone()),
        };
        match code {
            Some(code) => regions.push((label.clone(), code)),
            None => notes.push(format!("지역 {label}: 지역 코드를 찾을 수 없음")),
        }
    }

    for (label, code) in &regions {
        if let Some(run) = runs.iter().find(|r| &r.region_code == code) {
            if run.is_partial() {
                let why = run.error_message.as_deref().unwrap_or("원인 불명");
                notes.push(format!("지역 {label}: 최근 수집 {} ({why})", run.status));
            }
        }
    }

    let mut listings = Vec::new();
    let mut skipped = 0;
    if range.from.is_none() && range.to.is_none() {
        for (label, code) in &regions {
            let Some(latest) = latest_collection_date(db, code)? else {
                notes.push(format!("지역 {label}: 저장된 데이터 없음"));
                continue;
            };
            let loaded = load_listings(
                db,
                &ListingQuery {
                    region_codes: vec![code.clone()],
                    from: Some(latest),
                    to: Some(latest),
                },
            )?;
            skipped += loaded.skipped;
            listings.extend(loaded.listings);
        }
    } else if !regions.is_empty() {
        let loaded = load_listings(
            db,
            &ListingQuery {
                region_codes: regions.iter().map(|(_, code)| code.clone()).collect(),
                from: range.from,
                to: range.to,
            },
        )?;
        skipped += loaded.skipped;
        listings.extend(loaded.listings);
    }
    let listings = latest_snapshot(listings);

    if skipped > 0 {
        notes.push(format!("손상된 저장 레코드 {skipped}건 제외"));
    }

    let options = config.analyze_options();
    let report = build_report(&listings, &config.report_complexes(), &options);
    for name in report.complexes_without_data() {
        notes.push(format!("단지 {name}: 조건에 맞는 매물 없음"));
    }

    tracing::info!(
        listings = listings.len(),
        complexes = report.complexes.len(),
        notes = notes.len(),
        "report built"
    );

    let mut messages = vec![format!(
        "{}{}",
        format_analysis(&report, generated_at),
        format_notes(&notes)
    )];

    if let Some(home) = &config.home_complex {
        if !config.target_complexes.is_empty() {
            let comparison = build_comparison(&listings, home, &config.target_complexes, &options);
            messages.push(format_comparison(&comparison, generated_at));
        }
    }

    Ok(messages)
}

/// Sends every message, stopping at the first delivery failure.
pub fn deliver(notifier: &dyn Notifier, messages: &[String]) -> Result<(), AppError> {
    for (i, message) in messages.iter().enumerate() {
        notifier.send(message)?;
        tracing::info!(message = i + 1, total = messages.len(), "report delivered");
    }
    Ok(())
}
