// resolver.rs
use crate::domain::{PropertyType, TradeType};
use crate::region::{RegionError, RegionTable};
use crate::scraper::models::{BoundingBox, ClusterQuery};
use crate::scraper::{FetchFailure, ListingSource, RequestPolicy};

/// Where a resolved region came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSource {
    Table,
    Discovery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRegion {
    /// The label as the user wrote it.
    pub input: String,
    /// The candidate (or upstream name) that produced the match.
    pub matched_name: String,
    pub code: String,
    pub center_lat: f64,
    pub center_lon: f64,
    /// How many trailing segments were dropped before a match was found.
    pub dropped_segments: usize,
    pub source: RegionSource,
}

impl ResolvedRegion {
    pub fn is_partial_match(&self) -> bool {
        self.dropped_segments > 0
    }
}

/// Collapses runs of whitespace into single spaces.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lookup candidates from most to least specific: the full name, then the
/// name with its rightmost segment dropped, and so on down to one segment.
pub fn candidate_names(name: &str) -> Vec<String> {
    let segments: Vec<&str> = name.split_whitespace().collect();
    (1..=segments.len())
        .rev()
        .map(|n| segments[..n].join(" "))
        .collect()
}

pub fn resolve(table: &RegionTable, name: &str) -> Result<ResolvedRegion, RegionError> {
    let input = normalize_name(name);

    for (dropped_segments, candidate) in candidate_names(&input).into_iter().enumerate() {
        if let Some(row) = table.lookup(&candidate) {
            if dropped_segments > 0 {
                tracing::warn!(
                    input = %input,
                    matched = %candidate,
                    dropped_segments,
                    "region resolved by dropping trailing segments"
                );
            }
            return Ok(ResolvedRegion {
                input: name.trim().to_string(),
                matched_name: candidate,
                code: row.code.clone(),
                center_lat: row.center_lat,
                center_lon: row.center_lon,
                dropped_segments,
                source: RegionSource::Table,
            });
        }
    }

    Err(RegionError::RegionNotFound {
        name: name.trim().to_string(),
    })
}

/// Resolves every comma-separated label independently, preserving order.
/// Empty labels are ignored.
pub fn resolve_all(
    table: &RegionTable,
    names: &str,
) -> Vec<(String, Result<ResolvedRegion, RegionError>)> {
    names
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(|label| (label.to_string(), resolve(table, label)))
        .collect()
}

/// (zoom, half-extent in degrees), tightest viewport first.
const DISCOVERY_LADDER: [(u8, f64); 4] = [(17, 0.001), (16, 0.002), (15, 0.005), (14, 0.01)];

/// Asks upstream which region contains a coordinate. Used when the reference
/// table has no entry for a name.
pub fn discover_region<S: ListingSource>(
    source: &S,
    policy: &mut RequestPolicy,
    input: &str,
    center: (f64, f64),
    property_type: PropertyType,
    trade_type: TradeType,
) -> Result<ResolvedRegion, RegionError> {
    let (lat, lon) = center;
    let mut last_failure: Option<FetchFailure> = None;
    let mut answered = false;

    for (zoom, half_extent) in DISCOVERY_LADDER {
        let query = ClusterQuery {
            property_type,
            trade_type,
            bbox: BoundingBox::square(lat, lon, zoom, half_extent),
        };
        let label = format!("clusterList z={zoom}");

        let detail = match policy.run(&label, || source.fetch_cortar(&query)) {
            Ok(Some(detail)) => detail,
            Ok(None) => {
                answered = true;
                tracing::debug!(input, zoom, "no region at this zoom");
                continue;
            }
            Err(failure) => {
                tracing::warn!(input, zoom, error = %failure, "discovery request failed");
                last_failure = Some(failure);
                continue;
            }
        };

        let Some(code) = detail.cortar_no.clone() else {
            continue;
        };
        let matched_name = detail
            .region_name
            .clone()
            .or_else(|| detail.cortar_nm.clone())
            .unwrap_or_else(|| input.to_string());

        tracing::info!(input, code = %code, zoom, matched = %matched_name, "region discovered");

        return Ok(ResolvedRegion {
            input: input.to_string(),
            matched_name,
            code,
            center_lat: detail.latitude().unwrap_or(lat),
            center_lon: detail.longitude().unwrap_or(lon),
            dropped_segments: 0,
            source: RegionSource::Discovery,
        });
    }

    match last_failure {
        Some(failure) if !answered => Err(RegionError::Discovery(failure)),
        _ => Err(RegionError::RegionNotFound {
            name: input.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionRef;
    use crate::scraper::models::CortarDetail;
    use crate::scraper::ApiError;
    use crate::tests::utils::ScriptedSource;
    use serde_json::json;

    fn table() -> RegionTable {
        let row = |name: &str, code: &str| RegionRef {
            code: code.to_string(),
            name: name.to_string(),
            center_lat: 37.45,
            center_lon: 127.14,
        };
        RegionTable::from_rows(vec![
            row("경기도 성남시", "4113000000"),
            row("경기도 성남시 수정구", "4113100000"),
            row("경기도 성남시 수정구 신흥동", "4113110100"),
            row("경기도 성남시 수정구 신흥동", "9999999999"),
        ])
    }

    #[test]
    fn test_candidates_drop_rightmost_segment_and_terminate() {
        assert_eq!(
            candidate_names("경기도  성남시 수정구"),
            vec!["경기도 성남시 수정구", "경기도 성남시", "경기도"]
        );
        assert!(candidate_names("   ").is_empty());

        let long = vec!["a"; 50].join(" ");
        assert_eq!(candidate_names(&long).len(), 50);
    }

    #[test]
    fn test_exact_match() {
        let r = resolve(&table(), " 경기도 성남시   수정구 ").unwrap();
        assert_eq!(r.code, "4113100000");
        assert_eq!(r.dropped_segments, 0);
        assert_eq!(r.source, RegionSource::Table);
        assert!(!r.is_partial_match());
    }

    #[test]
    fn test_partial_match_drops_unknown_segments() {
        let r = resolve(&table(), "경기도 성남시 수정구 없는동 3가").unwrap();
        assert_eq!(r.code, "4113100000");
        assert_eq!(r.matched_name, "경기도 성남시 수정구");
        assert_eq!(r.dropped_segments, 2);
        assert!(r.is_partial_match());
    }

    #[test]
    fn test_duplicate_names_resolve_to_first_row() {
        let r = resolve(&table(), "성남시 수정구 신흥동").unwrap();
        assert_eq!(r.code, "4113110100");
    }

    #[test]
    fn test_unknown_region_is_not_found() {
        let err = resolve(&table(), "서울특별시 강남구").unwrap_err();
        assert!(matches!(err, RegionError::RegionNotFound { ref name } if name == "서울특별시 강남구"));
        assert!(matches!(resolve(&table(), ""), Err(RegionError::RegionNotFound { .. })));
    }

    #[test]
    fn test_resolve_all_splits_on_commas() {
        let results = resolve_all(&table(), "경기도 성남시 수정구, 부산광역시 ,, 성남시");
        let labels: Vec<_> = results.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["경기도 성남시 수정구", "부산광역시", "성남시"]);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert_eq!(results[2].1.as_ref().unwrap().code, "4113000000");
    }

    fn detail(code: &str) -> CortarDetail {
        serde_json::from_value(json!({
            "cortarNo": code,
            "cortarNm": "신흥동",
            "regionName": "성남시 수정구 신흥동",
            "mapYCrdn": "37.4406",
            "mapXCrdn": 127.1489
        }))
        .unwrap()
    }

    #[test]
    fn test_discovery_walks_zoom_ladder() {
        let source = ScriptedSource::new(vec![]).with_cortars(vec![Ok(None), Ok(Some(detail("4113110100")))]);
        let mut policy = RequestPolicy::immediate(0);

        let r = discover_region(
            &source,
            &mut policy,
            "신흥동",
            (37.44, 127.15),
            PropertyType::Apartment,
            TradeType::Sale,
        )
        .unwrap();

        assert_eq!(r.code, "4113110100");
        assert_eq!(r.source, RegionSource::Discovery);
        assert_eq!(r.matched_name, "성남시 수정구 신흥동");
        assert!((r.center_lat - 37.4406).abs() < 1e-9);
        assert_eq!(source.requested_zooms(), vec![17, 16]);
    }

    #[test]
    fn test_discovery_without_answer_is_not_found() {
        let source = ScriptedSource::new(vec![]);
        let mut policy = RequestPolicy::immediate(0);
        let err = discover_region(
            &source,
            &mut policy,
            "어딘가",
            (37.0, 127.0),
            PropertyType::Apartment,
            TradeType::Sale,
        )
        .unwrap_err();
        assert!(matches!(err, RegionError::RegionNotFound { .. }));
        assert_eq!(source.requested_zooms(), vec![17, 16, 15, 14]);
    }

    #[test]
    fn test_discovery_reports_request_failures() {
        let errors = (0..4)
            .map(|_| Err(ApiError::Rejected { status: 403, body: String::new() }))
            .collect();
        let source = ScriptedSource::new(vec![]).with_cortars(errors);
        let mut policy = RequestPolicy::immediate(0);
        let err = discover_region(
            &source,
            &mut policy,
            "어딘가",
            (37.0, 127.0),
            PropertyType::Apartment,
            TradeType::Sale,
        )
        .unwrap_err();
        assert!(matches!(err, RegionError::Discovery(_)));
    }
}
