use crate::analytics::{AnalyzeOptions, BracketPolicy, ListingFilter};
use crate::domain::{PropertyType, TradeType};
use crate::scraper::{CollectorOptions, ContinuationPolicy, RequestPolicy, RetryPolicy, UpstreamFilter};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{key} is set but {requires} is not")]
    Incomplete {
        key: &'static str,
        requires: &'static str,
    },
}

/// Application configuration loaded from `.env` and the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// REGION_NAME, comma separated.
    pub regions: Vec<String>,
    pub home_complex: Option<String>,
    pub target_complexes: Vec<String>,

    /// 10k-won units.
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    /// Pyeong.
    pub area_min: Option<f64>,
    pub area_max: Option<f64>,

    pub property_type: PropertyType,
    pub trade_type: TradeType,

    pub min_delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub max_pages: u32,
    pub page_size: usize,
    pub continuation: ContinuationPolicy,
    pub bracket_width: u32,

    pub region_table_path: PathBuf,
    pub database_path: String,
    /// Coordinate used to discover regions missing from the table.
    pub fallback_center: Option<(f64, f64)>,

    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        fn parse<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
        where
            T: FromStr,
            T::Err: Display,
        {
            raw.map(|value| {
                value.parse::<T>().map_err(|e| ConfigError::Invalid {
                    key,
                    reason: e.to_string(),
                    value,
                })
            })
            .transpose()
        }

        let lat: Option<f64> = parse("REGION_LAT", get("REGION_LAT"))?;
        let lon: Option<f64> = parse("REGION_LON", get("REGION_LON"))?;
        let fallback_center = match (lat, lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    key: "REGION_LAT",
                    requires: "REGION_LON",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    key: "REGION_LON",
                    requires: "REGION_LAT",
                })
            }
            (None, None) => None,
        };

        let page_size: usize = parse("PAGE_SIZE", get("PAGE_SIZE"))?.unwrap_or(20);
        if page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "PAGE_SIZE",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            regions: split_list(get("REGION_NAME")),
            home_complex: get("MY_HOME_COMPLEX_NAME"),
            target_complexes: split_list(get("TARGET_HOME_COMPLEX_NAME")),
            price_min: parse("FILTER_DPRC_MIN", get("FILTER_DPRC_MIN"))?,
            price_max: parse("FILTER_DPRC_MAX", get("FILTER_DPRC_MAX"))?,
            area_min: parse("FILTER_SPC_MIN", get("FILTER_SPC_MIN"))?,
            area_max: parse("FILTER_SPC_MAX", get("FILTER_SPC_MAX"))?,
            property_type: parse("PROPERTY_TYPE", get("PROPERTY_TYPE"))?
                .unwrap_or(PropertyType::Apartment),
            trade_type: parse("TRADE_TYPE", get("TRADE_TYPE"))?.unwrap_or(TradeType::Sale),
            min_delay: Duration::from_millis(
                parse("API_MIN_DELAY_MS", get("API_MIN_DELAY_MS"))?.unwrap_or(1000),
            ),
            timeout: Duration::from_secs(
                parse("API_TIMEOUT_SECS", get("API_TIMEOUT_SECS"))?.unwrap_or(10),
            ),
            max_retries: parse("API_MAX_RETRIES", get("API_MAX_RETRIES"))?.unwrap_or(3),
            max_pages: parse("MAX_PAGES", get("MAX_PAGES"))?.unwrap_or(100),
            page_size,
            continuation: parse("CONTINUATION_POLICY", get("CONTINUATION_POLICY"))?
                .unwrap_or_default(),
            bracket_width: parse::<u32>("BRACKET_WIDTH_PYEONG", get("BRACKET_WIDTH_PYEONG"))?
                .unwrap_or(1)
                .max(1),
            region_table_path: get("REGION_TABLE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/regions.csv")),
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "data/land.sqlite3".to_string()),
            fallback_center,
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: get("TELEGRAM_CHAT_ID"),
        })
    }

    /// Home first, then targets. Empty when neither is configured.
    pub fn report_complexes(&self) -> Vec<String> {
        self.home_complex
            .iter()
            .chain(self.target_complexes.iter())
            .cloned()
            .collect()
    }

    pub fn analyze_options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            filter: ListingFilter {
                price_min: self.price_min,
                price_max: self.price_max,
                area_min: self.area_min,
                area_max: self.area_max,
                trade_type: Some(self.trade_type),
            },
            brackets: BracketPolicy {
                width_pyeong: self.bracket_width,
            },
        }
    }

    /// Upstream takes whole pyeong only, so area bounds are widened outward
    /// and the exact bounds are applied again during analysis.
    pub fn upstream_filter(&self) -> UpstreamFilter {
        UpstreamFilter {
            price_min: self.price_min,
            price_max: self.price_max,
            area_min: self.area_min.map(|a| a.floor() as i64),
            area_max: self.area_max.map(|a| a.ceil() as i64),
        }
    }

    pub fn collector_options(&self) -> CollectorOptions {
        CollectorOptions {
            page_size: self.page_size,
            max_pages: self.max_pages,
            continuation: self.continuation,
        }
    }

    pub fn request_policy(&self) -> RequestPolicy {
        RequestPolicy::new(
            RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
            self.min_delay,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert!(cfg.regions.is_empty());
        assert_eq!(cfg.property_type, PropertyType::Apartment);
        assert_eq!(cfg.trade_type, TradeType::Sale);
        assert_eq!(cfg.min_delay, Duration::from_millis(1000));
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.max_pages, 100);
        assert_eq!(cfg.page_size, 20);
        assert_eq!(cfg.continuation, ContinuationPolicy::FlagOrFullPage);
        assert_eq!(cfg.bracket_width, 1);
        assert_eq!(cfg.fallback_center, None);
    }

    #[test]
    fn test_lists_and_filters() {
        let cfg = config(&[
            ("REGION_NAME", "경기도 성남시 수정구 신흥동, 서울특별시 송파구 ,"),
            ("MY_HOME_COMPLEX_NAME", " 산성역포레스티아 "),
            ("TARGET_HOME_COMPLEX_NAME", "산성역자이푸르지오,e편한세상금빛그랑메종"),
            ("FILTER_DPRC_MAX", "130000"),
            ("FILTER_SPC_MIN", "24.5"),
            ("TRADE_TYPE", "B1"),
            ("CONTINUATION_POLICY", "flag-only"),
        ])
        .unwrap();

        assert_eq!(cfg.regions, vec!["경기도 성남시 수정구 신흥동", "서울특별시 송파구"]);
        assert_eq!(cfg.home_complex.as_deref(), Some("산성역포레스티아"));
        assert_eq!(cfg.report_complexes().len(), 3);
        assert_eq!(cfg.price_max, Some(130000));
        assert_eq!(cfg.trade_type, TradeType::Jeonse);
        assert_eq!(cfg.continuation, ContinuationPolicy::FlagOnly);

        let upstream = cfg.upstream_filter();
        assert_eq!(upstream.area_min, Some(24));
        assert_eq!(cfg.analyze_options().filter.area_min, Some(24.5));
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        let err = config(&[("MAX_PAGES", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MAX_PAGES", .. }));

        let err = config(&[("PAGE_SIZE", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PAGE_SIZE", .. }));

        assert!(config(&[("PROPERTY_TYPE", "CASTLE")]).is_err());
    }

    #[test]
    fn test_fallback_center_needs_both_coordinates() {
        let cfg = config(&[("REGION_LAT", "37.44"), ("REGION_LON", "127.15")]).unwrap();
        assert_eq!(cfg.fallback_center, Some((37.44, 127.15)));

        let err = config(&[("REGION_LAT", "37.44")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Incomplete {
                key: "REGION_LAT",
                requires: "REGION_LON"
            }
        );
    }
}
