// src/domain/listing.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One pyeong expressed in square metres.
pub const SQM_PER_PYEONG: f64 = 3.305785;

/// Trade type as understood by the upstream service (`tradTpCd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    /// 매매
    Sale,
    /// 전세
    Jeonse,
    /// 월세
    MonthlyRent,
}

impl TradeType {
    pub fn code(&self) -> &'static str {
        match self {
            TradeType::Sale => "A1",
            TradeType::Jeonse => "B1",
            TradeType::MonthlyRent => "B2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TradeType::Sale => "매매",
            TradeType::Jeonse => "전세",
            TradeType::MonthlyRent => "월세",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A1" | "sale" => Ok(TradeType::Sale),
            "B1" | "jeonse" => Ok(TradeType::Jeonse),
            "B2" | "monthly-rent" => Ok(TradeType::MonthlyRent),
            other => Err(format!("Invalid TradeType: {other}")),
        }
    }
}

/// Property type as understood by the upstream service (`rletTpCd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// 아파트
    Apartment,
    /// 오피스텔
    Officetel,
    /// 빌라
    Villa,
    /// 아파트 분양권
    ApartmentPresale,
    /// 재건축
    Reconstruction,
}

impl PropertyType {
    pub fn code(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "APT",
            PropertyType::Officetel => "OPST",
            PropertyType::Villa => "VL",
            PropertyType::ApartmentPresale => "ABYG",
            PropertyType::Reconstruction => "JGC",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "APT" => Ok(PropertyType::Apartment),
            "OPST" => Ok(PropertyType::Officetel),
            "VL" => Ok(PropertyType::Villa),
            "ABYG" => Ok(PropertyType::ApartmentPresale),
            "JGC" => Ok(PropertyType::Reconstruction),
            other => Err(format!("Invalid PropertyType: {other}")),
        }
    }
}

/// A listing as collected, flattened and normalized.
///
/// Upstream fields without a typed home are kept in `attributes` so that a
/// change in the upstream payload never loses data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub complex_name: String,
    pub region_code: String,
    pub trade_type: TradeType,

    /// Price in 10k-won units (deposit for jeonse/monthly rent).
    pub price_main: i64,
    /// Monthly rent in 10k-won units, 0 when not applicable.
    pub price_rent: i64,

    pub area_exclusive_pyeong: f64,
    pub area_exclusive_sqm: f64,

    /// Raw "current/total" floor string, e.g. "12/25" or "저/15".
    pub floor_info: String,
    pub confirmed_date: Option<NaiveDate>,

    pub latitude: f64,
    pub longitude: f64,
    pub building_name: String,

    pub attributes: BTreeMap<String, Value>,
}

impl Listing {
    /// Builds a `Listing` from one raw upstream article record.
    ///
    /// `region_code` is the code the request was made with; it wins over the
    /// article's own `cortarNo`, which upstream sometimes reports for a
    /// neighbouring region. `requested` is used when the record omits its trade type.
    pub fn from_article(
        mut fields: Map<String, Value>,
        region_code: &str,
        requested: TradeType,
    ) -> Result<Self, String> {
        let id = take_string(&mut fields, "atclNo")
            .filter(|s| !s.is_empty())
            .ok_or("Missing or empty atclNo")?;

        let trade_type = match take_string(&mut fields, "tradTpCd") {
            Some(code) if !code.is_empty() => code.parse::<TradeType>()?,
            _ => requested,
        };

        if let Some(article_code) = fields.get("cortarNo").and_then(value_as_string) {
            if article_code == region_code {
                fields.remove("cortarNo");
            }
        }

        let area_exclusive_sqm = take_f64(&mut fields, "spc2").unwrap_or(0.0);
        let area_exclusive_pyeong = if area_exclusive_sqm > 0.0 {
            area_exclusive_sqm / SQM_PER_PYEONG
        } else {
            0.0
        };

        let confirmed_date = take_string(&mut fields, "atclCfmYmd")
            .as_deref()
            .and_then(parse_confirmed_date);

        Ok(Self {
            id,
            complex_name: take_string(&mut fields, "atclNm").unwrap_or_default(),
            region_code: region_code.to_string(),
            trade_type,
            price_main: take_i64(&mut fields, "prc").unwrap_or(0),
            price_rent: take_i64(&mut fields, "rentPrc").unwrap_or(0),
            area_exclusive_pyeong,
            area_exclusive_sqm,
            floor_info: take_string(&mut fields, "flrInfo").unwrap_or_default(),
            confirmed_date,
            latitude: take_f64(&mut fields, "lat").unwrap_or(0.0),
            longitude: take_f64(&mut fields, "lng").unwrap_or(0.0),
            building_name: take_string(&mut fields, "bildNm").unwrap_or_default(),
            attributes: fields.into_iter().collect(),
        })
    }

    /// Current floor parsed from `floor_info`, if it is numeric.
    pub fn current_floor(&self) -> Option<i32> {
        self.floor_info.split('/').next()?.trim().parse().ok()
    }

    /// Building height from `floor_info`, e.g. 15 for "7/15".
    pub fn total_floors(&self) -> Option<i32> {
        self.floor_info.split_once('/')?.1.trim().parse().ok()
    }
}

/// Upstream renders confirmation dates as "25.10.17"; older payloads used
/// "20251017" or ISO dates.
pub fn parse_confirmed_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim().trim_end_matches('.');
    ["%y.%m.%d", "%Y.%m.%d", "%Y%m%d", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    let parsed: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let cleaned = s.trim().replace(',', "");
            cleaned
                .parse::<i64>()
                .ok()
                .or_else(|| cleaned.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    }
}

/// Removes `key` only when it converts; an unconvertible value stays in the
/// map and ends up in `attributes`.
fn take_with<T>(
    fields: &mut Map<String, Value>,
    key: &str,
    convert: fn(&Value) -> Option<T>,
) -> Option<T> {
    let converted = fields.get(key).and_then(convert)?;
    fields.remove(key);
    Some(converted)
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    take_with(fields, key, value_as_string)
}

fn take_f64(fields: &mut Map<String, Value>, key: &str) -> Option<f64> {
    take_with(fields, key, value_as_f64)
}

fn take_i64(fields: &mut Map<String, Value>, key: &str) -> Option<i64> {
    take_with(fields, key, value_as_i64)
}
