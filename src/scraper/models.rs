use crate::domain::{PropertyType, TradeType};
use serde::Deserialize;
use serde_json::{Map, Value};

// articleList response
//  ├── code         "success" on success
//  ├── more         upstream hint that another page exists
//  ├── page         echoed page number (number or string)
//  └── body[]       article records
//       ├── atclNo, atclNm, cortarNo
//       ├── tradTpCd, prc, rentPrc
//       ├── spc1 (supply m²), spc2 (exclusive m²)
//       ├── flrInfo, atclCfmYmd, bildNm
//       └── lat, lng, ... (kept as open attributes)

#[derive(Debug, Deserialize)]
pub struct ArticlePage {
    pub code: String,
    #[serde(default)]
    pub more: bool,
    #[serde(default)]
    pub page: Option<Value>,
    #[serde(default)]
    pub body: Vec<Map<String, Value>>,
}

impl ArticlePage {
    pub fn echoed_page(&self) -> Option<u32> {
        match self.page.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|p| u32::try_from(p).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

// clusterList response
//  ├── code
//  └── data
//       └── cortar
//            └── detail
//                 ├── cortarNo, cortarNm, regionName
//                 └── mapXCrdn (lon), mapYCrdn (lat)

#[derive(Debug, Deserialize)]
pub struct ClusterListResponse {
    pub code: String,
    #[serde(default)]
    pub data: Option<ClusterData>,
}

#[derive(Debug, Deserialize)]
pub struct ClusterData {
    #[serde(default)]
    pub cortar: Option<Cortar>,
}

#[derive(Debug, Deserialize)]
pub struct Cortar {
    #[serde(default)]
    pub detail: Option<CortarDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CortarDetail {
    pub cortar_no: Option<String>,
    pub cortar_nm: Option<String>,
    pub region_name: Option<String>,
    pub map_x_crdn: Option<Value>,
    pub map_y_crdn: Option<Value>,
}

impl CortarDetail {
    pub fn latitude(&self) -> Option<f64> {
        self.map_y_crdn.as_ref().and_then(coordinate)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.map_x_crdn.as_ref().and_then(coordinate)
    }
}

fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Map viewport sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub btm: f64,
    pub lft: f64,
    pub top: f64,
    pub rgt: f64,
}

impl BoundingBox {
    pub const REGION_ZOOM: u8 = 14;
    pub const REGION_HALF_LAT: f64 = 0.0417;
    pub const REGION_HALF_LON: f64 = 0.0730;

    /// Viewport wide enough to cover a whole neighbourhood at zoom 14.
    pub fn around_region(center_lat: f64, center_lon: f64) -> Self {
        Self {
            center_lat,
            center_lon,
            zoom: Self::REGION_ZOOM,
            btm: center_lat - Self::REGION_HALF_LAT,
            lft: center_lon - Self::REGION_HALF_LON,
            top: center_lat + Self::REGION_HALF_LAT,
            rgt: center_lon + Self::REGION_HALF_LON,
        }
    }

    pub fn square(center_lat: f64, center_lon: f64, zoom: u8, half_extent: f64) -> Self {
        Self {
            center_lat,
            center_lon,
            zoom,
            btm: center_lat - half_extent,
            lft: center_lon - half_extent,
            top: center_lat + half_extent,
            rgt: center_lon + half_extent,
        }
    }
}

/// Optional upstream-side filters. Prices in 10k won, areas in pyeong.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpstreamFilter {
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub area_min: Option<i64>,
    pub area_max: Option<i64>,
}

/// One articleList request.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleQuery {
    pub region_code: String,
    pub property_type: PropertyType,
    pub trade_type: TradeType,
    pub bbox: BoundingBox,
    pub page: u32,
    pub filter: UpstreamFilter,
}

impl ArticleQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let b = &self.bbox;
        let mut params = vec![
            ("rletTpCd", self.property_type.code().to_string()),
            ("tradTpCd", self.trade_type.code().to_string()),
            ("z", b.zoom.to_string()),
            ("lat", b.center_lat.to_string()),
            ("lon", b.center_lon.to_string()),
            ("btm", b.btm.to_string()),
            ("lft", b.lft.to_string()),
            ("top", b.top.to_string()),
            ("rgt", b.rgt.to_string()),
            ("showR0", String::new()),
            ("cortarNo", self.region_code.clone()),
        ];

        let f = &self.filter;
        let optional = [
            ("dprcMin", f.price_min),
            ("dprcMax", f.price_max),
            ("spcMin", f.area_min),
            ("spcMax", f.area_max),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                params.push((key, v.to_string()));
            }
        }

        // Upstream's own pages never send page=1.
        if self.page > 1 {
            params.push(("page", self.page.to_string()));
        }
        params
    }
}

/// One clusterList request used for region discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterQuery {
    pub property_type: PropertyType,
    pub trade_type: TradeType,
    pub bbox: BoundingBox,
}

impl ClusterQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let b = &self.bbox;
        vec![
            ("view", "atcl".to_string()),
            ("rletTpCd", self.property_type.code().to_string()),
            ("tradTpCd", self.trade_type.code().to_string()),
            ("z", b.zoom.to_string()),
            ("lat", b.center_lat.to_string()),
            ("lon", b.center_lon.to_string()),
            ("btm", b.btm.to_string()),
            ("lft", b.lft.to_string()),
            ("top", b.top.to_string()),
            ("rgt", b.rgt.to_string()),
            ("pCortarNo", String::new()),
            ("addon", "COMPLEX".to_string()),
            ("isOnlyIsale", "false".to_string()),
        ]
    }
}
