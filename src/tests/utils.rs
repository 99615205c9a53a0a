use crate::db::connection::{init_db, Database};
use crate::domain::{Listing, TradeType};
use crate::scraper::models::{ArticlePage, ArticleQuery, ClusterQuery, CortarDetail};
use crate::scraper::{ApiError, ListingSource};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

/// Initialize a fresh, uniquely named test DB using the production schema.
pub fn init_test_db() -> Database {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let path = std::env::temp_dir().join(format!(
        "land_scraper_test_{}_{nanos}.sqlite3",
        std::process::id()
    ));
    let db = Database::new(path.to_string_lossy());

    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));
    db
}

/// A raw upstream article record.
pub fn article(id: &str, complex: &str, price: i64, sqm: f64) -> Map<String, Value> {
    match json!({
        "atclNo": id,
        "atclNm": complex,
        "tradTpCd": "A1",
        "prc": price.to_string(),
        "rentPrc": 0,
        "spc1": format!("{:.0}", sqm * 1.3),
        "spc2": sqm.to_string(),
        "flrInfo": "7/15",
        "atclCfmYmd": "25.10.17.",
        "lat": 37.4441,
        "lng": 127.1529,
        "bildNm": "101동",
        "direction": "남향"
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// A successful articleList page holding one record per id.
pub fn page_of(ids: &[String], more: bool) -> ArticlePage {
    ArticlePage {
        code: "success".to_string(),
        more,
        page: None,
        body: ids
            .iter()
            .map(|id| article(id, "테스트단지", 100_000, 84.0))
            .collect(),
    }
}

/// A normalized listing with only the fields analytics care about.
pub fn listing(id: &str, complex: &str, price: i64, pyeong: f64) -> Listing {
    Listing {
        id: id.to_string(),
        complex_name: complex.to_string(),
        region_code: "4113110100".to_string(),
        trade_type: TradeType::Sale,
        price_main: price,
        price_rent: 0,
        area_exclusive_pyeong: pyeong,
        area_exclusive_sqm: pyeong * crate::domain::listing::SQM_PER_PYEONG,
        floor_info: "5/20".to_string(),
        confirmed_date: None,
        latitude: 37.44,
        longitude: 127.15,
        building_name: String::new(),
        attributes: BTreeMap::new(),
    }
}

/// Plays back scripted responses in order and records what was asked.
///
/// Once a script runs dry, article requests get an empty last page and
/// cluster requests get "no region".
pub struct ScriptedSource {
    pages: RefCell<VecDeque<Result<ArticlePage, ApiError>>>,
    cortars: RefCell<VecDeque<Result<Option<CortarDetail>, ApiError>>>,
    requested_pages: RefCell<Vec<u32>>,
    requested_zooms: RefCell<Vec<u8>>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<Result<ArticlePage, ApiError>>) -> Self {
        Self {
            pages: RefCell::new(pages.into()),
            cortars: RefCell::new(VecDeque::new()),
            requested_pages: RefCell::new(Vec::new()),
            requested_zooms: RefCell::new(Vec::new()),
        }
    }

    pub fn with_cortars(self, cortars: Vec<Result<Option<CortarDetail>, ApiError>>) -> Self {
        *self.cortars.borrow_mut() = cortars.into();
        self
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested_pages.borrow().clone()
    }

    pub fn requested_zooms(&self) -> Vec<u8> {
        self.requested_zooms.borrow().clone()
    }
}

impl ListingSource for ScriptedSource {
    fn fetch_articles(&self, query: &ArticleQuery) -> Result<ArticlePage, ApiError> {
        self.requested_pages.borrow_mut().push(query.page);
        self.pages.borrow_mut().pop_front().unwrap_or_else(|| {
            Ok(ArticlePage {
                code: "success".to_string(),
                more: false,
                page: None,
                body: Vec::new(),
            })
        })
    }

    fn fetch_cortar(&self, query: &ClusterQuery) -> Result<Option<CortarDetail>, ApiError> {
        self.requested_zooms.borrow_mut().push(query.bbox.zoom);
        self.cortars.borrow_mut().pop_front().unwrap_or(Ok(None))
    }
}
