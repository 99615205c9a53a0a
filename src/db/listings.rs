use crate::db::connection::Database;
use crate::db::StoreError;
use crate::domain::{CollectionResult, Listing, TradeType};
use chrono::NaiveDate;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which stored listings to load. Empty `region_codes` means every region;
/// date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    pub region_codes: Vec<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default)]
pub struct LoadedListings {
    pub listings: Vec<Listing>,
    /// Rows that could not be turned back into a `Listing`.
    pub skipped: usize,
}

/// Writes one collection as the dataset for (region, date). Re-collecting the
/// same region on the same day updates rows in place.
pub fn save_collection(
    db: &Database,
    result: &CollectionResult,
    region_name: &str,
    collected_on: NaiveDate,
) -> Result<usize, StoreError> {
    let collected_on = collected_on.format("%Y-%m-%d").to_string();

    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO listings (
                    region_code, collected_on, listing_id, region_name, complex_name,
                    trade_type, price_main, price_rent, area_exclusive_pyeong,
                    area_exclusive_sqm, floor_info, confirmed_date, latitude, longitude,
                    building_name, attributes
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                ON CONFLICT(region_code, collected_on, listing_id) DO UPDATE SET
                    region_name           = excluded.region_name,
                    complex_name          = excluded.complex_name,
                    trade_type            = excluded.trade_type,
                    price_main            = excluded.price_main,
                    price_rent            = excluded.price_rent,
                    area_exclusive_pyeong = excluded.area_exclusive_pyeong,
                    area_exclusive_sqm    = excluded.area_exclusive_sqm,
                    floor_info            = excluded.floor_info,
                    confirmed_date        = excluded.confirmed_date,
                    latitude              = excluded.latitude,
                    longitude             = excluded.longitude,
                    building_name         = excluded.building_name,
                    attributes            = excluded.attributes
                "#,
            )?;

            for listing in &result.listings {
                let attributes = serde_json::to_string(&listing.attributes)?;
                let confirmed = listing
                    .confirmed_date
                    .map(|d| d.format("%Y-%m-%d").to_string());

                stmt.execute(params![
                    result.region_code,
                    collected_on,
                    listing.id,
                    region_name,
                    listing.complex_name,
                    listing.trade_type.code(),
                    listing.price_main,
                    listing.price_rent,
                    listing.area_exclusive_pyeong,
                    listing.area_exclusive_sqm,
                    listing.floor_info,
                    confirmed,
                    listing.latitude,
                    listing.longitude,
                    listing.building_name,
                    attributes,
                ])?;
            }
        }
        tx.commit()?;
        Ok(result.listings.len())
    })
}

struct RawRow {
    listing_id: String,
    region_code: String,
    complex_name: String,
    trade_type: String,
    price_main: i64,
    price_rent: i64,
    area_exclusive_pyeong: f64,
    area_exclusive_sqm: f64,
    floor_info: String,
    confirmed_date: Option<String>,
    latitude: f64,
    longitude: f64,
    building_name: String,
    attributes: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            listing_id: row.get(0)?,
            region_code: row.get(1)?,
            complex_name: row.get(2)?,
            trade_type: row.get(3)?,
            price_main: row.get(4)?,
            price_rent: row.get(5)?,
            area_exclusive_pyeong: row.get(6)?,
            area_exclusive_sqm: row.get(7)?,
            floor_info: row.get(8)?,
            confirmed_date: row.get(9)?,
            latitude: row.get(10)?,
            longitude: row.get(11)?,
            building_name: row.get(12)?,
            attributes: row.get(13)?,
        })
    }

    fn into_listing(self) -> Result<Listing, String> {
        let trade_type: TradeType = self.trade_type.parse()?;
        let attributes: BTreeMap<String, Value> = serde_json::from_str(&self.attributes)
            .map_err(|e| format!("bad attributes JSON: {e}"))?;
        let confirmed_date = self
            .confirmed_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        Ok(Listing {
            id: self.listing_id,
            complex_name: self.complex_name,
            region_code: self.region_code,
            trade_type,
            price_main: self.price_main,
            price_rent: self.price_rent,
            area_exclusive_pyeong: self.area_exclusive_pyeong,
            area_exclusive_sqm: self.area_exclusive_sqm,
            floor_info: self.floor_info,
            confirmed_date,
            latitude: self.latitude,
            longitude: self.longitude,
            building_name: self.building_name,
            attributes,
        })
    }
}

/// Loads stored listings. Rows that no longer decode are skipped and counted
/// instead of failing the whole load.
pub fn load_listings(db: &Database, query: &ListingQuery) -> Result<LoadedListings, StoreError> {
    let mut sql = String::from(
        "SELECT listing_id, region_code, complex_name, trade_type, price_main, price_rent, \
         area_exclusive_pyeong, area_exclusive_sqm, floor_info, confirmed_date, latitude, \
         longitude, building_name, attributes FROM listings WHERE 1 = 1",
    );
    let mut args: Vec<SqlValue> = Vec::new();

    if !query.region_codes.is_empty() {
        let placeholders = vec!["?"; query.region_codes.len()].join(", ");
        sql.push_str(&format!(" AND region_code IN ({placeholders})"));
        args.extend(query.region_codes.iter().cloned().map(SqlValue::Text));
    }
    if let Some(from) = query.from {
        sql.push_str(" AND collected_on >= ?");
        args.push(SqlValue::Text(from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = query.to {
        sql.push_str(" AND collected_on <= ?");
        args.push(SqlValue::Text(to.format("%Y-%m-%d").to_string()));
    }
    sql.push_str(" ORDER BY collected_on, region_code, rowid");

    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), RawRow::from_row)?;

        let mut loaded = LoadedListings::default();
        for row in rows {
            let decoded = match row {
                Ok(raw) => {
                    let id = raw.listing_id.clone();
                    raw.into_listing().map_err(|reason| format!("listing {id}: {reason}"))
                }
                Err(e) => Err(e.to_string()),
            };
            match decoded {
                Ok(listing) => loaded.listings.push(listing),
                Err(reason) => {
                    loaded.skipped += 1;
                    tracing::warn!(%reason, "skipping malformed stored listing");
                }
            }
        }
        Ok(loaded)
    })
}

/// Most recent collection date stored for a region.
pub fn latest_collection_date(
    db: &Database,
    region_code: &str,
) -> Result<Option<NaiveDate>, StoreError> {
    db.with_conn(|conn| {
        let latest: Option<String> = conn
            .query_row(
                "SELECT MAX(collected_on) FROM listings WHERE region_code = ?1",
                params![region_code],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(latest.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::{init_test_db, listing};
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn collection(region: &str, listings: Vec<Listing>) -> CollectionResult {
        let mut result = CollectionResult::new(region);
        for l in listings {
            result.push(l);
        }
        result
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let db = init_test_db();
        let mut l = listing("1", "산성역포레스티아", 115_000, 25.7);
        l.confirmed_date = Some(day(17));
        l.attributes.insert("direction".into(), json!("남향"));

        let saved = save_collection(&db, &collection("4113110100", vec![l.clone()]), "신흥동", day(18))
            .unwrap();
        assert_eq!(saved, 1);

        let loaded = load_listings(&db, &ListingQuery::default()).unwrap();
        assert_eq!(loaded.skipped, 0);
        assert_eq!(loaded.listings, vec![l]);
    }

    #[test]
    fn test_same_day_recollection_upserts() {
        let db = init_test_db();
        let first = collection("R1", vec![listing("1", "A", 100, 25.0)]);
        let second = collection("R1", vec![listing("1", "A", 90, 25.0), listing("2", "A", 80, 25.0)]);

        save_collection(&db, &first, "r", day(1)).unwrap();
        save_collection(&db, &second, "r", day(1)).unwrap();
        save_collection(&db, &first, "r", day(2)).unwrap();

        let loaded = load_listings(&db, &ListingQuery::default()).unwrap();
        assert_eq!(loaded.listings.len(), 3);
        assert_eq!(loaded.listings[0].price_main, 90);
    }

    #[test]
    fn test_load_filters_by_region_and_date() {
        let db = init_test_db();
        save_collection(&db, &collection("R1", vec![listing("1", "A", 1, 25.0)]), "", day(1)).unwrap();
        save_collection(&db, &collection("R2", vec![listing("2", "B", 1, 25.0)]), "", day(2)).unwrap();
        save_collection(&db, &collection("R1", vec![listing("3", "A", 1, 25.0)]), "", day(3)).unwrap();

        let query = ListingQuery {
            region_codes: vec!["R1".into()],
            from: Some(day(2)),
            to: Some(day(3)),
        };
        let loaded = load_listings(&db, &query).unwrap();
        let ids: Vec<_> = loaded.listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);

        assert_eq!(latest_collection_date(&db, "R1").unwrap(), Some(day(3)));
        assert_eq!(latest_collection_date(&db, "R9").unwrap(), None);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let db = init_test_db();
        save_collection(&db, &collection("R1", vec![listing("1", "A", 1, 25.0)]), "", day(1)).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO listings (region_code, collected_on, listing_id, trade_type, attributes) \
                 VALUES ('R1', '2025-10-01', 'bad-1', 'ZZ', '{}'), \
                        ('R1', '2025-10-01', 'bad-2', 'A1', 'not json')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let loaded = load_listings(&db, &ListingQuery::default()).unwrap();
        assert_eq!(loaded.listings.len(), 1);
        assert_eq!(loaded.skipped, 2);
    }
}
