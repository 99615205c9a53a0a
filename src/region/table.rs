// table.rs
use crate::region::resolver::normalize_name;
use crate::region::RegionError;
use csv::StringRecord;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One row of the region reference table.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRef {
    pub code: String,
    pub name: String,
    pub center_lat: f64,
    pub center_lon: f64,
}

/// Name → region lookup, loaded once and read-only afterwards.
///
/// Every row is reachable by its normalized name, by the same name with all
/// spaces removed, and (for rows under a province or metropolitan city) by the
/// name without that first segment. When two rows claim the same key, the one
/// earlier in the file wins.
#[derive(Debug, Default)]
pub struct RegionTable {
    rows: Vec<RegionRef>,
    index: HashMap<String, usize>,
    skipped: usize,
}

const PROVINCE_SUFFIXES: [&str; 5] = ["특별자치시", "특별자치도", "특별시", "광역시", "도"];

impl RegionTable {
    /// Loads the table from disk. UTF-8 (with or without BOM) is tried first,
    /// then CP949, the encoding the official 법정동 code file ships in.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegionError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| RegionError::TableIo {
            path: path.display().to_string(),
            source,
        })?;
        let text = decode_table(&bytes).ok_or_else(|| RegionError::TableEncoding {
            path: path.display().to_string(),
        })?;

        let table = Self::parse(&text);
        tracing::info!(
            path = %path.display(),
            rows = table.len(),
            skipped = table.skipped(),
            "region table loaded"
        );
        Ok(table)
    }

    /// Parses `name, code, lat, lon` records, comma or tab delimited (sniffed
    /// from the first line). A leading header row is recognized by its
    /// non-numeric latitude.
    pub fn parse(text: &str) -> Self {
        let text = text.trim_start_matches('\u{feff}');
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(sniff_delimiter(text))
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        let mut skipped = 0;
        let mut first = true;

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    skipped += 1;
                    first = false;
                    tracing::debug!(error = %e, "skipping unreadable region row");
                    continue;
                }
            };
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = record.position().map_or(0, |p| p.line());
            let is_first = std::mem::replace(&mut first, false);

            match parse_row(&record) {
                Some(row) => rows.push(row),
                None if is_first => {
                    tracing::debug!(line, "treating first row as header");
                }
                None => {
                    skipped += 1;
                    tracing::debug!(line, "skipping region row without valid coordinates");
                }
            }
        }

        let mut table = Self::from_rows(rows);
        table.skipped = skipped;
        table
    }

    pub fn from_rows(rows: Vec<RegionRef>) -> Self {
        let mut index = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            for key in index_keys(&row.name) {
                index.entry(key).or_insert(i);
            }
        }
        Self {
            rows,
            index,
            skipped: 0,
        }
    }

    /// Looks up an already-normalized name, also trying its space-free form.
    pub fn lookup(&self, normalized: &str) -> Option<&RegionRef> {
        self.index
            .get(normalized)
            .or_else(|| self.index.get(&compact(normalized)))
            .map(|&i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dropped while parsing.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn decode_table(bytes: &[u8]) -> Option<Cow<'_, str>> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(Cow::Borrowed(text));
    }
    let (text, had_errors) = encoding_rs::EUC_KR.decode_without_bom_handling(bytes);
    (!had_errors).then_some(text)
}

fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or_default();
    if first_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

fn parse_row(record: &StringRecord) -> Option<RegionRef> {
    let (Some(name), Some(code), Some(lat), Some(lon)) =
        (record.get(0), record.get(1), record.get(2), record.get(3))
    else {
        return None;
    };

    let name = normalize_name(name);
    if name.is_empty() || code.is_empty() {
        return None;
    }

    let center_lat: f64 = lat.parse().ok()?;
    let center_lon: f64 = lon.parse().ok()?;
    if !(-90.0..=90.0).contains(&center_lat) || !(-180.0..=180.0).contains(&center_lon) {
        return None;
    }

    Some(RegionRef {
        code: code.to_string(),
        name,
        center_lat,
        center_lon,
    })
}

fn compact(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

fn index_keys(name: &str) -> Vec<String> {
    let mut keys = vec![name.to_string(), compact(name)];

    if let Some((first, rest)) = name.split_once(' ') {
        if PROVINCE_SUFFIXES.iter().any(|s| first.ends_with(s)) {
            keys.push(rest.to_string());
            keys.push(compact(rest));
        }
    }
    keys
}
