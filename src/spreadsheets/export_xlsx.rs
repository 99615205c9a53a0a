use crate::analytics::{build_report, AnalyzeOptions};
use crate::domain::Listing;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write {what}: {source}")]
    Write {
        what: String,
        #[source]
        source: XlsxError,
    },

    #[error("Failed to save workbook: {0}")]
    Save(#[source] XlsxError),
}

fn write_err(what: impl Into<String>) -> impl FnOnce(XlsxError) -> ExportError {
    let what = what.into();
    move |source| ExportError::Write { what, source }
}

const LISTING_HEADERS: [&str; 12] = [
    "매물 ID",
    "단지명",
    "거래유형",
    "가격(만원)",
    "월세(만원)",
    "전용면적(평)",
    "전용면적(㎡)",
    "층",
    "동",
    "확인일자",
    "위도",
    "경도",
];

const COMPLEX_HEADERS: [&str; 6] = ["단지명", "매물 수", "최저가(만원)", "최고가(만원)", "중앙가(만원)", "평형대 수"];

fn write_headers(sheet: &mut Worksheet, headers: &[&str], bold: &Format) -> Result<(), ExportError> {
    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *header, bold)
            .map_err(write_err(format!("header '{header}'")))?;
    }
    Ok(())
}

fn write_listing_sheet(sheet: &mut Worksheet, listings: &[Listing], bold: &Format) -> Result<(), ExportError> {
    sheet.set_name("매물 정보").map_err(write_err("sheet name"))?;
    write_headers(sheet, &LISTING_HEADERS, bold)?;

    for (i, listing) in listings.iter().enumerate() {
        let r = (i + 1) as u32;
        let confirmed = listing
            .confirmed_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        sheet
            .write_string(r, 0, &listing.id)
            .and_then(|s| s.write_string(r, 1, &listing.complex_name))
            .and_then(|s| s.write_string(r, 2, listing.trade_type.label()))
            .and_then(|s| s.write_number(r, 3, listing.price_main as f64))
            .and_then(|s| s.write_number(r, 4, listing.price_rent as f64))
            .and_then(|s| s.write_number(r, 5, (listing.area_exclusive_pyeong * 100.0).round() / 100.0))
            .and_then(|s| s.write_number(r, 6, listing.area_exclusive_sqm))
            .and_then(|s| s.write_string(r, 7, &listing.floor_info))
            .and_then(|s| s.write_string(r, 8, &listing.building_name))
            .and_then(|s| s.write_string(r, 9, &confirmed))
            .and_then(|s| s.write_number(r, 10, listing.latitude))
            .and_then(|s| s.write_number(r, 11, listing.longitude))
            .map_err(write_err(format!("listing {}", listing.id)))?;
    }
    Ok(())
}

fn write_complex_sheet(sheet: &mut Worksheet, listings: &[Listing], bold: &Format) -> Result<(), ExportError> {
    sheet.set_name("단지 정보").map_err(write_err("sheet name"))?;
    write_headers(sheet, &COMPLEX_HEADERS, bold)?;

    let report = build_report(listings, &[], &AnalyzeOptions::default());
    let mut r = 1u32;
    for complex in report.complexes.iter().filter(|c| c.has_data()) {
        let Some(overall) = &complex.overall else {
            continue;
        };
        sheet
            .write_string(r, 0, &complex.complex_name)
            .and_then(|s| s.write_number(r, 1, overall.count as f64))
            .and_then(|s| s.write_number(r, 2, overall.min as f64))
            .and_then(|s| s.write_number(r, 3, overall.max as f64))
            .and_then(|s| s.write_number(r, 4, overall.median))
            .and_then(|s| s.write_number(r, 5, complex.brackets.len() as f64))
            .map_err(write_err(format!("complex {}", complex.complex_name)))?;
        r += 1;
    }
    Ok(())
}

/// Builds a two-sheet workbook: raw listings and a per-complex summary.
pub fn build_listings_workbook(listings: &[Listing]) -> Result<Workbook, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    write_listing_sheet(workbook.add_worksheet(), listings, &bold)?;
    write_complex_sheet(workbook.add_worksheet(), listings, &bold)?;

    Ok(workbook)
}

pub fn export_listings_xlsx(listings: &[Listing], path: &Path) -> Result<(), ExportError> {
    let mut workbook = build_listings_workbook(listings)?;
    workbook.save(path).map_err(ExportError::Save)?;
    tracing::info!(path = %path.display(), rows = listings.len(), "listings exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::listing;

    #[test]
    fn test_workbook_builds_for_listings() {
        let listings = vec![
            listing("1", "산성역포레스티아", 115_000, 25.7),
            listing("2", "산성역포레스티아", 118_000, 25.7),
        ];
        let mut workbook = build_listings_workbook(&listings).unwrap();
        let buffer = workbook.save_to_buffer().unwrap();
        // xlsx is a zip archive
        assert!(buffer.starts_with(b"PK"));
    }

    #[test]
    fn test_export_writes_file() {
        let path = std::env::temp_dir().join(format!("land_scraper_export_{}.xlsx", std::process::id()));
        export_listings_xlsx(&[], &path).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
