// src/notify/format.rs

use crate::analytics::{AnalyticsReport, ComparisonReport, ComplexReport, MedianGap, PriceStats};
use chrono::NaiveDateTime;
use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━";
const NO_DATA: &str = "데이터 없음";

/// Escapes the three characters Telegram's HTML mode cares about.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// 10k-won units rendered in 억, e.g. 115000 → "11.5억".
pub fn format_eok(price_10k_won: f64) -> String {
    let eok = format!("{:.2}", price_10k_won / 10_000.0);
    let eok = eok.trim_end_matches('0').trim_end_matches('.');
    format!("{eok}억")
}

fn format_stats(stats: &PriceStats) -> String {
    format!(
        "{}~{} (중앙 {}, {}건)",
        format_eok(stats.min as f64),
        format_eok(stats.max as f64),
        format_eok(stats.median),
        stats.count
    )
}

fn format_gap(gap: &MedianGap) -> String {
    let sign = if gap.absolute > 0.0 { "+" } else { "" };
    let arrow = if gap.absolute < 0.0 { "⬇️" } else if gap.absolute > 0.0 { "⬆️" } else { "" };
    let text = match gap.percent {
        Some(pct) => format!("{sign}{} ({sign}{pct:.1}%) {arrow}", format_eok(gap.absolute)),
        None => format!("{sign}{} {arrow}", format_eok(gap.absolute)),
    };
    text.trim_end().to_string()
}

fn write_complex(out: &mut String, complex: &ComplexReport) {
    let _ = writeln!(out, "🏢 <b>{}</b>", escape_html(&complex.complex_name));
    match &complex.overall {
        Some(overall) if complex.has_data() => {
            let _ = writeln!(out, "  전체: {}", format_stats(overall));
            if let Some(floors) = &complex.floors {
                let _ = writeln!(
                    out,
                    "  층: 저층 {} / 중층 {} / 고층 {} (상위층 {:.0}%)",
                    floors.low,
                    floors.mid,
                    floors.high,
                    floors.upper_ratio() * 100.0
                );
            }
            if let Some(direction) = &complex.direction {
                let _ = writeln!(
                    out,
                    "  향: {} {}건 ({}종)",
                    escape_html(&direction.most_common),
                    direction.count,
                    direction.varieties
                );
            }
            for b in &complex.brackets {
                let _ = writeln!(out, "  • {}: {}", b.bracket, format_stats(&b.stats));
            }
        }
        _ => {
            let _ = writeln!(out, "  {NO_DATA}");
        }
    }
}

/// Per-complex bracket breakdown.
pub fn format_analysis(report: &AnalyticsReport, generated_at: NaiveDateTime) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "📊 단지별 호가 분석 {}", generated_at.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out, "{RULE}");

    if report.complexes.is_empty() {
        let _ = writeln!(out, "{NO_DATA}");
        return out;
    }

    for complex in &report.complexes {
        out.push('\n');
        write_complex(&mut out, complex);
    }

    if report.excluded_by_filter > 0 || report.without_area > 0 || report.without_name > 0 {
        let _ = writeln!(
            out,
            "\n필터 제외 {}건, 면적 정보 없음 {}건, 단지명 없음 {}건",
            report.excluded_by_filter, report.without_area, report.without_name
        );
    }
    out
}

/// Home-vs-target comparison, one block per size bracket.
pub fn format_comparison(report: &ComparisonReport, generated_at: NaiveDateTime) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "⚖️ 가격 비교 {}", generated_at.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out, "🏠 기준: <b>{}</b>", escape_html(&report.home.complex_name));
    let _ = writeln!(out, "{RULE}");

    if report.rows.is_empty() {
        let _ = writeln!(out, "{NO_DATA}");
        return out;
    }

    for row in &report.rows {
        let _ = writeln!(out, "\n📐 <b>{}</b>", row.bracket);
        let home = row.home.as_ref().map_or_else(|| NO_DATA.to_string(), format_stats);
        let _ = writeln!(out, "  🏠 {}: {home}", escape_html(&report.home.complex_name));

        for ((target, stats), gap) in report.targets.iter().zip(&row.targets).zip(&row.gaps) {
            let stats = stats.as_ref().map_or_else(|| NO_DATA.to_string(), format_stats);
            let _ = write!(out, "  • {}: {stats}", escape_html(&target.complex_name));
            if let Some(gap) = gap {
                let _ = write!(out, " / 중앙가 차이 {}", format_gap(gap));
            }
            out.push('\n');
        }
    }
    out
}

/// Trailing section listing what went wrong during the run.
pub fn format_notes(notes: &[String]) -> String {
    if notes.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n⚠️ 참고\n");
    for note in notes {
        let _ = writeln!(out, "- {}", escape_html(note));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{build_comparison, build_report, AnalyzeOptions};
    use crate::tests::utils::listing;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 18)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_format_eok() {
        assert_eq!(format_eok(115_000.0), "11.5억");
        assert_eq!(format_eok(100_000.0), "10억");
        assert_eq!(format_eok(105_500.0), "10.55억");
        assert_eq!(format_eok(-10_000.0), "-1억");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("A&B <C>"), "A&amp;B &lt;C&gt;");
    }

    #[test]
    fn test_analysis_message_marks_missing_complexes() {
        let listings = vec![
            listing("1", "산성역포레스티아", 110_000, 25.2),
            listing("2", "산성역포레스티아", 120_000, 25.8),
        ];
        let report = build_report(
            &listings,
            &["산성역포레스티아".to_string(), "없는단지".to_string()],
            &AnalyzeOptions::default(),
        );
        let text = format_analysis(&report, at());

        assert!(text.contains("2025-10-18 09:00"));
        assert!(text.contains("• 25평: 11억~12억 (중앙 11.5억, 2건)"));
        assert!(text.contains("없는단지</b>\n  데이터 없음"));
        assert!(text.contains("층: 저층 2 / 중층 0 / 고층 0 (상위층 0%)"));
    }

    #[test]
    fn test_analysis_message_shows_direction_and_unnamed_count() {
        let mut south = listing("1", "우리집", 100_000, 25.0);
        south.attributes.insert("direction".to_string(), serde_json::json!("남향"));
        let listings = vec![south, listing("2", "", 90_000, 25.0)];
        let report = build_report(&listings, &[], &AnalyzeOptions::default());
        let text = format_analysis(&report, at());

        assert!(text.contains("향: 남향 1건 (1종)"));
        assert!(text.contains("단지명 없음 1건"));
        assert!(!text.contains("<b></b>"));
    }

    #[test]
    fn test_comparison_message_puts_home_first() {
        let listings = vec![
            listing("1", "우리집", 100_000, 25.0),
            listing("2", "옆단지", 110_000, 25.0),
        ];
        let report = build_comparison(&listings, "우리집", &["옆단지".to_string()], &AnalyzeOptions::default());
        let text = format_comparison(&report, at());

        let home_at = text.find("🏠 우리집").unwrap();
        let target_at = text.find("• 옆단지").unwrap();
        assert!(home_at < target_at);
        assert!(text.contains("중앙가 차이 +1억 (+10.0%) ⬆️"));
    }

    #[test]
    fn test_notes_section() {
        assert_eq!(format_notes(&[]), "");
        let notes = format_notes(&["region X: not found".to_string()]);
        assert!(notes.contains("- region X: not found"));
    }
}
