// Utility helpers for cell coercion, date parsing and number formatting.
//
// This module centralizes all the "dirty" spreadsheet handling so the
// normalizer and the report builder can assume clean, typed values.
use crate::types::CellValue;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d %B %Y",
    "%B %d, %Y",
];

/// Coerce a cell into a numeric amount.
///
/// - `Missing`, NaN and blank text count as `0`.
/// - Text is parsed after dropping inner spaces (including the non-breaking
///   ones spreadsheet exports use as thousands separators).
/// - Returns `None` when the value cannot be read as a finite number; the
///   caller treats that as a failed row.
pub fn coerce_f64(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Missing => Some(0.0),
        CellValue::Number(n) if n.is_nan() => Some(0.0),
        CellValue::Number(n) => Some(*n).filter(|v| v.is_finite()),
        CellValue::Text(s) if s.trim().is_empty() => Some(0.0),
        CellValue::Text(s) => parse_f64_safe(Some(s)),
        CellValue::Date(_) => None,
    }
}

/// Parse a string-like value into `f64` while being forgiving about the
/// formatting quirks common in marketplace exports.
///
/// A lone comma (no dot) is a decimal separator, as in `1234,50`; otherwise
/// commas are thousands separators, as in `1,234.50`.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let compact: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();
    let cleaned = if compact.contains(',') && !compact.contains('.') && compact.matches(',').count() == 1 {
        compact.replace(',', ".")
    } else {
        compact.replace(',', "")
    };
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a cell as trimmed text. Empty, missing and zero values become "".
pub fn coerce_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Missing => String::new(),
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) if *n == 0.0 || n.is_nan() => String::new(),
        CellValue::Number(n) => format_plain(*n),
        CellValue::Date(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn format_plain(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Canonical `YYYY-MM-DD` form of a date cell, or `None` when the cell is
/// empty or cannot be read as a calendar date.
pub fn coerce_date(cell: &CellValue) -> Option<String> {
    let date = match cell {
        CellValue::Date(dt) => dt.date(),
        CellValue::Text(s) => parse_date_safe(Some(s))?,
        CellValue::Number(_) | CellValue::Missing => return None,
    };
    Some(date.format("%Y-%m-%d").to_string())
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Some(dt) = parse_datetime_safe(s) {
        return Some(dt.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

pub fn parse_datetime_safe(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Convert an Excel serial date (days since 1899-12-30, fractional part is
/// the time of day) into a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // 2_958_466 is 9999-12-31, the last day Excel can represent.
    if !serial.is_finite() || !(0.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.trunc();
    let secs = ((serial - days) * 86_400.0).round();
    base.checked_add_signed(Duration::days(days as i64))?
        .checked_add_signed(Duration::seconds(secs as i64))
}

/// Percentage of `part` in `total`; 0 when the total is 0.
pub fn share_pct(part: f64, total: f64) -> f64 {
    if total.abs() < f64::EPSILON {
        return 0.0;
    }
    part / total * 100.0
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    } else if decimals > 0 {
        res.push('.');
        res.push_str(&"0".repeat(decimals));
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_f64_defaults_missing_and_blank_to_zero() {
        assert_eq!(coerce_f64(&CellValue::Missing), Some(0.0));
        assert_eq!(coerce_f64(&CellValue::Text("   ".into())), Some(0.0));
        assert_eq!(coerce_f64(&CellValue::Number(f64::NAN)), Some(0.0));
    }

    #[test]
    fn coerce_f64_rejects_garbage_and_non_finite() {
        assert_eq!(coerce_f64(&CellValue::Text("abc".into())), None);
        assert_eq!(coerce_f64(&CellValue::Text("nan".into())), None);
        assert_eq!(coerce_f64(&CellValue::Number(f64::INFINITY)), None);
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid timestamp");
        assert_eq!(coerce_f64(&CellValue::Date(dt)), None);
    }

    #[test]
    fn parse_f64_safe_handles_separators() {
        assert_eq!(parse_f64_safe(Some("1,234.50")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("1234,50")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("1\u{a0}234,5")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some(" -42 ")), Some(-42.0));
        assert_eq!(parse_f64_safe(Some("1,234,567")), Some(1_234_567.0));
    }

    #[test]
    fn coerce_text_trims_and_renders_numbers() {
        assert_eq!(coerce_text(&CellValue::Text("  Nike ".into())), "Nike");
        assert_eq!(coerce_text(&CellValue::Number(1000.0)), "1000");
        assert_eq!(coerce_text(&CellValue::Number(2.5)), "2.5");
        assert_eq!(coerce_text(&CellValue::Number(0.0)), "");
        assert_eq!(coerce_text(&CellValue::Missing), "");
    }

    #[test]
    fn coerce_date_accepts_common_layouts() {
        let text = |s: &str| CellValue::Text(s.to_string());
        assert_eq!(coerce_date(&text("2024-01-01")), Some("2024-01-01".into()));
        assert_eq!(coerce_date(&text("15.03.2024")), Some("2024-03-15".into()));
        assert_eq!(
            coerce_date(&text("2024-03-15 10:20:30")),
            Some("2024-03-15".into())
        );
        assert_eq!(
            coerce_date(&text("2024-03-15T10:20:30+03:00")),
            Some("2024-03-15".into())
        );
        assert_eq!(coerce_date(&text("03/15/2024")), Some("2024-03-15".into()));
        assert_eq!(coerce_date(&text("not a date")), None);
        assert_eq!(coerce_date(&CellValue::Number(45000.0)), None);
        assert_eq!(coerce_date(&CellValue::Missing), None);
    }

    #[test]
    fn excel_serial_converts_to_calendar_date() {
        let dt = excel_serial_to_datetime(45292.5).expect("serial in range");
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-01 12:00");
        assert!(excel_serial_to_datetime(-1.0).is_none());
    }

    #[test]
    fn format_number_inserts_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-900.0, 2), "-900.00");
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(share_pct(25.0, 0.0), 0.0);
    }
}
