// Utility helpers for parsing, cleaning and number formatting.
//
// This module centralizes all the "dirty" CSV/number/date handling so the
// rest of the code can assume clean, typed values.
use crate::config::FormatConfig;
use crate::error::Result;
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{CustomFormat, Format, Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;

// Anything that is neither a word character nor whitespace.
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"];

/// Values at or above this magnitude use the `M` rendering.
pub const MILLIONS_THRESHOLD: f64 = 100_000.0;

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports (commas, spaces, text).
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed, including
///   `NaN` and infinities.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a sale date. Unknown formats yield `None`, never an error.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

/// Trimmed owned text, empty when the field is missing.
pub fn clean_text(s: Option<&str>) -> String {
    s.map(str::trim).unwrap_or_default().to_string()
}

/// Remove every character that is not a word character or whitespace,
/// then trim.
pub fn strip_special_chars(s: &str) -> String {
    NON_WORD.replace_all(s, "").trim().to_string()
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Dashboard number rendering with `en` grouping.
///
/// Below [`MILLIONS_THRESHOLD`] the value is rounded and grouped
/// (`50000 -> "50,000"`). At or above it, the integer digit string loses
/// its last six characters, gets an `M`, and then the next three digits
/// (`1234567 -> "1M234"`, `500000 -> "M500"`). The large-value branch is
/// a truncation, not a rounding to millions.
pub fn format_number(value: f64) -> String {
    format_number_in(value, &Locale::en)
}

pub fn format_number_in<F: Format>(value: f64, format: &F) -> String {
    // `inf`, `-inf` and `NaN` render as Rust prints them.
    if !value.is_finite() {
        return value.to_string();
    }
    let abs = value.abs();
    if abs >= MILLIONS_THRESHOLD {
        let digits = format!("{:.0}", abs.trunc());
        let len = digits.len();
        let head = &digits[..len.saturating_sub(6)];
        let mid = &digits[len.saturating_sub(6)..len.saturating_sub(3)];
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}{head}M{mid}");
    }
    (value.round() as i64).to_formatted_string(format)
}

/// `format_number` with the configured separator and currency symbol.
pub fn format_currency(value: f64, cfg: &FormatConfig) -> Result<String> {
    let format = CustomFormat::builder()
        .separator(&cfg.thousands_separator)
        .build()?;
    Ok(format!(
        "{}{}",
        cfg.currency_symbol,
        format_number_in(value, &format)
    ))
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for integer-like values. This is used
    // for counts in console messages (e.g., `23,906 rows loaded`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_groups_small_values() {
        assert_eq!(format_number(50000.0), "50,000");
        assert_eq!(format_number(999.6), "1,000");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn format_number_truncates_large_values() {
        assert_eq!(format_number(1234567.0), "1M234");
        assert_eq!(format_number(1234567.89), "1M234");
        assert_eq!(format_number(98765432.0), "98M765");
        // Values between the threshold and one million lose their head.
        assert_eq!(format_number(500000.0), "M500");
    }

    #[test]
    fn format_number_passes_non_finite_through() {
        assert_eq!(format_number(f64::INFINITY), "inf");
        assert_eq!(format_number(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_number(f64::NAN), "NaN");
        let cfg = FormatConfig::default();
        assert_eq!(format_currency(f64::INFINITY, &cfg).unwrap(), "$inf");
    }

    #[test]
    fn format_currency_uses_config() {
        let cfg = FormatConfig {
            currency_symbol: "R$ ".to_string(),
            thousands_separator: ".".to_string(),
        };
        assert_eq!(format_currency(50000.0, &cfg).unwrap(), "R$ 50.000");
        assert_eq!(format_currency(1234567.0, &cfg).unwrap(), "R$ 1M234");
    }

    #[test]
    fn parse_date_safe_accepts_known_formats() {
        let jan2 = NaiveDate::from_ymd_opt(2022, 1, 2).unwrap();
        assert_eq!(parse_date_safe(Some("1/2/2022")), Some(jan2));
        assert_eq!(parse_date_safe(Some("2022-01-02")), Some(jan2));
        assert_eq!(parse_date_safe(Some("2022-01-02 10:30:00")), Some(jan2));
        assert_eq!(parse_date_safe(Some("not a date")), None);
        assert_eq!(parse_date_safe(Some("13/45/2022")), None);
        assert_eq!(parse_date_safe(None), None);
    }

    #[test]
    fn parse_f64_safe_rejects_garbage() {
        assert_eq!(parse_f64_safe(Some(" 1,250,000 ")), Some(1_250_000.0));
        assert_eq!(parse_f64_safe(Some("n/a")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
    }

    #[test]
    fn strip_special_chars_keeps_words_and_spaces() {
        assert_eq!(
            strip_special_chars("DoubleÂ Overhead Camshaft"),
            "DoubleÂ Overhead Camshaft"
        );
        assert_eq!(strip_special_chars(" Overhead-Camshaft! "), "OverheadCamshaft");
        assert_eq!(strip_special_chars("V6_3.5L"), "V6_35L");
    }
}
