use chrono::{Duration, NaiveDate};

use crate::errors::{LookbackError, Result};

// 날짜 변환

/// Format a calendar date as the API's `basDt` value, e.g. `20250105`
pub fn format_yyyymmdd(date: &NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub fn parse_yyyymmdd(date_str: &str) -> Result<NaiveDate> {
    if date_str.len() != 8 || !date_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(LookbackError::DataError(format!("Invalid date format: {}", date_str)));
    }

    Ok(NaiveDate::parse_from_str(date_str, "%Y%m%d")?)
}

/// Candidate dates for a lookback window, most recent first
pub fn candidate_dates(reference: NaiveDate, max_days: u32) -> Vec<NaiveDate> {
    (0..max_days)
        .filter_map(|offset| reference.checked_sub_signed(Duration::days(offset as i64)))
        .collect()
}

// 숫자 표시

/// Insert `,` every three digits of a plain digit string
fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_integer(value: u64) -> String {
    group_digits(&value.to_string())
}

/// Thousands-separated number with at most three fraction digits, e.g. `-1,234.5`
pub fn format_number(value: f64) -> String {
    let rendered = format!("{:.3}", value.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut out = String::new();
    if value < 0.0 && (int_part != "0" || !frac_part.is_empty()) {
        out.push('-');
    }
    out.push_str(&group_digits(int_part));
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}
