use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::{Asia::Seoul, Tz};

use crate::errors::Result;
use crate::models::{Direction, PriceRecord};
use crate::util::{format_integer, format_number};

// KRX regular session, seconds from midnight Seoul time
const MARKET_OPEN: u32 = 9 * 3600;
const MARKET_CLOSE: u32 = 15 * 3600 + 30 * 60;

const RULE: &str = "=================================";

/// Whether the shown price is still moving or final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceLabel {
    Current,
    Close,
}

impl PriceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceLabel::Current => "Current",
            PriceLabel::Close => "Close",
        }
    }
}

pub fn seoul_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&Seoul)
}

/// `Current` only for today's record on a weekday during the regular session
pub fn price_label(trade_day: NaiveDate, now: &DateTime<Tz>) -> PriceLabel {
    let weekday = !matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
    let secs = now.num_seconds_from_midnight();
    let in_session = (MARKET_OPEN..=MARKET_CLOSE).contains(&secs);

    if weekday && in_session && trade_day == now.date_naive() {
        PriceLabel::Current
    } else {
        PriceLabel::Close
    }
}

/// Human-readable block for a found record
pub fn render_record(record: &PriceRecord, label: PriceLabel) -> Vec<String> {
    let day = record
        .trade_day()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| record.trade_date.clone());
    let code = record
        .isin
        .as_deref()
        .or(record.short_code.as_deref())
        .map(|c| format!(" [{}]", c))
        .unwrap_or_default();

    vec![
        format!("=== {}{} {} ===", record.name, code, day),
        field_line(label.as_str(), format!("{} KRW", format_number(record.close))),
        field_line("Open", format!("{} KRW", format_number(record.open))),
        field_line("High", format!("{} KRW", format_number(record.high))),
        field_line("Low", format!("{} KRW", format_number(record.low))),
        field_line("Volume", format!("{} shares", format_integer(record.volume))),
        field_line("Change", change_text(record)),
        field_line("Rate", format!("{}%", record.change_rate)),
        RULE.to_string(),
    ]
}

pub fn render_json(record: &PriceRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

pub fn render_not_found(identifier: &str, days: u32) -> String {
    format!(
        "No price data for {} in the last {} day(s). Please try again later.",
        identifier, days
    )
}

fn field_line(name: &str, value: String) -> String {
    format!("{:<9}{}", format!("{}:", name), value)
}

fn change_text(record: &PriceRecord) -> String {
    let amount = format_number(record.change.abs());
    match record.direction() {
        Direction::Up => format!("▲ {} KRW", amount),
        Direction::Down => format!("▼ {} KRW", amount),
        Direction::Flat => format!("{} KRW", amount),
    }
}
