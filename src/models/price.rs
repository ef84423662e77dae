use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::Result;
use crate::util;

/// 일별 시세 레코드
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    pub name: String,
    /// Trade date as sent by the API, `YYYYMMDD`
    pub trade_date: String,
    pub close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    /// Change versus the previous trading day's close
    pub change: f64,
    /// Percent change, verbatim (the API sends values like `-.71`)
    pub change_rate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trading_value: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<u64>,
}

/// Sign of the day-over-day change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl PriceRecord {
    pub fn trade_day(&self) -> Result<NaiveDate> {
        util::parse_yyyymmdd(&self.trade_date)
    }

    pub fn previous_close(&self) -> f64 {
        self.close - self.change
    }

    pub fn direction(&self) -> Direction {
        if self.change > 0.0 {
            Direction::Up
        } else if self.change < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_record(trade_date: &str) -> PriceRecord {
    PriceRecord {
        name: "삼양식품".to_string(),
        trade_date: trade_date.to_string(),
        close: 712000.0,
        open: 705000.0,
        high: 718000.0,
        low: 701000.0,
        volume: 48213,
        change: -5000.0,
        change_rate: "-.70".to_string(),
        short_code: Some("003230".to_string()),
        isin: Some("KR7003230000".to_string()),
        market: Some("KOSPI".to_string()),
        trading_value: None,
        market_cap: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_fields() {
        let record = sample_record("20250103");
        assert_eq!(record.trade_day().unwrap(), NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
        assert_eq!(record.previous_close(), 717000.0);
        assert_eq!(record.direction(), Direction::Down);
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let json = serde_json::to_value(sample_record("20250103")).unwrap();
        assert_eq!(json["trade_date"], "20250103");
        assert_eq!(json["change_rate"], "-.70");
        assert!(json.get("market_cap").is_none());
        assert_eq!(json["market"], "KOSPI");
    }
}
