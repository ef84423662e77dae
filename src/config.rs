use chrono::NaiveDate;

use crate::errors::{LookbackError, Result};

pub const DEFAULT_ENDPOINT: &str =
    "http://apis.data.go.kr/1160100/service/GetStockSecuritiesInfoService/getStockPriceInfo";

/// Environment variable consulted when no service key is passed explicitly
pub const SERVICE_KEY_ENV: &str = "DATA_GO_KR_SERVICE_KEY";

/// How the candidate dates of a window are probed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// One request at a time, newest first, stop at the first hit
    Sequential,
    /// All dates at once, keep the newest hit
    Concurrent,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub service_key: String,
    pub endpoint: String,
    pub max_days: u32,
    pub timeout_secs: u64,
    pub reference_date: Option<NaiveDate>,  // None = today
    pub mode: ProbeMode,
}

impl Config {
    pub fn new() -> Self {
        Self {
            service_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_days: 7,  // a weekend plus a holiday
            timeout_secs: 30,
            reference_date: None,
            mode: ProbeMode::Sequential,
        }
    }

    pub fn with_service_key(mut self, key: &str) -> Self {
        self.service_key = key.trim().to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_max_days(mut self, days: u32) -> Self {
        self.max_days = days;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_reference_date(mut self, date: Option<NaiveDate>) -> Self {
        self.reference_date = date;
        self
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_key.is_empty() {
            return Err(LookbackError::ConfigError(format!(
                "service key is required (pass --service-key or set {})",
                SERVICE_KEY_ENV
            )));
        }
        if self.max_days == 0 {
            return Err(LookbackError::ConfigError(
                "lookback window must be at least 1 day".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(LookbackError::ConfigError("timeout must be positive".to_string()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(LookbackError::ConfigError(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new();
        assert_eq!(config.max_days, 7);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.mode, ProbeMode::Sequential);
        assert!(config.reference_date.is_none());
    }

    #[test]
    fn validate_requires_key_and_window() {
        assert!(Config::new().validate().is_err());
        assert!(Config::new().with_service_key("  ").validate().is_err());

        let config = Config::new().with_service_key("abc");
        assert!(config.validate().is_ok());
        assert!(config.clone().with_max_days(0).validate().is_err());
        assert!(config.clone().with_timeout_secs(0).validate().is_err());
        assert!(config.with_endpoint("apis.data.go.kr").validate().is_err());
    }
}
