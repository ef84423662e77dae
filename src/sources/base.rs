use crate::errors::Result;
use crate::models::{Identifier, PriceRecord};
use async_trait::async_trait;
use chrono::NaiveDate;

/// What a 2xx answer from a price source contained
#[derive(Debug, Clone, PartialEq)]
pub enum SourceResponse {
    /// First item of a non-empty result list
    Item(PriceRecord),
    /// Well-formed answer with no record for the date
    Empty,
    /// Body did not have the expected shape
    Malformed(String),
}

/// Base trait for daily price sources
#[async_trait]
pub trait PriceSource {
    /// Short name used in log lines
    fn source_name(&self) -> &'static str;

    /// Fetch the daily record for one instrument on one date.
    /// Transport failures, non-2xx statuses and API-level error codes are `Err`.
    async fn fetch_daily(&self, identifier: &Identifier, date: &NaiveDate) -> Result<SourceResponse>;
}
