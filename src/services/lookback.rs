use crate::config::{Config, ProbeMode};
use crate::errors::{LookbackError, Result};
use crate::models::{Identifier, PriceRecord};
use crate::sources::base::{PriceSource, SourceResponse};
use crate::util;
use chrono::NaiveDate;
use futures::future::join_all;
use log::{info, warn};
use std::sync::Arc;

/// Result of probing one candidate date
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Found,
    /// Empty or malformed answer; the reason says which
    NoData(String),
    /// Transport, HTTP status or API error
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub date: NaiveDate,
    pub outcome: AttemptOutcome,
}

/// Everything one lookback run did, in probe order
#[derive(Debug, Clone)]
pub struct LookbackReport {
    pub identifier: Identifier,
    pub window: u32,
    pub attempts: Vec<Attempt>,
    pub record: Option<PriceRecord>,
}

impl LookbackReport {
    pub fn requests(&self) -> usize {
        self.attempts.len()
    }

    pub fn failures(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, AttemptOutcome::Failed(_)))
            .count()
    }

    pub fn into_result(self) -> Result<PriceRecord> {
        self.record.ok_or(LookbackError::NotFound {
            identifier: self.identifier.to_string(),
            days: self.window,
        })
    }
}

/// 최근 영업일 시세 조회: walks back one calendar day at a time until the
/// source returns a record or the window is exhausted.
pub struct LookbackFetcher {
    config: Config,
    source: Arc<dyn PriceSource + Send + Sync>,
}

impl LookbackFetcher {
    pub fn new(config: Config, source: Arc<dyn PriceSource + Send + Sync>) -> Self {
        Self { config, source }
    }

    /// Window used by `fetch_latest`, from `Config::max_days`
    pub fn window(&self) -> u32 {
        self.config.max_days
    }

    /// `fetch_latest_price` over the configured window
    pub async fn fetch_latest(&self, identifier: &Identifier) -> Result<PriceRecord> {
        self.fetch_latest_price(identifier, self.window()).await
    }

    /// Most recent record within `max_days` calendar days, or `NotFound`
    pub async fn fetch_latest_price(&self, identifier: &Identifier, max_days: u32) -> Result<PriceRecord> {
        self.probe_window(identifier, max_days).await?.into_result()
    }

    /// Probe the window and report every attempt.
    /// Only invalid input is an `Err`; per-date failures end up in the report.
    pub async fn probe_window(&self, identifier: &Identifier, max_days: u32) -> Result<LookbackReport> {
        if max_days == 0 {
            return Err(LookbackError::ConfigError(
                "lookback window must be at least 1 day".to_string(),
            ));
        }

        let reference = self.reference_day()?;
        let dates = util::candidate_dates(reference, max_days);
        info!(
            "Looking up {} from {} over {} day(s) via {} ({:?})",
            identifier,
            util::format_yyyymmdd(&reference),
            max_days,
            self.source.source_name(),
            self.config.mode
        );

        let (attempts, record) = match self.config.mode {
            ProbeMode::Sequential => self.probe_sequential(identifier, &dates).await,
            ProbeMode::Concurrent => self.probe_concurrent(identifier, &dates).await,
        };

        let report = LookbackReport {
            identifier: identifier.clone(),
            window: max_days,
            attempts,
            record,
        };

        if report.record.is_none() {
            warn!(
                "No price data for {} in the last {} day(s) ({} request(s), {} failure(s))",
                identifier,
                max_days,
                report.requests(),
                report.failures()
            );
        }

        Ok(report)
    }

    fn reference_day(&self) -> Result<NaiveDate> {
        let today = chrono::Local::now().date_naive();
        match self.config.reference_date {
            Some(date) if date > today => Err(LookbackError::ConfigError(format!(
                "reference date {} is in the future",
                date
            ))),
            Some(date) => Ok(date),
            None => Ok(today),
        }
    }

    async fn probe_sequential(
        &self,
        identifier: &Identifier,
        dates: &[NaiveDate],
    ) -> (Vec<Attempt>, Option<PriceRecord>) {
        let mut attempts = Vec::with_capacity(dates.len());

        for date in dates {
            let (outcome, record) = self.probe_date(identifier, date).await;
            attempts.push(Attempt { date: *date, outcome });
            if record.is_some() {
                return (attempts, record);
            }
        }

        (attempts, None)
    }

    async fn probe_concurrent(
        &self,
        identifier: &Identifier,
        dates: &[NaiveDate],
    ) -> (Vec<Attempt>, Option<PriceRecord>) {
        // join_all keeps input order, so the first hit is the most recent one
        let results = join_all(dates.iter().map(|date| self.probe_date(identifier, date))).await;

        let mut attempts = Vec::with_capacity(dates.len());
        let mut found = None;
        for (date, (outcome, record)) in dates.iter().zip(results) {
            attempts.push(Attempt { date: *date, outcome });
            if found.is_none() {
                found = record;
            }
        }

        (attempts, found)
    }

    async fn probe_date(&self, identifier: &Identifier, date: &NaiveDate) -> (AttemptOutcome, Option<PriceRecord>) {
        let bas_dt = util::format_yyyymmdd(date);
        info!("Trying {} for {}", bas_dt, identifier);

        match self.source.fetch_daily(identifier, date).await {
            Ok(SourceResponse::Item(record)) => {
                info!("Found {} ({}) for {}", record.name, record.trade_date, bas_dt);
                (AttemptOutcome::Found, Some(record))
            }
            Ok(SourceResponse::Empty) => {
                info!("No price data for {}, trying the previous day", bas_dt);
                (AttemptOutcome::NoData("empty result".to_string()), None)
            }
            Ok(SourceResponse::Malformed(reason)) => {
                warn!("Unusable response for {}: {}", bas_dt, reason);
                (AttemptOutcome::NoData(reason), None)
            }
            Err(e) => {
                warn!("Request for {} failed: {}", bas_dt, e);
                (AttemptOutcome::Failed(e.to_string()), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::price::sample_record;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Scripted {
        Item,
        Empty,
        Malformed,
        Fail,
    }

    /// Answers from a per-date script (unscripted dates are empty) and records every call
    struct ScriptedSource {
        script: HashMap<NaiveDate, Scripted>,
        calls: Mutex<Vec<NaiveDate>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<(NaiveDate, Scripted)>) -> Arc<Self> {
            Arc::new(Self {
                script: script.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<NaiveDate> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        fn source_name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_daily(&self, _identifier: &Identifier, date: &NaiveDate) -> Result<SourceResponse> {
            self.calls.lock().unwrap().push(*date);
            match self.script.get(date).copied().unwrap_or(Scripted::Empty) {
                Scripted::Item => Ok(SourceResponse::Item(sample_record(&util::format_yyyymmdd(date)))),
                Scripted::Empty => Ok(SourceResponse::Empty),
                Scripted::Malformed => Ok(SourceResponse::Malformed("missing field 'clpr'".to_string())),
                Scripted::Fail => Err(LookbackError::HttpStatus {
                    status: 503,
                    body: "Service Unavailable".to_string(),
                }),
            }
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn isin() -> Identifier {
        Identifier::isin("KR7003230000").unwrap()
    }

    fn fetcher(source: &Arc<ScriptedSource>, reference: NaiveDate, mode: ProbeMode) -> LookbackFetcher {
        let config = Config::new()
            .with_reference_date(Some(reference))
            .with_mode(mode);
        LookbackFetcher::new(config, source.clone())
    }

    #[tokio::test]
    async fn returns_first_item_and_stops() {
        let reference = ymd(2025, 1, 6);
        let source = ScriptedSource::new(vec![(ymd(2025, 1, 3), Scripted::Item)]);

        let record = fetcher(&source, reference, ProbeMode::Sequential)
            .fetch_latest_price(&isin(), 7)
            .await
            .unwrap();

        assert_eq!(record.trade_date, "20250103");
        assert_eq!(
            source.calls(),
            vec![ymd(2025, 1, 6), ymd(2025, 1, 5), ymd(2025, 1, 4), ymd(2025, 1, 3)]
        );
    }

    #[tokio::test]
    async fn exhaustion_probes_every_day_once() {
        let reference = ymd(2025, 3, 2);
        let source = ScriptedSource::new(vec![]);

        let err = fetcher(&source, reference, ProbeMode::Sequential)
            .fetch_latest_price(&isin(), 5)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        let calls = source.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0], reference);
        for pair in calls.windows(2) {
            assert_eq!(pair[0].pred_opt().unwrap(), pair[1]);
        }
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_search() {
        let reference = ymd(2025, 1, 6);
        let source = ScriptedSource::new(vec![
            (ymd(2025, 1, 6), Scripted::Fail),
            (ymd(2025, 1, 5), Scripted::Malformed),
            (ymd(2025, 1, 4), Scripted::Item),
        ]);

        let report = fetcher(&source, reference, ProbeMode::Sequential)
            .probe_window(&isin(), 7)
            .await
            .unwrap();

        assert_eq!(report.requests(), 3);
        assert_eq!(report.failures(), 1);
        assert!(matches!(report.attempts[0].outcome, AttemptOutcome::Failed(_)));
        assert_eq!(
            report.attempts[1].outcome,
            AttemptOutcome::NoData("missing field 'clpr'".to_string())
        );
        assert_eq!(report.attempts[2].outcome, AttemptOutcome::Found);
        assert_eq!(report.record.unwrap().trade_date, "20250104");
    }

    #[tokio::test]
    async fn all_errors_end_in_not_found() {
        let reference = ymd(2025, 1, 6);
        let source = ScriptedSource::new(vec![
            (ymd(2025, 1, 6), Scripted::Fail),
            (ymd(2025, 1, 5), Scripted::Fail),
            (ymd(2025, 1, 4), Scripted::Fail),
            (ymd(2025, 1, 3), Scripted::Item),
        ]);

        let report = fetcher(&source, reference, ProbeMode::Sequential)
            .probe_window(&isin(), 3)
            .await
            .unwrap();

        assert_eq!(report.requests(), 3);
        assert_eq!(report.failures(), 3);
        assert_eq!(source.calls().len(), 3);
        match report.into_result() {
            Err(LookbackError::NotFound { identifier, days }) => {
                assert_eq!(identifier, "ISIN KR7003230000");
                assert_eq!(days, 3);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn configured_window_bounds_fetch_latest() {
        let reference = ymd(2025, 1, 6);
        let source = ScriptedSource::new(vec![(ymd(2025, 1, 3), Scripted::Item)]);
        let config = Config::new()
            .with_reference_date(Some(reference))
            .with_max_days(3);
        let fetcher = LookbackFetcher::new(config, source.clone());

        assert_eq!(fetcher.window(), 3);
        match fetcher.fetch_latest(&isin()).await {
            Err(LookbackError::NotFound { days, .. }) => assert_eq!(days, 3),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert_eq!(source.calls(), vec![ymd(2025, 1, 6), ymd(2025, 1, 5), ymd(2025, 1, 4)]);

        let record = fetcher.fetch_latest_price(&isin(), 4).await.unwrap();
        assert_eq!(record.trade_date, "20250103");
    }

    #[tokio::test]
    async fn single_day_window() {
        let reference = ymd(2025, 1, 3);
        let source = ScriptedSource::new(vec![(reference, Scripted::Item)]);

        let record = fetcher(&source, reference, ProbeMode::Sequential)
            .fetch_latest_price(&isin(), 1)
            .await
            .unwrap();

        assert_eq!(record.trade_date, "20250103");
        assert_eq!(source.calls(), vec![reference]);
    }

    #[tokio::test]
    async fn rejects_empty_window_and_future_reference() {
        let source = ScriptedSource::new(vec![]);

        let err = fetcher(&source, ymd(2025, 1, 3), ProbeMode::Sequential)
            .fetch_latest_price(&isin(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, LookbackError::ConfigError(_)));

        let tomorrow = chrono::Local::now().date_naive().succ_opt().unwrap();
        let err = fetcher(&source, tomorrow, ProbeMode::Sequential)
            .fetch_latest_price(&isin(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, LookbackError::ConfigError(_)));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn concurrent_mode_keeps_the_most_recent_hit() {
        let reference = ymd(2025, 1, 10);
        let source = ScriptedSource::new(vec![
            (ymd(2025, 1, 9), Scripted::Fail),
            (ymd(2025, 1, 8), Scripted::Item),
            (ymd(2025, 1, 6), Scripted::Item),
        ]);

        let report = fetcher(&source, reference, ProbeMode::Concurrent)
            .probe_window(&isin(), 5)
            .await
            .unwrap();

        assert_eq!(report.requests(), 5);
        assert_eq!(source.calls().len(), 5);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.record.unwrap().trade_date, "20250108");
        let dates: Vec<NaiveDate> = report.attempts.iter().map(|a| a.date).collect();
        assert_eq!(dates, util::candidate_dates(reference, 5));
    }
}
