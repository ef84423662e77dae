use stockprice_lookback::config::{Config, ProbeMode, DEFAULT_ENDPOINT, SERVICE_KEY_ENV};
use stockprice_lookback::display::{self, PriceLabel};
use stockprice_lookback::models::Identifier;
use stockprice_lookback::services::LookbackFetcher;
use stockprice_lookback::sources::DataGoKrSource;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{App, Arg, ArgGroup};
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = App::new("stockprice_lookback")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Latest daily price from the FSC stock price API, stepping back over non-trading days")
        .arg(
            Arg::with_name("isin")
                .long("isin")
                .value_name("ISIN")
                .help("Look the instrument up by ISIN (e.g. KR7003230000)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("short-code")
                .long("short-code")
                .value_name("CODE")
                .help("Look the instrument up by short trading code (e.g. 003230)")
                .takes_value(true),
        )
        .group(
            ArgGroup::new("identifier")
                .args(&["isin", "short-code"])
                .required(true),
        )
        .arg(
            Arg::with_name("service-key")
                .short('k')
                .long("service-key")
                .value_name("KEY")
                .help("data.go.kr service key (decoded form); falls back to $DATA_GO_KR_SERVICE_KEY")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("days")
                .short('n')
                .long("days")
                .value_name("DAYS")
                .help("How many calendar days to search backward")
                .takes_value(true)
                .default_value("7"),
        )
        .arg(
            Arg::with_name("date")
                .short('d')
                .long("date")
                .value_name("DATE")
                .help("Day to start from (YYYY-MM-DD), defaults to today")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("endpoint")
                .long("endpoint")
                .value_name("URL")
                .help("getStockPriceInfo endpoint")
                .takes_value(true)
                .default_value(DEFAULT_ENDPOINT),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .value_name("SECS")
                .help("Per-request timeout in seconds")
                .takes_value(true)
                .default_value("30"),
        )
        .arg(
            Arg::with_name("concurrent")
                .long("concurrent")
                .help("Query every day of the window at once and keep the most recent hit")
                .takes_value(false),
        )
        .arg(
            Arg::with_name("json")
                .long("json")
                .help("Print the record as JSON")
                .takes_value(false),
        )
        .get_matches();

    let identifier = match (matches.value_of("isin"), matches.value_of("short-code")) {
        (Some(isin), None) => Identifier::isin(isin)?,
        (None, Some(code)) => Identifier::short_code(code)?,
        _ => bail!("exactly one of --isin or --short-code is required"),
    };

    let days = matches.value_of("days")
        .unwrap_or("7")
        .parse::<u32>()
        .context("--days must be a positive integer")?;
    let timeout = matches.value_of("timeout")
        .unwrap_or("30")
        .parse::<u64>()
        .context("--timeout must be a positive integer")?;
    let reference_date = matches.value_of("date")
        .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
        .transpose()
        .context("--date must be YYYY-MM-DD")?;

    let service_key = matches.value_of("service-key")
        .map(str::to_string)
        .or_else(|| std::env::var(SERVICE_KEY_ENV).ok())
        .unwrap_or_default();

    let mode = if matches.is_present("concurrent") {
        ProbeMode::Concurrent
    } else {
        ProbeMode::Sequential
    };

    let config = Config::new()
        .with_service_key(&service_key)
        .with_endpoint(matches.value_of("endpoint").unwrap_or(DEFAULT_ENDPOINT))
        .with_max_days(days)
        .with_timeout_secs(timeout)
        .with_reference_date(reference_date)
        .with_mode(mode);

    let source = DataGoKrSource::new(&config)?;
    info!("Using endpoint {} (timeout {}s)", config.endpoint, config.timeout_secs);

    let fetcher = LookbackFetcher::new(config, Arc::new(source));

    match fetcher.fetch_latest(&identifier).await {
        Ok(record) => {
            if matches.is_present("json") {
                println!("{}", display::render_json(&record)?);
            } else {
                let label = record
                    .trade_day()
                    .map(|day| display::price_label(day, &display::seoul_now()))
                    .unwrap_or(PriceLabel::Close);
                for line in display::render_record(&record, label) {
                    println!("{}", line);
                }
            }
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            println!("{}", display::render_not_found(&identifier.to_string(), fetcher.window()));
            std::process::exit(1);
        }
        Err(e) => {
            error!("Lookup failed: {}", e);
            Err(e.into())
        }
    }
}
