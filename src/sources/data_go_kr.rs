use crate::config::Config;
use crate::errors::{LookbackError, Result};
use crate::models::{Identifier, PriceRecord};
use crate::sources::base::{PriceSource, SourceResponse};
use crate::util;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

/// 금융위원회 주식시세정보 (apis.data.go.kr) 일별 시세 조회
pub struct DataGoKrSource {
    client: Client,
    endpoint: String,
    service_key: String,
}

impl DataGoKrSource {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(LookbackError::RequestError)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            service_key: config.service_key.clone(),
        })
    }
}

#[async_trait]
impl PriceSource for DataGoKrSource {
    fn source_name(&self) -> &'static str {
        "data.go.kr"
    }

    async fn fetch_daily(&self, identifier: &Identifier, date: &NaiveDate) -> Result<SourceResponse> {
        let bas_dt = util::format_yyyymmdd(date);
        debug!("GET {} basDt={} {}={}", self.endpoint, bas_dt, identifier.param_name(), identifier.code());

        let response = self.client
            .get(&self.endpoint)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("numOfRows", "1"),
                ("pageNo", "1"),
                ("resultType", "json"),
                ("basDt", bas_dt.as_str()),
                (identifier.param_name(), identifier.code()),
            ])
            .send()
            .await
            .map_err(|e| LookbackError::RequestError(e.without_url()))?;  // URL carries the key

        let status = response.status();
        let text = response.text().await
            .map_err(|e| LookbackError::RequestError(e.without_url()))?;
        debug!("Raw response for {} (HTTP {}): {}", bas_dt, status.as_u16(), text);

        if !status.is_success() {
            return Err(LookbackError::HttpStatus {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        parse_response(&text)
    }
}

/// Classify a 2xx response body.
///
/// The record lives at `response.body.items.item`. The API sends an empty
/// string for `items` when nothing matched, and numbers as strings. A
/// `resultCode` other than `00`, or the XML error envelope the gateway emits
/// for key problems, is an `Err`; every other deviation is `Malformed`.
pub fn parse_response(text: &str) -> Result<SourceResponse> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(SourceResponse::Malformed("empty body".to_string()));
    }

    if trimmed.starts_with('<') {
        return match gateway_error(trimmed) {
            Ok(Some((code, message))) => Err(LookbackError::ApiError { code, message }),
            Ok(None) => Ok(SourceResponse::Malformed("unexpected XML body".to_string())),
            Err(e) => Ok(SourceResponse::Malformed(format!("invalid XML: {}", e))),
        };
    }

    let json: Value = match serde_json::from_str(trimmed) {
        Ok(json) => json,
        Err(e) => return Ok(SourceResponse::Malformed(format!("invalid JSON: {}", e))),
    };

    if let Some(code) = json.pointer("/response/header/resultCode").and_then(scalar_text) {
        if code != "00" {
            let message = json
                .pointer("/response/header/resultMsg")
                .and_then(scalar_text)
                .unwrap_or_default();
            return Err(LookbackError::ApiError { code, message });
        }
    }

    let items = match json.pointer("/response/body/items") {
        Some(items) => items,
        None => return Ok(SourceResponse::Malformed("missing response.body.items".to_string())),
    };

    let first = match items {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Object(map) => match map.get("item") {
            None | Some(Value::Null) => None,
            Some(Value::Array(list)) => list.first(),
            Some(item) if item.is_object() => Some(item),
            Some(other) => {
                return Ok(SourceResponse::Malformed(format!("unexpected item value: {}", other)))
            }
        },
        other => return Ok(SourceResponse::Malformed(format!("unexpected items value: {}", other))),
    };

    match first {
        None => Ok(SourceResponse::Empty),
        Some(item) => match parse_item(item) {
            Ok(record) => Ok(SourceResponse::Item(record)),
            Err(reason) => Ok(SourceResponse::Malformed(reason)),
        },
    }
}

fn parse_item(item: &Value) -> std::result::Result<PriceRecord, String> {
    let name = text_field(item, "itmsNm")?;
    let trade_date = text_field(item, "basDt")?;
    util::parse_yyyymmdd(&trade_date).map_err(|e| e.to_string())?;

    // fltRt must be numeric but is kept as sent
    number_field(item, "fltRt")?;

    Ok(PriceRecord {
        name,
        trade_date,
        close: price_field(item, "clpr")?,
        open: price_field(item, "mkp")?,
        high: price_field(item, "hipr")?,
        low: price_field(item, "lopr")?,
        volume: integer_field(item, "trqu")?,
        change: number_field(item, "vs")?,
        change_rate: text_field(item, "fltRt")?,
        short_code: text_field(item, "srtnCd").ok(),
        isin: text_field(item, "isinCd").ok(),
        market: text_field(item, "mrktCtg").ok(),
        trading_value: integer_field(item, "trPrc").ok(),
        market_cap: integer_field(item, "mrktTotAmt").ok(),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(item: &Value, key: &str) -> std::result::Result<String, String> {
    item.get(key)
        .and_then(scalar_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing field '{}'", key))
}

fn number_field(item: &Value, key: &str) -> std::result::Result<f64, String> {
    let raw = text_field(item, key)?;
    match raw.replace(',', "").parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("field '{}' is not a number: '{}'", key, raw)),
    }
}

fn price_field(item: &Value, key: &str) -> std::result::Result<f64, String> {
    let value = number_field(item, key)?;
    if value < 0.0 {
        return Err(format!("field '{}' is negative: {}", key, value));
    }
    Ok(value)
}

fn integer_field(item: &Value, key: &str) -> std::result::Result<u64, String> {
    let raw = text_field(item, key)?;
    raw.replace(',', "")
        .parse::<u64>()
        .map_err(|_| format!("field '{}' is not a non-negative integer: '{}'", key, raw))
}

#[derive(Default)]
struct GatewayHeader {
    reason_code: String,
    auth_msg: String,
    err_msg: String,
}

impl GatewayHeader {
    fn field(&mut self, tag: &[u8]) -> Option<&mut String> {
        match tag {
            b"returnReasonCode" => Some(&mut self.reason_code),
            b"returnAuthMsg" => Some(&mut self.auth_msg),
            b"errMsg" => Some(&mut self.err_msg),
            _ => None,
        }
    }
}

/// `(returnReasonCode, message)` from the gateway's `OpenAPI_ServiceResponse`
fn gateway_error(xml: &str) -> Result<Option<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut header = GatewayHeader::default();
    let mut current: Option<Vec<u8>> = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => current = Some(e.local_name().as_ref().to_vec()),
            Event::End(_) => current = None,
            Event::Text(t) => {
                if let Some(field) = current.as_deref().and_then(|tag| header.field(tag)) {
                    field.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(field) = current.as_deref().and_then(|tag| header.field(tag)) {
                    field.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let code = header.reason_code.trim();
    if code.is_empty() {
        return Ok(None);
    }
    let message = match header.auth_msg.trim() {
        "" => header.err_msg.trim(),
        auth => auth,
    };
    Ok(Some((code.to_string(), message.to_string())))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
