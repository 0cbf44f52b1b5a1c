use crate::config::Settings;
use crate::domain::market::{CompanyProfile, DataSource, PriceBar, Quote};
use crate::domain::{normalize_symbol, round_to};
use crate::error::UpstreamError;
use crate::market::types::{
    parse_number, DailySeriesEnvelope, GlobalQuoteEnvelope, OverviewRaw,
};
use crate::market::{fallback, MarketDataProvider};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::time::Duration;

const PROVIDER: &str = "alpha_vantage";
const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
const DEFAULT_RETRIES: u32 = 2;
const COMPACT_OUTPUT_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retries: u32,
}

impl AlphaVantageClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = match settings.require_alpha_vantage_api_key() {
            Ok(key) => Some(key.to_string()),
            Err(err) => {
                tracing::warn!(error = %err, "market data will be synthetic");
                None
            }
        };

        let base_url = settings
            .alpha_vantage_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let retries = std::env::var("ALPHA_VANTAGE_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(settings.upstream_timeout())
            .build()
            .context("failed to build Alpha Vantage http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            retries,
        })
    }

    fn url(&self) -> String {
        format!("{}/query", self.base_url.trim_end_matches('/'))
    }

    async fn fetch_once(&self, params: &[(&str, &str)]) -> Result<Value, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::NotConfigured {
                provider: PROVIDER,
                detail: "ALPHA_VANTAGE_API_KEY is not set".to_string(),
            })?;

        let res = self
            .http
            .get(self.url())
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                provider: PROVIDER,
                source,
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|source| UpstreamError::Transport {
            provider: PROVIDER,
            source,
        })?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                provider: PROVIDER,
                status,
                body: text,
            });
        }

        let raw = serde_json::from_str::<Value>(&text).map_err(|e| {
            UpstreamError::malformed(PROVIDER, format!("response is not valid JSON: {e}"))
        })?;
        check_envelope(&raw)?;
        Ok(raw)
    }

    async fn fetch(&self, params: &[(&str, &str)]) -> Result<Value, UpstreamError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(params).await {
                Ok(raw) => return Ok(raw),
                Err(err) => {
                    if attempt >= self.retries || !err.is_retryable() {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "Alpha Vantage fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    pub async fn try_quote(&self, symbol: &str) -> Result<Quote, UpstreamError> {
        let raw = self
            .fetch(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        let mut quote = parse_global_quote(symbol, raw)?;
        quote.timestamp = Some(Utc::now());
        Ok(quote)
    }

    pub async fn try_overview(&self, symbol: &str) -> Result<CompanyProfile, UpstreamError> {
        let raw = self
            .fetch(&[("function", "OVERVIEW"), ("symbol", symbol)])
            .await?;
        parse_overview(symbol, raw)
    }

    pub async fn try_daily_history(
        &self,
        symbol: &str,
        days: usize,
    ) -> Result<Vec<PriceBar>, UpstreamError> {
        let output_size = if days <= COMPACT_OUTPUT_SIZE {
            "compact"
        } else {
            "full"
        };
        let raw = self
            .fetch(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", output_size),
            ])
            .await?;
        parse_daily_series(raw, days)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for AlphaVantageClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn get_quote(&self, symbol: &str) -> Quote {
        let symbol = normalize_symbol(symbol);
        match self.try_quote(&symbol).await {
            Ok(quote) => quote,
            Err(err) => {
                tracing::warn!(%symbol, kind = err.kind(), error = %err, "quote unavailable; serving fallback");
                fallback::quote(&symbol)
            }
        }
    }

    async fn get_company_overview(&self, symbol: &str) -> CompanyProfile {
        let symbol = normalize_symbol(symbol);
        match self.try_overview(&symbol).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(%symbol, kind = err.kind(), error = %err, "overview unavailable; serving fallback");
                fallback::company_profile(&symbol)
            }
        }
    }

    async fn get_daily_history(&self, symbol: &str, days: usize) -> Vec<PriceBar> {
        let symbol = normalize_symbol(symbol);
        match self.try_daily_history(&symbol, days).await {
            Ok(bars) => bars,
            Err(err) => {
                tracing::warn!(%symbol, days, kind = err.kind(), error = %err, "daily history unavailable; serving fallback");
                fallback::daily_history(&symbol, days, Utc::now().date_naive())
            }
        }
    }
}

/// Alpha Vantage answers errors and throttling with HTTP 200 and a message key.
pub fn check_envelope(raw: &Value) -> Result<(), UpstreamError> {
    if let Some(msg) = raw.get("Error Message").and_then(Value::as_str) {
        return Err(UpstreamError::malformed(PROVIDER, msg));
    }
    if let Some(msg) = raw
        .get("Note")
        .or_else(|| raw.get("Information"))
        .and_then(Value::as_str)
    {
        return Err(UpstreamError::RateLimited {
            provider: PROVIDER,
            message: msg.to_string(),
        });
    }
    Ok(())
}

pub fn parse_global_quote(symbol: &str, raw: Value) -> Result<Quote, UpstreamError> {
    let envelope = serde_json::from_value::<GlobalQuoteEnvelope>(raw)
        .map_err(|e| UpstreamError::malformed(PROVIDER, format!("unexpected quote shape: {e}")))?;
    let q = envelope
        .global_quote
        .ok_or_else(|| UpstreamError::malformed(PROVIDER, "missing Global Quote"))?;

    let price = parse_number(q.price.as_deref())
        .filter(|p| *p > 0.0)
        .ok_or_else(|| UpstreamError::malformed(PROVIDER, "missing or non-positive price"))?;
    let change = parse_number(q.change.as_deref()).unwrap_or(0.0);
    let prev_close = parse_number(q.previous_close.as_deref()).unwrap_or(price - change);
    let change_percent = if prev_close != 0.0 {
        round_to(change / prev_close * 100.0, 4)
    } else {
        parse_number(q.change_percent.as_deref()).unwrap_or(0.0)
    };

    let symbol = q
        .symbol
        .as_deref()
        .map(normalize_symbol)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| normalize_symbol(symbol));

    Ok(Quote {
        symbol,
        price,
        change,
        change_percent,
        volume: parse_number(q.volume.as_deref())
            .filter(|v| *v >= 0.0)
            .map(|v| v as u64)
            .unwrap_or(0),
        high: parse_number(q.high.as_deref()).unwrap_or(price),
        low: parse_number(q.low.as_deref()).unwrap_or(price),
        open: parse_number(q.open.as_deref()).unwrap_or(prev_close),
        prev_close,
        latest_trading_day: q
            .latest_trading_day
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
        timestamp: None,
        source: DataSource::AlphaVantage,
    })
}

pub fn parse_overview(symbol: &str, raw: Value) -> Result<CompanyProfile, UpstreamError> {
    let o = serde_json::from_value::<OverviewRaw>(raw).map_err(|e| {
        UpstreamError::malformed(PROVIDER, format!("unexpected overview shape: {e}"))
    })?;

    let symbol = normalize_symbol(symbol);
    let name = o
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| UpstreamError::malformed(PROVIDER, "empty overview"))?;

    let text = |v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
    };

    Ok(CompanyProfile {
        symbol,
        name,
        description: text(o.description),
        exchange: text(o.exchange),
        sector: text(o.sector),
        industry: text(o.industry),
        market_cap: parse_number(o.market_capitalization.as_deref()),
        pe_ratio: parse_number(o.pe_ratio.as_deref()),
        price_to_book: parse_number(o.price_to_book_ratio.as_deref()),
        dividend_yield: parse_number(o.dividend_yield.as_deref()),
        eps: parse_number(o.eps.as_deref()),
        revenue_ttm: parse_number(o.revenue_ttm.as_deref()),
        profit_margin: parse_number(o.profit_margin.as_deref()),
        operating_margin: parse_number(o.operating_margin_ttm.as_deref()),
        return_on_equity: parse_number(o.return_on_equity_ttm.as_deref()),
        debt_to_equity: parse_number(o.debt_to_equity_ratio.as_deref()),
        beta: parse_number(o.beta.as_deref()),
        week_52_high: parse_number(o.week_52_high.as_deref()),
        week_52_low: parse_number(o.week_52_low.as_deref()),
        shares_outstanding: parse_number(o.shares_outstanding.as_deref()),
        analyst_target_price: parse_number(o.analyst_target_price.as_deref()),
        source: DataSource::AlphaVantage,
    })
}

pub fn parse_daily_series(raw: Value, days: usize) -> Result<Vec<PriceBar>, UpstreamError> {
    let envelope = serde_json::from_value::<DailySeriesEnvelope>(raw).map_err(|e| {
        UpstreamError::malformed(PROVIDER, format!("unexpected daily series shape: {e}"))
    })?;
    let series = envelope
        .series
        .ok_or_else(|| UpstreamError::malformed(PROVIDER, "missing Time Series (Daily)"))?;

    // BTreeMap keys are ISO dates, so iteration is already oldest first.
    let mut bars: Vec<PriceBar> = series
        .into_iter()
        .filter_map(|(date, bar)| {
            Some(PriceBar {
                date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?,
                open: parse_number(Some(bar.open.as_str()))?,
                high: parse_number(Some(bar.high.as_str()))?,
                low: parse_number(Some(bar.low.as_str()))?,
                close: parse_number(Some(bar.close.as_str()))?,
                volume: parse_number(Some(bar.volume.as_str())).map(|v| v.max(0.0) as u64)?,
            })
        })
        .collect();

    if bars.is_empty() {
        return Err(UpstreamError::malformed(PROVIDER, "daily series has no usable bars"));
    }
    if bars.len() > days {
        bars.drain(..bars.len() - days);
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_global_quote() {
        let raw = json!({
            "Global Quote": {
                "01. symbol": "IBM",
                "02. open": "170.0000",
                "03. high": "172.5000",
                "04. low": "169.1000",
                "05. price": "171.2000",
                "06. volume": "3456789",
                "07. latest trading day": "2026-01-27",
                "08. previous close": "168.0000",
                "09. change": "3.2000",
                "10. change percent": "1.9048%"
            }
        });

        let q = parse_global_quote("ibm", raw).unwrap();
        assert_eq!(q.symbol, "IBM");
        assert_eq!(q.price, 171.2);
        assert_eq!(q.volume, 3_456_789);
        assert_eq!(q.source, DataSource::AlphaVantage);
        assert_eq!(q.latest_trading_day, NaiveDate::from_ymd_opt(2026, 1, 27));
        assert!((q.change_percent - 1.9048).abs() < 1e-3);
    }

    #[test]
    fn empty_global_quote_is_malformed() {
        let err = parse_global_quote("NOPE", json!({"Global Quote": {}})).unwrap_err();
        assert_eq!(err.kind(), "malformed_payload");
    }

    #[test]
    fn detects_error_and_throttle_envelopes() {
        let err = check_envelope(&json!({"Error Message": "Invalid API call"})).unwrap_err();
        assert!(matches!(err, UpstreamError::Malformed { .. }));

        let err = check_envelope(&json!({"Note": "Thank you for using Alpha Vantage!"})).unwrap_err();
        assert!(matches!(err, UpstreamError::RateLimited { .. }));

        assert!(check_envelope(&json!({"Global Quote": {}})).is_ok());
    }

    #[test]
    fn overview_keeps_missing_ratios_absent() {
        let raw = json!({
            "Symbol": "IBM",
            "Name": "International Business Machines",
            "Sector": "TECHNOLOGY",
            "PERatio": "22.5",
            "ProfitMargin": "0.1250",
            "ReturnOnEquityTTM": "None",
            "Beta": "-",
            "52WeekHigh": "199.18",
            "52WeekLow": "135.87",
            "AnalystTargetPrice": "185.00"
        });

        let p = parse_overview("IBM", raw).unwrap();
        assert_eq!(p.name, "International Business Machines");
        assert_eq!(p.pe_ratio, Some(22.5));
        assert_eq!(p.profit_margin, Some(0.125));
        assert_eq!(p.return_on_equity, None);
        assert_eq!(p.beta, None);
        assert_eq!(p.debt_to_equity, None);
        assert_eq!(p.week_52_high, Some(199.18));
    }

    #[test]
    fn empty_overview_is_malformed() {
        assert!(parse_overview("NOPE", json!({})).is_err());
    }

    #[test]
    fn daily_series_is_ascending_and_truncated() {
        let bar = |close: &str| {
            json!({
                "1. open": "10.0", "2. high": "11.0", "3. low": "9.0",
                "4. close": close, "5. volume": "1000"
            })
        };
        let raw = json!({
            "Time Series (Daily)": {
                "2026-01-23": bar("10.1"),
                "2026-01-26": bar("10.2"),
                "2026-01-27": bar("10.3"),
                "garbage": bar("10.4"),
            }
        });

        let bars = parse_daily_series(raw, 2).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 10.2);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2026, 1, 27).unwrap());
    }

    #[tokio::test]
    async fn unconfigured_client_serves_fallback() {
        let client = AlphaVantageClient::from_settings(&Settings::default()).unwrap();

        let quote = client.get_quote("msft").await;
        assert_eq!(quote, fallback::quote("MSFT"));

        let profile = client.get_company_overview("MSFT").await;
        assert_eq!(profile.source, DataSource::Fallback);

        let bars = client.get_daily_history("MSFT", 20).await;
        assert_eq!(bars.len(), 20);
    }
}
