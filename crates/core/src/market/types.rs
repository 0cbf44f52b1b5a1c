//! Alpha Vantage wire shapes. Every field is a string upstream.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalQuoteEnvelope {
    #[serde(rename = "Global Quote", default)]
    pub global_quote: Option<GlobalQuoteRaw>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalQuoteRaw {
    #[serde(rename = "01. symbol", default)]
    pub symbol: Option<String>,
    #[serde(rename = "02. open", default)]
    pub open: Option<String>,
    #[serde(rename = "03. high", default)]
    pub high: Option<String>,
    #[serde(rename = "04. low", default)]
    pub low: Option<String>,
    #[serde(rename = "05. price", default)]
    pub price: Option<String>,
    #[serde(rename = "06. volume", default)]
    pub volume: Option<String>,
    #[serde(rename = "07. latest trading day", default)]
    pub latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close", default)]
    pub previous_close: Option<String>,
    #[serde(rename = "09. change", default)]
    pub change: Option<String>,
    #[serde(rename = "10. change percent", default)]
    pub change_percent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OverviewRaw {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market_capitalization: Option<String>,
    #[serde(rename = "PERatio", default)]
    pub pe_ratio: Option<String>,
    #[serde(default)]
    pub price_to_book_ratio: Option<String>,
    #[serde(default)]
    pub dividend_yield: Option<String>,
    #[serde(rename = "EPS", default)]
    pub eps: Option<String>,
    #[serde(rename = "RevenueTTM", default)]
    pub revenue_ttm: Option<String>,
    #[serde(default)]
    pub profit_margin: Option<String>,
    #[serde(rename = "OperatingMarginTTM", default)]
    pub operating_margin_ttm: Option<String>,
    #[serde(rename = "ReturnOnEquityTTM", default)]
    pub return_on_equity_ttm: Option<String>,
    #[serde(default, alias = "DebtToEquity")]
    pub debt_to_equity_ratio: Option<String>,
    #[serde(default)]
    pub beta: Option<String>,
    #[serde(rename = "52WeekHigh", default)]
    pub week_52_high: Option<String>,
    #[serde(rename = "52WeekLow", default)]
    pub week_52_low: Option<String>,
    #[serde(default)]
    pub shares_outstanding: Option<String>,
    #[serde(default)]
    pub analyst_target_price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailySeriesEnvelope {
    #[serde(rename = "Time Series (Daily)", default)]
    pub series: Option<BTreeMap<String, DailyBarRaw>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyBarRaw {
    #[serde(rename = "1. open")]
    pub open: String,
    #[serde(rename = "2. high")]
    pub high: String,
    #[serde(rename = "3. low")]
    pub low: String,
    #[serde(rename = "4. close")]
    pub close: String,
    #[serde(rename = "5. volume")]
    pub volume: String,
}

/// Parses an Alpha Vantage numeric string. `"None"`, `"-"`, blanks and
/// non-finite values are absent; a trailing `%` is stripped.
pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    let s = raw?.trim().trim_end_matches('%').trim();
    if s.is_empty() || s == "-" || s.eq_ignore_ascii_case("none") {
        return None;
    }
    s.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}
