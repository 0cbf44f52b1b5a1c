use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    AlphaVantage,
    Perplexity,
    /// Deterministic synthetic values generated after an upstream failure.
    Fallback,
}

impl DataSource {
    pub fn is_live(&self) -> bool {
        !matches!(self, DataSource::Fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub prev_close: f64,
    pub latest_trading_day: Option<NaiveDate>,
    /// Observation time. Absent on fallback quotes so they stay reproducible.
    pub timestamp: Option<DateTime<Utc>>,
    pub source: DataSource,
}

impl Quote {
    pub fn has_usable_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Company fundamentals. Ratios the vendor does not report stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: String,
    pub description: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub price_to_book: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub eps: Option<f64>,
    pub revenue_ttm: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub beta: Option<f64>,
    pub week_52_high: Option<f64>,
    pub week_52_low: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub analyst_target_price: Option<f64>,
    pub source: DataSource,
}

impl CompanyProfile {
    /// A profile with only identity fields set.
    pub fn empty(symbol: &str, source: DataSource) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            description: None,
            exchange: None,
            sector: None,
            industry: None,
            market_cap: None,
            pe_ratio: None,
            price_to_book: None,
            dividend_yield: None,
            eps: None,
            revenue_ttm: None,
            profit_margin: None,
            operating_margin: None,
            return_on_equity: None,
            debt_to_equity: None,
            beta: None,
            week_52_high: None,
            week_52_low: None,
            shares_outstanding: None,
            analyst_target_price: None,
            source,
        }
    }
}

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}
