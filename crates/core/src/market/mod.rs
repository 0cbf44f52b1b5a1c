pub mod alpha_vantage;
pub mod fallback;
pub mod types;

use crate::domain::market::{CompanyProfile, PriceBar, Quote};

/// Quote and fundamentals source.
///
/// Implementations never fail: upstream problems are logged and answered
/// with deterministic fallback data tagged `DataSource::Fallback`.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn get_quote(&self, symbol: &str) -> Quote;

    async fn get_company_overview(&self, symbol: &str) -> CompanyProfile;

    /// Most recent `days` daily bars, oldest first.
    async fn get_daily_history(&self, symbol: &str, days: usize) -> Vec<PriceBar>;
}
