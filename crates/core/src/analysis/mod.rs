pub mod aggregator;
pub mod persona;
pub mod scorer;
pub mod valuation;

use crate::domain::analysis::{AnalystOpinion, DataQuality};
use crate::domain::market::{CompanyProfile, Quote};
use crate::domain::news::NewsItem;
use persona::Persona;
use serde::Serialize;

/// Data fetched once per symbol and shared read-only by every analyst.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub quote: Quote,
    pub profile: CompanyProfile,
    pub news: Vec<NewsItem>,
}

impl MarketSnapshot {
    pub fn data_quality(&self) -> DataQuality {
        DataQuality::from_liveness(&[
            self.quote.source.is_live(),
            self.profile.source.is_live(),
            self.news.iter().any(|item| !item.is_system_generated()),
        ])
    }
}

#[async_trait::async_trait]
pub trait Analyst: Send + Sync {
    fn persona(&self) -> &Persona;

    async fn analyze(&self, snapshot: &MarketSnapshot) -> anyhow::Result<AnalystOpinion>;
}
