use crate::analysis::persona::{Persona, PersonaAnalyst};
use crate::analysis::scorer::NEUTRAL_CONFIDENCE;
use crate::analysis::{Analyst, MarketSnapshot};
use crate::config::Settings;
use crate::domain::analysis::{AnalystOpinion, ConsensusReport, DataQuality, Rating};
use crate::domain::{normalize_symbol, round_to};
use crate::market::alpha_vantage::AlphaVantageClient;
use crate::market::MarketDataProvider;
use crate::news::perplexity::PerplexityNewsClient;
use crate::news::NewsProvider;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);
const SNAPSHOT_NEWS_LIMIT: usize = 10;

/// Fans one shared snapshot out to every analyst and folds the opinions
/// into a consensus. A failed, panicked or timed-out analyst is replaced by
/// a neutral placeholder, so aggregation itself cannot fail.
#[derive(Clone)]
pub struct Aggregator {
    market: Arc<dyn MarketDataProvider>,
    news: Arc<dyn NewsProvider>,
    analysts: Vec<Arc<dyn Analyst>>,
    task_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        news: Arc<dyn NewsProvider>,
        analysts: Vec<Arc<dyn Analyst>>,
    ) -> Self {
        Self {
            market,
            news,
            analysts,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    pub fn with_personas(
        market: Arc<dyn MarketDataProvider>,
        news: Arc<dyn NewsProvider>,
    ) -> Self {
        let analysts = PersonaAnalyst::roster()
            .into_iter()
            .map(|a| Arc::new(a) as Arc<dyn Analyst>)
            .collect();
        Self::new(market, news, analysts)
    }

    /// Alpha Vantage market data, Perplexity news and the six personas.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let market = AlphaVantageClient::from_settings(settings)?;
        let news = PerplexityNewsClient::from_settings(settings);
        Ok(Self::with_personas(Arc::new(market), Arc::new(news))
            .with_task_timeout(settings.analyst_task_timeout()))
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn market(&self) -> &Arc<dyn MarketDataProvider> {
        &self.market
    }

    pub fn news(&self) -> &Arc<dyn NewsProvider> {
        &self.news
    }

    pub fn personas(&self) -> impl Iterator<Item = &Persona> {
        self.analysts.iter().map(|a| a.persona())
    }

    pub async fn fetch_snapshot(&self, symbol: &str) -> MarketSnapshot {
        let symbol = normalize_symbol(symbol);
        let (quote, profile, news) = tokio::join!(
            self.market.get_quote(&symbol),
            self.market.get_company_overview(&symbol),
            self.news.get_stock_news(&symbol, SNAPSHOT_NEWS_LIMIT),
        );
        MarketSnapshot {
            symbol,
            quote,
            profile,
            news,
        }
    }

    pub async fn aggregate(&self, symbol: &str) -> ConsensusReport {
        let snapshot = self.fetch_snapshot(symbol).await;
        self.aggregate_snapshot(&snapshot).await
    }

    pub async fn aggregate_snapshot(&self, snapshot: &MarketSnapshot) -> ConsensusReport {
        let tasks = self.analysts.iter().map(|analyst| async move {
            let persona = analyst.persona();
            let run = AssertUnwindSafe(analyst.analyze(snapshot)).catch_unwind();
            match tokio::time::timeout(self.task_timeout, run).await {
                Ok(Ok(Ok(opinion))) => opinion,
                Ok(Ok(Err(err))) => {
                    tracing::warn!(symbol = %snapshot.symbol, analyst = persona.id, error = %err, "analyst failed; using neutral opinion");
                    fallback_opinion(persona, "Analysis failed")
                }
                Ok(Err(_)) => {
                    tracing::error!(symbol = %snapshot.symbol, analyst = persona.id, "analyst panicked; using neutral opinion");
                    fallback_opinion(persona, "Analysis failed")
                }
                Err(_) => {
                    tracing::warn!(symbol = %snapshot.symbol, analyst = persona.id, timeout = ?self.task_timeout, "analyst timed out; using neutral opinion");
                    fallback_opinion(persona, "Analysis timed out")
                }
            }
        });

        let opinions = join_all(tasks).await;
        build_consensus(&snapshot.symbol, opinions, snapshot.data_quality())
    }
}

pub fn fallback_opinion(persona: &Persona, reason: &str) -> AnalystOpinion {
    AnalystOpinion {
        analyst_id: persona.id.to_string(),
        analyst_name: persona.name.to_string(),
        specialization: persona.specialization.label().to_string(),
        rating: Rating::Hold,
        confidence: NEUTRAL_CONFIDENCE,
        price_target: None,
        key_points: vec![format!(
            "{reason}; neutral placeholder opinion pending fresh data."
        )],
        timeframe: persona.specialization.timeframe().to_string(),
        technical_score: None,
        fundamental_score: None,
        fallback: true,
    }
}

/// Mode rating (earliest opinion wins ties), mean confidence, mean of the
/// targets that exist, and the modal share as agreement.
pub fn build_consensus(
    symbol: &str,
    opinions: Vec<AnalystOpinion>,
    data_quality: DataQuality,
) -> ConsensusReport {
    let total = opinions.len();

    let mut modal: Option<(Rating, usize)> = None;
    for opinion in &opinions {
        let count = opinions.iter().filter(|o| o.rating == opinion.rating).count();
        if modal.map_or(true, |(_, best)| count > best) {
            modal = Some((opinion.rating, count));
        }
    }
    let (consensus_rating, modal_count) = modal.unwrap_or((Rating::Hold, 0));

    let average_confidence = if total == 0 {
        0.0
    } else {
        round_to(
            opinions.iter().map(|o| o.confidence).sum::<f64>() / total as f64,
            1,
        )
    };

    let targets: Vec<f64> = opinions.iter().filter_map(|o| o.price_target).collect();
    let average_price_target = (!targets.is_empty())
        .then(|| round_to(targets.iter().sum::<f64>() / targets.len() as f64, 2));

    let agreement_level = if total == 0 {
        0.0
    } else {
        round_to(modal_count as f64 / total as f64 * 100.0, 1)
    };

    ConsensusReport {
        symbol: symbol.to_string(),
        opinions,
        consensus_rating,
        average_confidence,
        average_price_target,
        agreement_level,
        data_quality,
        generated_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::persona::roster;
    use crate::domain::market::{CompanyProfile, PriceBar, Quote};
    use crate::domain::news::NewsItem;
    use crate::market::fallback;
    use crate::news::system_fallback_item;

    enum Behavior {
        Rate(Rating, Option<f64>),
        Fail,
        Stall,
        Panic,
    }

    struct ScriptedAnalyst {
        persona: Persona,
        behavior: Behavior,
    }

    #[async_trait::async_trait]
    impl Analyst for ScriptedAnalyst {
        fn persona(&self) -> &Persona {
            &self.persona
        }

        async fn analyze(&self, _snapshot: &MarketSnapshot) -> anyhow::Result<AnalystOpinion> {
            match &self.behavior {
                Behavior::Rate(rating, target) => {
                    let mut opinion = fallback_opinion(&self.persona, "scripted");
                    opinion.rating = *rating;
                    opinion.price_target = *target;
                    opinion.confidence = 80.0;
                    opinion.fallback = false;
                    Ok(opinion)
                }
                Behavior::Fail => anyhow::bail!("upstream exploded"),
                Behavior::Stall => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    anyhow::bail!("unreachable")
                }
                Behavior::Panic => panic!("analyst bug"),
            }
        }
    }

    struct OfflineMarket;

    #[async_trait::async_trait]
    impl MarketDataProvider for OfflineMarket {
        fn provider_name(&self) -> &'static str {
            "offline"
        }

        async fn get_quote(&self, symbol: &str) -> Quote {
            fallback::quote(symbol)
        }

        async fn get_company_overview(&self, symbol: &str) -> CompanyProfile {
            fallback::company_profile(symbol)
        }

        async fn get_daily_history(&self, symbol: &str, days: usize) -> Vec<PriceBar> {
            let end = chrono::NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
            fallback::daily_history(symbol, days, end)
        }
    }

    struct OfflineNews;

    #[async_trait::async_trait]
    impl NewsProvider for OfflineNews {
        fn provider_name(&self) -> &'static str {
            "offline"
        }

        async fn get_stock_news(&self, symbol: &str, _limit: usize) -> Vec<NewsItem> {
            vec![system_fallback_item(symbol)]
        }

        async fn get_sector_news(&self, sector: &str, _limit: usize) -> Vec<NewsItem> {
            vec![system_fallback_item(sector)]
        }

        async fn get_earnings_news(&self, _symbol: Option<&str>, _limit: usize) -> Vec<NewsItem> {
            Vec::new()
        }

        async fn get_market_news(&self, _limit: usize) -> Vec<NewsItem> {
            Vec::new()
        }
    }

    fn aggregator(behaviors: Vec<Behavior>) -> Aggregator {
        let personas = roster();
        let analysts = behaviors
            .into_iter()
            .enumerate()
            .map(|(i, behavior)| {
                Arc::new(ScriptedAnalyst {
                    persona: personas[i % personas.len()].clone(),
                    behavior,
                }) as Arc<dyn Analyst>
            })
            .collect();
        Aggregator::new(Arc::new(OfflineMarket), Arc::new(OfflineNews), analysts)
            .with_task_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn modal_rating_and_agreement() {
        use Rating::*;
        let agg = aggregator(vec![
            Behavior::Rate(Buy, Some(110.0)),
            Behavior::Rate(Buy, Some(120.0)),
            Behavior::Rate(Hold, None),
            Behavior::Rate(Buy, Some(130.0)),
            Behavior::Rate(Sell, None),
        ]);

        let report = agg.aggregate("aapl").await;
        assert_eq!(report.symbol, "AAPL");
        assert_eq!(report.consensus_rating, Buy);
        assert_eq!(report.agreement_level, 60.0);
        assert_eq!(report.average_price_target, Some(120.0));
        assert_eq!(report.average_confidence, 80.0);
        assert_eq!(report.opinions.len(), 5);
    }

    #[tokio::test]
    async fn every_analyst_failing_still_yields_a_report() {
        let agg = aggregator(vec![
            Behavior::Fail,
            Behavior::Fail,
            Behavior::Fail,
            Behavior::Fail,
            Behavior::Fail,
        ]);

        let report = agg.aggregate("MSFT").await;
        assert_eq!(report.opinions.len(), 5);
        assert!(report.opinions.iter().all(|o| o.fallback && o.rating == Rating::Hold));
        assert_eq!(report.consensus_rating, Rating::Hold);
        assert_eq!(report.average_confidence, NEUTRAL_CONFIDENCE);
        assert_eq!(report.average_price_target, None);
        assert_eq!(report.agreement_level, 100.0);
        assert_eq!(report.data_quality, DataQuality::Fallback);
    }

    #[tokio::test]
    async fn timeouts_and_panics_are_contained() {
        let agg = aggregator(vec![
            Behavior::Stall,
            Behavior::Panic,
            Behavior::Rate(Rating::Buy, Some(50.0)),
        ]);

        let report = agg.aggregate("TSLA").await;
        assert!(report.opinions[0].fallback);
        assert!(report.opinions[0].key_points[0].contains("timed out"));
        assert!(report.opinions[1].fallback);
        assert!(!report.opinions[2].fallback);
        // Two neutral placeholders outvote the single Buy.
        assert_eq!(report.consensus_rating, Rating::Hold);
    }

    #[tokio::test]
    async fn opinions_keep_registration_order() {
        let agg = aggregator(vec![
            Behavior::Rate(Rating::Sell, None),
            Behavior::Fail,
            Behavior::Rate(Rating::Buy, None),
        ]);
        let report = agg.aggregate("IBM").await;
        let ids: Vec<_> = report.opinions.iter().map(|o| o.analyst_id.as_str()).collect();
        assert_eq!(ids, ["michael_rodriguez", "sarah_chen", "elena_volkov"]);
    }

    #[test]
    fn ties_go_to_the_earliest_registered_rating() {
        let persona = &roster()[0];
        let opinion = |rating| {
            let mut o = fallback_opinion(persona, "t");
            o.rating = rating;
            o
        };
        let report = build_consensus(
            "X",
            vec![
                opinion(Rating::Sell),
                opinion(Rating::Buy),
                opinion(Rating::Buy),
                opinion(Rating::Sell),
            ],
            DataQuality::Live,
        );
        assert_eq!(report.consensus_rating, Rating::Sell);
        assert_eq!(report.agreement_level, 50.0);
    }

    #[test]
    fn agreement_is_full_only_when_unanimous() {
        let persona = &roster()[0];
        let unanimous = build_consensus(
            "X",
            vec![fallback_opinion(persona, "a"), fallback_opinion(persona, "b")],
            DataQuality::Live,
        );
        assert_eq!(unanimous.agreement_level, 100.0);

        let mut split = vec![fallback_opinion(persona, "a"), fallback_opinion(persona, "b")];
        split[1].rating = Rating::Buy;
        let split = build_consensus("X", split, DataQuality::Live);
        assert!(split.agreement_level < 100.0);

        let empty = build_consensus("X", Vec::new(), DataQuality::Fallback);
        assert_eq!(empty.agreement_level, 0.0);
        assert_eq!(empty.consensus_rating, Rating::Hold);
    }

    #[tokio::test]
    async fn persona_pipeline_is_deterministic_on_fallback_data() {
        let agg = Aggregator::with_personas(Arc::new(OfflineMarket), Arc::new(OfflineNews));
        assert_eq!(agg.personas().count(), 6);

        let a = agg.aggregate("NVDA").await;
        let b = agg.aggregate("NVDA").await;
        assert_eq!(a.opinions, b.opinions);
        assert_eq!(a.consensus_rating, b.consensus_rating);
        assert_eq!(a.agreement_level, 100.0);
        assert_eq!(a.data_quality, DataQuality::Fallback);
    }
}
