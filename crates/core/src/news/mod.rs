pub mod parse;
pub mod perplexity;
pub mod sentiment;

use crate::domain::news::{NewsItem, NewsOrigin, Sentiment};
use crate::domain::normalize_symbol;
use crate::market::MarketDataProvider;
use serde::Serialize;
use std::cmp::Ordering;

pub const SYSTEM_SOURCE: &str = "acera_system";

const COMPANY_FETCH: usize = 15;
const SECTOR_FETCH: usize = 10;
const EARNINGS_FETCH: usize = 20;
const SIDE_CATEGORY_CAP: usize = 5;
const COMPREHENSIVE_LIMIT: usize = 30;
const DEFAULT_SECTOR: &str = "Technology";

/// News search. Implementations never fail: on provider trouble they return
/// a single `NewsOrigin::System` placeholder.
#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn get_stock_news(&self, symbol: &str, limit: usize) -> Vec<NewsItem>;

    async fn get_sector_news(&self, sector: &str, limit: usize) -> Vec<NewsItem>;

    async fn get_earnings_news(&self, symbol: Option<&str>, limit: usize) -> Vec<NewsItem>;

    /// General market and macro-economic news.
    async fn get_market_news(&self, limit: usize) -> Vec<NewsItem>;
}

pub fn system_fallback_item(subject: &str) -> NewsItem {
    NewsItem {
        title: format!("News temporarily unavailable for {subject}"),
        summary: "The news search provider could not be reached; analysis relies on market data only."
            .to_string(),
        source: SYSTEM_SOURCE.to_string(),
        url: None,
        published_date: None,
        sentiment: Sentiment::Neutral,
        relevance_score: 0.0,
        origin: NewsOrigin::System,
    }
}

/// Scores sentiment and relevance, orders by relevance then recency, and
/// keeps at most `limit` items.
pub fn finalize(mut items: Vec<NewsItem>, subject: Option<&str>, limit: usize) -> Vec<NewsItem> {
    for item in &mut items {
        item.sentiment = sentiment::classify(&item.title, &item.summary);
        item.relevance_score = sentiment::relevance(subject, &item.title, &item.summary);
    }

    items.sort_by(by_relevance_then_date);
    items.truncate(limit);
    items
}

/// Highest relevance first, newest first among equals, undated last.
fn by_relevance_then_date(a: &NewsItem, b: &NewsItem) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| match (&a.published_date, &b.published_date) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsType {
    Company,
    Sector,
    Earnings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedNewsItem {
    #[serde(flatten)]
    pub item: NewsItem,
    pub news_type: NewsType,
}

/// Company, sector and earnings coverage for one symbol in a single feed.
#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveNews {
    pub symbol: String,
    pub sector: String,
    pub total_count: usize,
    pub company_news_count: usize,
    pub sector_news_count: usize,
    pub earnings_news_count: usize,
    pub news: Vec<TaggedNewsItem>,
}

impl ComprehensiveNews {
    /// Counts reflect what each category returned before capping; `news`
    /// keeps every company item, at most five sector and five earnings items,
    /// and never more than thirty in total.
    pub fn merge(
        symbol: String,
        sector: String,
        company: Vec<NewsItem>,
        sector_news: Vec<NewsItem>,
        earnings: Vec<NewsItem>,
    ) -> Self {
        let company_news_count = company.len();
        let sector_news_count = sector_news.len();
        let earnings_news_count = earnings.len();

        let tag = |news_type: NewsType| move |item: NewsItem| TaggedNewsItem { item, news_type };
        let mut news: Vec<TaggedNewsItem> = company
            .into_iter()
            .map(tag(NewsType::Company))
            .chain(sector_news.into_iter().take(SIDE_CATEGORY_CAP).map(tag(NewsType::Sector)))
            .chain(earnings.into_iter().take(SIDE_CATEGORY_CAP).map(tag(NewsType::Earnings)))
            .collect();
        news.sort_by(|a, b| by_relevance_then_date(&a.item, &b.item));
        let total_count = news.len();
        news.truncate(COMPREHENSIVE_LIMIT);

        Self {
            symbol,
            sector,
            total_count,
            company_news_count,
            sector_news_count,
            earnings_news_count,
            news,
        }
    }
}

/// Looks up the symbol's sector, then fetches the requested categories
/// concurrently.
pub async fn comprehensive(
    market: &dyn MarketDataProvider,
    news: &dyn NewsProvider,
    symbol: &str,
    include_sector: bool,
    include_earnings: bool,
) -> ComprehensiveNews {
    let symbol = normalize_symbol(symbol);
    let sector = market
        .get_company_overview(&symbol)
        .await
        .sector
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SECTOR.to_string());

    let (company, sector_news, earnings) = tokio::join!(
        news.get_stock_news(&symbol, COMPANY_FETCH),
        async {
            if include_sector {
                news.get_sector_news(&sector, SECTOR_FETCH).await
            } else {
                Vec::new()
            }
        },
        async {
            if include_earnings {
                news.get_earnings_news(Some(&symbol), EARNINGS_FETCH).await
            } else {
                Vec::new()
            }
        },
    );

    tracing::debug!(
        %symbol,
        %sector,
        company = company.len(),
        sector_items = sector_news.len(),
        earnings = earnings.len(),
        "comprehensive news fetched"
    );
    ComprehensiveNews::merge(symbol, sector, company, sector_news, earnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(title: &str, relevance: f64, date: Option<&str>) -> NewsItem {
        NewsItem {
            relevance_score: relevance,
            ..item(title, date)
        }
    }

    fn item(title: &str, date: Option<&str>) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            summary: String::new(),
            source: "test".to_string(),
            url: None,
            published_date: date.map(str::to_string),
            sentiment: Sentiment::Neutral,
            relevance_score: 0.0,
            origin: NewsOrigin::Structured,
        }
    }

    #[test]
    fn finalize_orders_by_relevance_then_date() {
        let items = vec![
            item("Markets drift", Some("2026-01-02")),
            item("AAPL earnings beat", Some("2026-01-01")),
            item("Markets rally", Some("2026-01-05")),
            item("Undated note", None),
        ];

        let out = finalize(items, Some("AAPL"), 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].title, "AAPL earnings beat");
        assert_eq!(out[0].sentiment, Sentiment::Positive);
        assert_eq!(out[1].title, "Markets rally");
        assert_eq!(out[2].title, "Markets drift");
    }

    #[test]
    fn system_item_is_flagged() {
        let item = system_fallback_item("TSLA");
        assert!(item.is_system_generated());
        assert_eq!(item.source, SYSTEM_SOURCE);
    }

    #[test]
    fn comprehensive_caps_side_categories_and_orders_feed() {
        let company = vec![
            scored("Company low", 0.2, Some("2026-02-01")),
            scored("Company high", 0.9, Some("2026-01-01")),
        ];
        let sector: Vec<NewsItem> = (0..8)
            .map(|i| scored(&format!("Sector {i}"), 0.5, Some(format!("2026-01-{:02}", i + 1).as_str())))
            .collect();
        let earnings: Vec<NewsItem> = (0..7).map(|i| scored(&format!("Earnings {i}"), 0.1, None)).collect();

        let merged = ComprehensiveNews::merge("AAPL".into(), "Technology".into(), company, sector, earnings);
        assert_eq!(merged.company_news_count, 2);
        assert_eq!(merged.sector_news_count, 8);
        assert_eq!(merged.earnings_news_count, 7);
        assert_eq!(merged.total_count, 12);
        assert_eq!(merged.news.len(), 12);

        let count = |kind| merged.news.iter().filter(|n| n.news_type == kind).count();
        assert_eq!(count(NewsType::Sector), 5);
        assert_eq!(count(NewsType::Earnings), 5);

        assert_eq!(merged.news[0].item.title, "Company high");
        // Equal relevance falls back to newest first.
        assert_eq!(merged.news[1].item.title, "Sector 4");
        assert_eq!(merged.news[5].item.title, "Sector 0");
        assert_eq!(merged.news[6].item.title, "Company low");
        assert_eq!(merged.news[11].news_type, NewsType::Earnings);
    }

    #[test]
    fn comprehensive_feed_is_capped_at_thirty() {
        let company: Vec<NewsItem> = (0..40).map(|i| scored(&format!("C{i}"), i as f64 / 40.0, None)).collect();
        let merged = ComprehensiveNews::merge("AAPL".into(), "Technology".into(), company, Vec::new(), Vec::new());
        assert_eq!(merged.total_count, 40);
        assert_eq!(merged.news.len(), COMPREHENSIVE_LIMIT);
        assert_eq!(merged.news[0].item.title, "C39");
    }

    #[test]
    fn tagged_item_serializes_flat() {
        let tagged = TaggedNewsItem {
            item: item("Headline", None),
            news_type: NewsType::Sector,
        };
        let value = serde_json::to_value(&tagged).unwrap();
        assert_eq!(value["title"], "Headline");
        assert_eq!(value["news_type"], "sector");
    }
}
