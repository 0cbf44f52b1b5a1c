use crate::config::Settings;
use crate::domain::news::NewsItem;
use crate::domain::normalize_symbol;
use crate::llm::openai::ChatCompletionsClient;
use crate::llm::{json, ChatPrompt, LlmClient};
use crate::news::{finalize, parse, system_fallback_item, NewsProvider};
use std::sync::Arc;

const PROVIDER: &str = "perplexity";
const DEFAULT_SOURCE: &str = "perplexity";
const GENERIC_SOURCE: &str = "perplexity_analysis";
const RECENCY_WINDOW: &str = "month";

const SYSTEM_PROMPT: &str = "\
You are a financial news research assistant with live web search.
Answer with a JSON array only. No markdown, no commentary.
Each element must be an object with keys:
  \"title\" (string), \"source\" (publisher name), \"published_date\" (YYYY-MM-DD),
  \"summary\" (two sentences at most), \"url\" (string or null).
Only include stories published in the last 30 days. Newest first.";

#[derive(Debug, Clone, Copy)]
enum NewsRequest<'a> {
    Stock(&'a str),
    Sector(&'a str),
    Earnings(Option<&'a str>),
    Market,
}

impl NewsRequest<'_> {
    fn subject(&self) -> Option<&str> {
        match *self {
            NewsRequest::Stock(symbol) => Some(symbol),
            NewsRequest::Sector(sector) => Some(sector),
            NewsRequest::Earnings(symbol) => symbol,
            NewsRequest::Market => None,
        }
    }

    fn label(&self) -> String {
        match self {
            NewsRequest::Stock(symbol) => symbol.to_string(),
            NewsRequest::Sector(sector) => format!("{sector} sector"),
            NewsRequest::Earnings(Some(symbol)) => format!("{symbol} earnings"),
            NewsRequest::Earnings(None) => "earnings season".to_string(),
            NewsRequest::Market => "market".to_string(),
        }
    }

    fn user_prompt(&self, limit: usize) -> String {
        match self {
            NewsRequest::Stock(symbol) => format!(
                "Find the latest {limit} news items about {symbol} stock from the past 30 days. \
                 Cover earnings results, analyst ratings and price targets, product news, \
                 partnerships and other market developments."
            ),
            NewsRequest::Sector(sector) => format!(
                "Find the latest {limit} news items about the {sector} sector from the past 30 days. \
                 Cover sector trends, major company moves, regulation and outlook."
            ),
            NewsRequest::Earnings(Some(symbol)) => format!(
                "Find the latest {limit} earnings-related news items for {symbol} from the past 30 days. \
                 Cover reported results versus estimates, guidance changes and analyst reactions."
            ),
            NewsRequest::Earnings(None) => format!(
                "Find the latest {limit} earnings announcements from major US-listed companies \
                 in the past 30 days. Cover results versus estimates and guidance changes."
            ),
            NewsRequest::Market => format!(
                "Find the latest {limit} significant market news items from the past few days. \
                 Cover Federal Reserve policy, economic indicators, sector rotation, \
                 geopolitical events affecting markets and major corporate news."
            ),
        }
    }
}

/// News search backed by a web-search chat model.
#[derive(Clone)]
pub struct PerplexityNewsClient {
    llm: Option<Arc<dyn LlmClient>>,
}

impl PerplexityNewsClient {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let llm = match ChatCompletionsClient::perplexity_from_settings(settings) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn LlmClient>),
            Err(err) => {
                tracing::warn!(error = %err, "news search disabled; serving placeholder items");
                None
            }
        };
        Self::new(llm)
    }

    async fn search(&self, request: NewsRequest<'_>, limit: usize) -> Vec<NewsItem> {
        let label = request.label();
        let Some(llm) = &self.llm else {
            return vec![system_fallback_item(&label)];
        };

        let max_tokens = (limit as u32).saturating_mul(200).clamp(800, 4000);
        let prompt = ChatPrompt::new(SYSTEM_PROMPT, request.user_prompt(limit))
            .with_search_recency(RECENCY_WINDOW)
            .with_max_tokens(max_tokens);

        let text = match llm.complete(prompt).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(subject = %label, error = %err, "news search failed; serving placeholder");
                return vec![system_fallback_item(&label)];
            }
        };

        let structured = match json::parse_news_payload(&text) {
            Ok(payload) => payload.validate_and_into_news(DEFAULT_SOURCE),
            Err(err) => {
                tracing::debug!(subject = %label, error = %err, "news answer is not structured JSON");
                Vec::new()
            }
        };

        let items = if !structured.is_empty() {
            structured
        } else {
            let heuristic = parse::parse_heuristic(&text, DEFAULT_SOURCE);
            if heuristic.is_empty() {
                tracing::warn!(subject = %label, "news answer unparseable; wrapping as a single item");
                vec![parse::generic_item(
                    &format!("{label} market analysis"),
                    &text,
                    GENERIC_SOURCE,
                )]
            } else {
                tracing::warn!(subject = %label, items = heuristic.len(), "news parsed heuristically; low confidence");
                heuristic
            }
        };

        finalize(items, request.subject(), limit)
    }
}

#[async_trait::async_trait]
impl NewsProvider for PerplexityNewsClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn get_stock_news(&self, symbol: &str, limit: usize) -> Vec<NewsItem> {
        let symbol = normalize_symbol(symbol);
        self.search(NewsRequest::Stock(&symbol), limit).await
    }

    async fn get_sector_news(&self, sector: &str, limit: usize) -> Vec<NewsItem> {
        self.search(NewsRequest::Sector(sector.trim()), limit).await
    }

    async fn get_earnings_news(&self, symbol: Option<&str>, limit: usize) -> Vec<NewsItem> {
        let symbol = symbol.map(normalize_symbol).filter(|s| !s.is_empty());
        self.search(NewsRequest::Earnings(symbol.as_deref()), limit)
            .await
    }

    async fn get_market_news(&self, limit: usize) -> Vec<NewsItem> {
        self.search(NewsRequest::Market, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::news::{NewsOrigin, Sentiment};
    use crate::llm::Provider;
    use std::sync::Mutex;

    struct CannedLlm {
        answer: Result<String, String>,
        prompts: Mutex<Vec<ChatPrompt>>,
    }

    impl CannedLlm {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: Err("connection reset".to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for CannedLlm {
        fn provider(&self) -> Provider {
            Provider::Perplexity
        }

        async fn complete(&self, prompt: ChatPrompt) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt);
            self.answer.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    #[tokio::test]
    async fn structured_answer_is_scored_and_sorted() {
        let llm = CannedLlm::ok(
            r#"[
                {"title": "Chip sector cools", "source": "WSJ", "published_date": "2026-01-20", "summary": "Demand concerns weigh."},
                {"title": "NVDA earnings beat estimates", "source": "Reuters", "published_date": "2026-01-18", "summary": "Strong data center growth."}
            ]"#,
        );
        let client = PerplexityNewsClient::new(Some(llm.clone()));

        let items = client.get_stock_news("nvda", 10).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "NVDA earnings beat estimates");
        assert_eq!(items[0].sentiment, Sentiment::Positive);
        assert_eq!(items[0].origin, NewsOrigin::Structured);
        assert_eq!(items[1].sentiment, Sentiment::Negative);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts[0].search_recency_filter, Some("month"));
        assert!(prompts[0].user.contains("NVDA"));
    }

    #[tokio::test]
    async fn prose_answer_falls_back_to_heuristics() {
        let llm = CannedLlm::ok("1. Title: NVDA unveils Blackwell\nSource: The Verge\nSummary: New GPUs.\n");
        let client = PerplexityNewsClient::new(Some(llm));

        let items = client.get_stock_news("NVDA", 5).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].origin, NewsOrigin::Heuristic);
        assert_eq!(items[0].source, "The Verge");
    }

    #[tokio::test]
    async fn unstructured_prose_becomes_one_generic_item() {
        let llm = CannedLlm::ok("NVDA shares were volatile this month amid broad market moves.");
        let client = PerplexityNewsClient::new(Some(llm));

        let items = client.get_stock_news("NVDA", 5).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, GENERIC_SOURCE);
        assert_eq!(items[0].title, "NVDA market analysis");
    }

    #[tokio::test]
    async fn provider_failure_returns_system_item() {
        let client = PerplexityNewsClient::new(Some(CannedLlm::failing()));
        let items = client.get_stock_news("NVDA", 5).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_system_generated());

        let unconfigured = PerplexityNewsClient::new(None);
        let items = unconfigured.get_sector_news("Energy", 5).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].title.contains("Energy sector"));
    }

    #[tokio::test]
    async fn limit_truncates_results() {
        let llm = CannedLlm::ok(
            r#"{"items": [{"title": "A"}, {"title": "B"}, {"title": "C"}]}"#,
        );
        let client = PerplexityNewsClient::new(Some(llm));
        assert_eq!(client.get_earnings_news(None, 2).await.len(), 2);
    }

    #[tokio::test]
    async fn market_news_asks_for_macro_coverage() {
        let llm = CannedLlm::ok(r#"[{"title": "Fed holds rates steady", "source": "Reuters"}]"#);
        let client = PerplexityNewsClient::new(Some(llm.clone()));

        let items = client.get_market_news(15).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "Reuters");
        assert!(llm.prompts.lock().unwrap()[0].user.contains("Federal Reserve"));

        let unconfigured = PerplexityNewsClient::new(None);
        let items = unconfigured.get_market_news(15).await;
        assert!(items[0].is_system_generated());
        assert!(items[0].title.ends_with("market"));
    }
}
