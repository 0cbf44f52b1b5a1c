use crate::domain::news::{NewsItem, NewsOrigin, Sentiment};
use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// News payload the search model is asked to emit. Accepts either a bare
/// array or an object wrapping it under `items`/`news`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmNewsPayload {
    Wrapped {
        #[serde(alias = "news", alias = "articles")]
        items: Vec<LlmNewsItem>,
    },
    Bare(Vec<LlmNewsItem>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmNewsItem {
    #[serde(alias = "headline")]
    pub title: String,
    #[serde(default, alias = "description")]
    pub summary: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "date", alias = "published_at")]
    pub published_date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl LlmNewsPayload {
    pub fn into_items(self) -> Vec<LlmNewsItem> {
        match self {
            LlmNewsPayload::Wrapped { items } => items,
            LlmNewsPayload::Bare(items) => items,
        }
    }

    /// Keeps every item that validates; malformed entries are dropped.
    pub fn validate_and_into_news(self, default_source: &str) -> Vec<NewsItem> {
        self.into_items()
            .into_iter()
            .filter_map(|item| match item.validate_and_into_item(default_source) {
                Ok(item) => Some(item),
                Err(err) => {
                    tracing::debug!(error = %err, "dropping invalid news item");
                    None
                }
            })
            .collect()
    }
}

impl LlmNewsItem {
    /// Sentiment and relevance are left neutral here; the news client scores
    /// them from the text afterwards.
    pub fn validate_and_into_item(self, default_source: &str) -> anyhow::Result<NewsItem> {
        let title = self.title.trim().to_string();
        ensure!(!title.is_empty(), "title must be non-empty");

        let summary = self
            .summary
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let source = self
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_source.to_string());

        let url = self
            .url
            .map(|s| s.trim().to_string())
            .filter(|s| s.starts_with("http://") || s.starts_with("https://"));

        let published_date = self
            .published_date
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(NewsItem {
            title,
            summary,
            source,
            url,
            published_date,
            sentiment: Sentiment::Neutral,
            relevance_score: 0.0,
            origin: NewsOrigin::Structured,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_bare_and_wrapped_arrays() {
        let bare: LlmNewsPayload =
            serde_json::from_value(json!([{"title": "A"}, {"title": "B"}])).unwrap();
        assert_eq!(bare.into_items().len(), 2);

        let wrapped: LlmNewsPayload =
            serde_json::from_value(json!({"news": [{"headline": "A"}]})).unwrap();
        assert_eq!(wrapped.into_items()[0].title, "A");
    }

    #[test]
    fn drops_items_with_blank_titles_and_bad_urls() {
        let payload: LlmNewsPayload = serde_json::from_value(json!([
            {"title": "  ", "summary": "nothing"},
            {"title": "Apple beats estimates", "url": "not a url", "source": ""},
        ]))
        .unwrap();

        let items = payload.validate_and_into_news("perplexity");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Apple beats estimates");
        assert_eq!(items[0].source, "perplexity");
        assert_eq!(items[0].url, None);
        assert_eq!(items[0].origin, NewsOrigin::Structured);
    }
}
