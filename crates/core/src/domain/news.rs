use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// How a news item was obtained, so consumers can weigh low-confidence items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsOrigin {
    /// Decoded from a JSON payload the provider was asked to emit.
    Structured,
    /// Recovered by line-prefix parsing of free text. Low confidence.
    Heuristic,
    /// Placeholder produced locally because the provider failed.
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub summary: String,
    pub source: String,
    pub url: Option<String>,
    pub published_date: Option<String>,
    pub sentiment: Sentiment,
    pub relevance_score: f64,
    pub origin: NewsOrigin,
}

impl NewsItem {
    pub fn is_system_generated(&self) -> bool {
        self.origin == NewsOrigin::System
    }
}

/// Sentiment tally over a batch of news.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentBreakdown {
    pub fn from_items(items: &[NewsItem]) -> Self {
        let mut out = Self::default();
        for item in items.iter().filter(|i| !i.is_system_generated()) {
            match item.sentiment {
                Sentiment::Positive => out.positive += 1,
                Sentiment::Neutral => out.neutral += 1,
                Sentiment::Negative => out.negative += 1,
            }
        }
        out
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }

    pub fn overall(&self) -> Sentiment {
        use std::cmp::Ordering;
        match self.positive.cmp(&self.negative) {
            Ordering::Greater => Sentiment::Positive,
            Ordering::Less => Sentiment::Negative,
            Ordering::Equal => Sentiment::Neutral,
        }
    }
}
