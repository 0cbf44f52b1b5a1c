use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Five-tier investment rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    #[serde(rename = "Buy")]
    Buy,
    #[serde(rename = "Hold")]
    Hold,
    #[serde(rename = "Sell")]
    Sell,
    #[serde(rename = "Strong Sell")]
    StrongSell,
}

impl Rating {
    /// Maps the mean of technical and fundamental scores onto a tier.
    pub fn from_average_score(score: f64) -> Self {
        if score >= 75.0 {
            Rating::StrongBuy
        } else if score >= 60.0 {
            Rating::Buy
        } else if score >= 40.0 {
            Rating::Hold
        } else if score >= 25.0 {
            Rating::Sell
        } else {
            Rating::StrongSell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::StrongBuy => "Strong Buy",
            Rating::Buy => "Buy",
            Rating::Hold => "Hold",
            Rating::Sell => "Sell",
            Rating::StrongSell => "Strong Sell",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Rating::StrongBuy | Rating::Buy)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, Rating::Sell | Rating::StrongSell)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of an analysis rests on live vendor data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Live,
    Partial,
    Fallback,
}

impl DataQuality {
    pub fn from_liveness(flags: &[bool]) -> Self {
        if !flags.is_empty() && flags.iter().all(|live| *live) {
            DataQuality::Live
        } else if flags.iter().any(|live| *live) {
            DataQuality::Partial
        } else {
            DataQuality::Fallback
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystOpinion {
    pub analyst_id: String,
    pub analyst_name: String,
    pub specialization: String,
    pub rating: Rating,
    /// 0..=100
    pub confidence: f64,
    pub price_target: Option<f64>,
    pub key_points: Vec<String>,
    pub timeframe: String,
    pub technical_score: Option<f64>,
    pub fundamental_score: Option<f64>,
    /// True when the analyst task failed and a neutral placeholder was substituted.
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub symbol: String,
    pub opinions: Vec<AnalystOpinion>,
    pub consensus_rating: Rating,
    pub average_confidence: f64,
    pub average_price_target: Option<f64>,
    /// Share of opinions matching the consensus rating, 0..=100.
    pub agreement_level: f64,
    pub data_quality: DataQuality,
    pub generated_at: DateTime<Utc>,
}
