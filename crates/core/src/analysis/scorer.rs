//! Rule-table scoring shared by every analyst persona.
//!
//! | signal | bucket | delta |
//! |---|---|---|
//! | change % | > 2 / (0, 2] / (-2, 0] / <= -2 | +15 / +8 / -8 / -15 |
//! | 52-week position | > 0.8 / > 0.6 / < 0.2 / < 0.4 | +10 / +5 / -10 / -5 |
//! | P/E | (0, 15) / [15, 25) / > 40 | +15 / +8 / -10 |
//! | profit margin | > 0.20 / > 0.10 / < 0 | +15 / +8 / -20 |
//! | ROE | > 0.15 / > 0.10 / < 0 | +10 / +5 / -15 |
//! | debt/equity | (0, 0.3) / > 1.0 | +8 / -10 |
//!
//! Both scores start at 50 and are clamped to [0, 100].

use crate::domain::analysis::Rating;
use crate::domain::market::{CompanyProfile, Quote};
use crate::domain::news::{NewsItem, Sentiment, SentimentBreakdown};
use crate::domain::round_to;
use serde::Serialize;

pub const BASE_SCORE: f64 = 50.0;
pub const NEUTRAL_CONFIDENCE: f64 = 50.0;

const BASE_TARGET_MULTIPLIER: f64 = 1.15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub technical_score: f64,
    pub fundamental_score: f64,
    pub rating: Rating,
    pub price_target: Option<f64>,
    pub confidence: f64,
    pub news_sentiment: Sentiment,
}

impl ScoreCard {
    pub fn average_score(&self) -> f64 {
        (self.technical_score + self.fundamental_score) / 2.0
    }
}

/// Never fails. Without a usable quote price the card is Hold at neutral
/// confidence with no target.
pub fn score(profile: &CompanyProfile, quote: &Quote, news: &[NewsItem]) -> ScoreCard {
    let technical_score = technical_score(quote, profile);
    let fundamental_score = fundamental_score(profile);
    let news_sentiment = SentimentBreakdown::from_items(news).overall();

    if !quote.has_usable_price() {
        return ScoreCard {
            technical_score,
            fundamental_score,
            rating: Rating::Hold,
            price_target: None,
            confidence: NEUTRAL_CONFIDENCE,
            news_sentiment,
        };
    }

    ScoreCard {
        technical_score,
        fundamental_score,
        rating: Rating::from_average_score((technical_score + fundamental_score) / 2.0),
        price_target: price_target(quote.price, profile),
        confidence: confidence(technical_score, fundamental_score),
        news_sentiment,
    }
}

/// Where `price` sits in the 52-week range, in [0, 1].
pub fn week_52_position(price: f64, profile: &CompanyProfile) -> Option<f64> {
    let high = profile.week_52_high?;
    let low = profile.week_52_low?;
    if !(price.is_finite() && price > 0.0 && low > 0.0 && high > low) {
        return None;
    }
    Some(((price - low) / (high - low)).clamp(0.0, 1.0))
}

pub fn technical_score(quote: &Quote, profile: &CompanyProfile) -> f64 {
    let mut score = BASE_SCORE;

    let cp = quote.change_percent;
    if cp.is_finite() {
        score += if cp > 2.0 {
            15.0
        } else if cp > 0.0 {
            8.0
        } else if cp > -2.0 {
            -8.0
        } else {
            -15.0
        };
    }

    if let Some(position) = week_52_position(quote.price, profile) {
        if position > 0.8 {
            score += 10.0;
        } else if position > 0.6 {
            score += 5.0;
        } else if position < 0.2 {
            score -= 10.0;
        } else if position < 0.4 {
            score -= 5.0;
        }
    }

    score.clamp(0.0, 100.0)
}

pub fn fundamental_score(profile: &CompanyProfile) -> f64 {
    let mut score = BASE_SCORE;

    if let Some(pe) = profile.pe_ratio {
        if pe > 0.0 && pe < 15.0 {
            score += 15.0;
        } else if (15.0..25.0).contains(&pe) {
            score += 8.0;
        } else if pe > 40.0 {
            score -= 10.0;
        }
    }

    if let Some(margin) = profile.profit_margin {
        if margin > 0.20 {
            score += 15.0;
        } else if margin > 0.10 {
            score += 8.0;
        } else if margin < 0.0 {
            score -= 20.0;
        }
    }

    if let Some(roe) = profile.return_on_equity {
        if roe > 0.15 {
            score += 10.0;
        } else if roe > 0.10 {
            score += 5.0;
        } else if roe < 0.0 {
            score -= 15.0;
        }
    }

    if let Some(de) = profile.debt_to_equity {
        if de > 0.0 && de < 0.3 {
            score += 8.0;
        } else if de > 1.0 {
            score -= 10.0;
        }
    }

    score.clamp(0.0, 100.0)
}

/// Twelve-month target from a valuation-adjusted growth multiple.
pub fn price_target(price: f64, profile: &CompanyProfile) -> Option<f64> {
    if !(price.is_finite() && price > 0.0) {
        return None;
    }

    let mut multiplier = BASE_TARGET_MULTIPLIER;
    if let Some(pe) = profile.pe_ratio {
        if pe > 0.0 && pe < 15.0 {
            multiplier *= 1.10;
        } else if pe > 30.0 {
            multiplier *= 0.95;
        }
    }
    if let Some(margin) = profile.profit_margin {
        if margin > 0.20 {
            multiplier *= 1.05;
        } else if margin < 0.0 {
            multiplier *= 0.85;
        }
    }

    Some(round_to(price * multiplier, 2))
}

/// `70 - 0.5 * |t - f| + 0.4 * |mean - 50|`, clamped to [10, 95].
///
/// Holding either score fixed, the divergence penalty grows faster than the
/// extremity bonus, so confidence never rises as the scores drift apart.
pub fn confidence(technical: f64, fundamental: f64) -> f64 {
    let divergence = (technical - fundamental).abs();
    let mean = (technical + fundamental) / 2.0;
    let raw = 70.0 - 0.5 * divergence + 0.4 * (mean - 50.0).abs();
    round_to(raw.clamp(10.0, 95.0), 1)
}
