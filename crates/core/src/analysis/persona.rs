use crate::analysis::scorer::{self, ScoreCard};
use crate::analysis::{Analyst, MarketSnapshot};
use crate::domain::analysis::{AnalystOpinion, Rating};
use crate::domain::news::Sentiment;
use serde::{Deserialize, Serialize};

const ESG_KEYWORDS: &[&str] = &[
    "sustainab", "environmental", "governance", "social", "esg", "climate", "emission",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    Fundamental,
    Technical,
    Macroeconomic,
    Risk,
    Esg,
    Quantitative,
}

impl Specialization {
    pub fn label(&self) -> &'static str {
        match self {
            Specialization::Fundamental => "Fundamental Analysis & Valuation",
            Specialization::Technical => "Technical Analysis & Chart Patterns",
            Specialization::Macroeconomic => "Macroeconomic Analysis & Policy Impact",
            Specialization::Risk => "Risk Assessment & Portfolio Management",
            Specialization::Esg => "ESG Analysis & Sustainable Investing",
            Specialization::Quantitative => "Quantitative Models & Statistical Analysis",
        }
    }

    pub fn timeframe(&self) -> &'static str {
        match self {
            Specialization::Fundamental => "12 months",
            Specialization::Technical => "1-3 months",
            Specialization::Macroeconomic => "6-12 months",
            Specialization::Risk => "6 months",
            Specialization::Esg => "3-5 years",
            Specialization::Quantitative => "3-6 months",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Persona {
    pub id: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub specialization: Specialization,
    pub background: &'static str,
    pub years_experience: u32,
}

/// The fixed analyst roster, in registration order. Consensus ties resolve
/// toward earlier entries.
pub fn roster() -> Vec<Persona> {
    vec![
        Persona {
            id: "michael_rodriguez",
            name: "Michael Rodriguez",
            title: "Senior Equity Analyst",
            specialization: Specialization::Fundamental,
            background: "Former investment bank VP with 12 years in equity research",
            years_experience: 12,
        },
        Persona {
            id: "sarah_chen",
            name: "Dr. Sarah Chen",
            title: "Technical Analysis Specialist",
            specialization: Specialization::Technical,
            background: "Former quantitative strategist, PhD in Mathematical Finance",
            years_experience: 10,
        },
        Persona {
            id: "elena_volkov",
            name: "Dr. Elena Volkov",
            title: "Macroeconomic Strategist",
            specialization: Specialization::Macroeconomic,
            background: "Former central bank economist and bank managing director",
            years_experience: 15,
        },
        Persona {
            id: "david_park",
            name: "David Park",
            title: "Risk Management Specialist",
            specialization: Specialization::Risk,
            background: "Former hedge fund risk manager specializing in portfolio optimization",
            years_experience: 8,
        },
        Persona {
            id: "amy_zhang",
            name: "Dr. Amy Zhang",
            title: "ESG & Sustainability Analyst",
            specialization: Specialization::Esg,
            background: "Former asset manager ESG researcher, PhD in Environmental Economics",
            years_experience: 9,
        },
        Persona {
            id: "alex_thompson",
            name: "Alex Thompson",
            title: "Quantitative Analyst",
            specialization: Specialization::Quantitative,
            background: "Former systematic fund researcher specializing in algorithmic trading",
            years_experience: 11,
        },
    ]
}

/// Runs the shared scorer and phrases the result from one specialization's angle.
#[derive(Debug, Clone)]
pub struct PersonaAnalyst {
    persona: Persona,
}

impl PersonaAnalyst {
    pub fn new(persona: Persona) -> Self {
        Self { persona }
    }

    pub fn roster() -> Vec<Self> {
        roster().into_iter().map(Self::new).collect()
    }

    fn key_points(&self, snapshot: &MarketSnapshot, card: &ScoreCard) -> Vec<String> {
        let quote = &snapshot.quote;
        let profile = &snapshot.profile;
        let rating = card.rating;
        let mut points = Vec::new();

        match self.persona.specialization {
            Specialization::Fundamental => {
                points.push(match profile.pe_ratio.filter(|pe| *pe > 0.0) {
                    Some(pe) if pe < 15.0 => format!("Attractive P/E of {pe:.1} suggests undervaluation."),
                    Some(pe) if pe > 30.0 => format!("Elevated P/E of {pe:.1} indicates premium valuation."),
                    Some(pe) => format!("P/E of {pe:.1} aligns with fair value range."),
                    None => "Valuation metrics require further analysis.".to_string(),
                });
                if let Some(margin) = profile.profit_margin {
                    points.push(format!("Profit margin of {:.1}%.", margin * 100.0));
                }
                if let Some(roe) = profile.return_on_equity {
                    points.push(format!("Return on equity of {:.1}%.", roe * 100.0));
                }
                points.push(
                    if rating.is_bullish() {
                        "Revenue growth momentum supports upside potential."
                    } else if rating == Rating::Hold {
                        "Mixed fundamental signals warrant a cautious approach."
                    } else {
                        "Fundamental concerns outweigh current price levels."
                    }
                    .to_string(),
                );
            }
            Specialization::Technical => {
                let momentum = if quote.change_percent > 0.0 {
                    "bullish"
                } else if quote.change_percent < 0.0 {
                    "bearish"
                } else {
                    "neutral"
                };
                points.push(format!(
                    "Price at ${:.2} ({:+.2}%) shows {momentum} momentum.",
                    quote.price, quote.change_percent
                ));
                if let Some(position) = scorer::week_52_position(quote.price, profile) {
                    points.push(format!(
                        "Trading at {:.0}% of the 52-week range.",
                        position * 100.0
                    ));
                }
                points.push(
                    if rating.is_bullish() {
                        "Technical indicators suggest a continuation pattern."
                    } else if rating == Rating::Hold {
                        "Near key levels; awaiting breakout direction for clarity."
                    } else {
                        "Support levels under test."
                    }
                    .to_string(),
                );
            }
            Specialization::Macroeconomic => {
                let sector = profile.sector.as_deref().unwrap_or("its sector");
                if quote.change_percent > 1.0 {
                    points.push(format!("{} positioned as a {sector} rotation beneficiary.", snapshot.symbol));
                } else {
                    points.push(format!("Macro headwinds present for {sector}."));
                }
                if let Some(beta) = profile.beta {
                    let sensitivity = if beta > 1.2 {
                        "high"
                    } else if beta < 0.8 {
                        "low"
                    } else {
                        "market-level"
                    };
                    points.push(format!("Beta of {beta:.2} implies {sensitivity} sensitivity to rate and policy shifts."));
                }
                points.push(
                    if rating.is_bullish() {
                        "Current policy environment is favorable."
                    } else if rating == Rating::Hold {
                        "Policy uncertainty argues for a wait-and-see approach."
                    } else {
                        "Rising rates and policy shifts create challenges."
                    }
                    .to_string(),
                );
            }
            Specialization::Risk => {
                let volatility = if quote.change_percent.abs() > 3.0 {
                    "elevated volatility"
                } else {
                    "moderate volatility"
                };
                points.push(format!("Session move of {:+.2}% reflects {volatility}.", quote.change_percent));
                if let Some(de) = profile.debt_to_equity {
                    let leverage = if de > 1.0 { "high" } else if de < 0.3 { "low" } else { "moderate" };
                    points.push(format!("Debt/equity of {de:.2} indicates {leverage} leverage."));
                }
                points.push(
                    if rating.is_bullish() {
                        "Risk-adjusted returns attractive; correlation benefits evident."
                    } else if rating == Rating::Hold {
                        "Balanced risk-reward profile; position sizing is crucial."
                    } else {
                        "Risk metrics deteriorating; defensive positioning advised."
                    }
                    .to_string(),
                );
            }
            Specialization::Esg => {
                let has_esg_news = snapshot.news.iter().any(|item| {
                    let text = format!("{} {}", item.title, item.summary).to_lowercase();
                    ESG_KEYWORDS.iter().any(|k| text.contains(k))
                });
                points.push(
                    match (rating.is_bullish(), rating == Rating::Hold, has_esg_news) {
                        (true, _, true) => "Recent sustainability initiatives support a premium valuation.",
                        (true, _, false) => "Strong governance metrics support a premium valuation.",
                        (false, true, true) => "ESG metrics in line with sector; monitoring recent ESG developments.",
                        (false, true, false) => "ESG metrics in line with sector; room for improvement in sustainability practices.",
                        (false, false, true) => "Recent governance issues could impact long-term value creation.",
                        (false, false, false) => "Regulatory risks could impact long-term value creation.",
                    }
                    .to_string(),
                );
            }
            Specialization::Quantitative => {
                let probability = match rating {
                    Rating::StrongBuy => 85,
                    Rating::Buy => 70,
                    Rating::Hold => 50,
                    Rating::Sell => 30,
                    Rating::StrongSell => 15,
                };
                points.push(format!(
                    "Composite score {:.1} (technical {:.0}, fundamental {:.0}).",
                    card.average_score(),
                    card.technical_score,
                    card.fundamental_score
                ));
                points.push(if rating.is_bearish() {
                    format!("Models show {probability}% probability of outperformance; factor headwinds intensifying.")
                } else {
                    format!("Models show {probability}% probability of outperformance.")
                });
                points.push(match card.news_sentiment {
                    Sentiment::Positive => "News flow skews positive.".to_string(),
                    Sentiment::Negative => "News flow skews negative.".to_string(),
                    Sentiment::Neutral => "News flow is balanced.".to_string(),
                });
            }
        }

        points
    }
}

#[async_trait::async_trait]
impl Analyst for PersonaAnalyst {
    fn persona(&self) -> &Persona {
        &self.persona
    }

    async fn analyze(&self, snapshot: &MarketSnapshot) -> anyhow::Result<AnalystOpinion> {
        anyhow::ensure!(!snapshot.symbol.is_empty(), "snapshot has no symbol");

        let card = scorer::score(&snapshot.profile, &snapshot.quote, &snapshot.news);
        let key_points = self.key_points(snapshot, &card);

        Ok(AnalystOpinion {
            analyst_id: self.persona.id.to_string(),
            analyst_name: self.persona.name.to_string(),
            specialization: self.persona.specialization.label().to_string(),
            rating: card.rating,
            confidence: card.confidence,
            price_target: card.price_target,
            key_points,
            timeframe: self.persona.specialization.timeframe().to_string(),
            technical_score: Some(card.technical_score),
            fundamental_score: Some(card.fundamental_score),
            fallback: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::fallback;

    fn snapshot(symbol: &str) -> MarketSnapshot {
        MarketSnapshot {
            symbol: symbol.to_string(),
            quote: fallback::quote(symbol),
            profile: fallback::company_profile(symbol),
            news: Vec::new(),
        }
    }

    #[test]
    fn roster_order_is_fixed() {
        let ids: Vec<_> = roster().iter().map(|p| p.id).collect();
        assert_eq!(
            ids,
            [
                "michael_rodriguez",
                "sarah_chen",
                "elena_volkov",
                "david_park",
                "amy_zhang",
                "alex_thompson"
            ]
        );
    }

    #[tokio::test]
    async fn personas_share_the_rating_but_not_the_narrative() {
        let snap = snapshot("AAPL");
        let mut opinions = Vec::new();
        for analyst in PersonaAnalyst::roster() {
            opinions.push(analyst.analyze(&snap).await.unwrap());
        }

        let first = &opinions[0];
        assert!(opinions.iter().all(|o| o.rating == first.rating));
        assert!(opinions.iter().all(|o| o.price_target == first.price_target));
        assert!(opinions.iter().all(|o| !o.key_points.is_empty() && !o.fallback));
        assert_ne!(opinions[0].key_points, opinions[1].key_points);
        assert_eq!(opinions[4].timeframe, "3-5 years");
    }

    #[tokio::test]
    async fn empty_symbol_is_rejected() {
        let mut snap = snapshot("AAPL");
        snap.symbol.clear();
        let analyst = PersonaAnalyst::new(roster().remove(0));
        assert!(analyst.analyze(&snap).await.is_err());
    }
}
