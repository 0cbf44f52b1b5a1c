use crate::domain::news::Sentiment;

const POSITIVE_WORDS: &[&str] = &[
    "beat", "beats", "exceed", "exceeds", "exceeded", "growth", "strong", "stronger",
    "bullish", "upgrade", "upgraded", "upgrades", "positive",
];

const NEGATIVE_WORDS: &[&str] = &[
    "miss", "misses", "missed", "decline", "declines", "declined", "weak", "weaker",
    "bearish", "downgrade", "downgraded", "downgrades", "negative", "concern", "concerns",
];

/// Keywords that make a headline more useful to an equity analyst.
const HIGH_VALUE_KEYWORDS: &[&str] = &[
    "earnings", "revenue", "guidance", "merger", "acquisition", "upgrade", "downgrade",
    "analyst", "forecast", "dividend",
];

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().map(|w| {
        w.chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    })
}

/// Lexicon majority vote over title and summary. Ties are neutral.
pub fn classify(title: &str, summary: &str) -> Sentiment {
    let mut positive = 0usize;
    let mut negative = 0usize;
    for word in tokens(title).chain(tokens(summary)) {
        if POSITIVE_WORDS.contains(&word.as_str()) {
            positive += 1;
        } else if NEGATIVE_WORDS.contains(&word.as_str()) {
            negative += 1;
        }
    }

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

/// Whether `text` mentions `subject`. Tickers must match a whole token;
/// multi-word subjects such as sector names match as substrings.
pub fn mentions(text: &str, subject: &str) -> bool {
    let subject = subject.trim();
    if subject.is_empty() {
        return false;
    }
    if subject.contains(char::is_whitespace) {
        return text.to_lowercase().contains(&subject.to_lowercase());
    }
    text.split(|c: char| !(c.is_alphanumeric() || c == '.' || c == '-'))
        .map(|t| t.trim_matches(|c| c == '.' || c == '-'))
        .any(|t| t.eq_ignore_ascii_case(subject))
}

/// Relevance in [0, 1]: base 0.5, +0.3/+0.2 for the subject in title/body,
/// +0.1/+0.05 per high-value keyword in title/body.
pub fn relevance(subject: Option<&str>, title: &str, summary: &str) -> f64 {
    let mut score: f64 = 0.5;
    if let Some(subject) = subject {
        if mentions(title, subject) {
            score += 0.3;
        }
        if mentions(summary, subject) {
            score += 0.2;
        }
    }

    let title_lower = title.to_lowercase();
    let summary_lower = summary.to_lowercase();
    for keyword in HIGH_VALUE_KEYWORDS {
        if title_lower.contains(keyword) {
            score += 0.1;
        }
        if summary_lower.contains(keyword) {
            score += 0.05;
        }
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_vote_decides_sentiment() {
        assert_eq!(
            classify("Apple beats estimates on strong iPhone growth", ""),
            Sentiment::Positive
        );
        assert_eq!(
            classify("Intel misses, guidance weak", "Analysts downgrade the stock"),
            Sentiment::Negative
        );
        assert_eq!(
            classify("Strong quarter but margins decline", ""),
            Sentiment::Neutral
        );
        assert_eq!(classify("Company holds annual meeting", ""), Sentiment::Neutral);
    }

    #[test]
    fn ticker_mentions_need_whole_tokens() {
        assert!(mentions("Why AAPL rallied today", "AAPL"));
        assert!(mentions("Shares of (aapl) rose.", "AAPL"));
        assert!(!mentions("A quiet day for markets", "AAPLX"));
        assert!(!mentions("Analysts are cautious", "A"));
        assert!(mentions("BRK.B hits record", "BRK.B"));
        assert!(mentions("Information Technology leads gains", "information technology"));
    }

    #[test]
    fn relevance_accumulates_and_caps() {
        assert_eq!(relevance(Some("MSFT"), "Markets drift", "Nothing new"), 0.5);
        assert!((relevance(Some("MSFT"), "MSFT rises", "Investors cheer MSFT") - 1.0).abs() < 1e-9);
        let keywords = relevance(None, "Earnings and revenue guidance", "");
        assert!((keywords - 0.8).abs() < 1e-9);
        let capped = relevance(
            Some("MSFT"),
            "MSFT earnings revenue guidance merger acquisition",
            "MSFT analyst forecast dividend",
        );
        assert_eq!(capped, 1.0);
    }
}
