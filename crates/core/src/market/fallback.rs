//! Deterministic synthetic market data.
//!
//! Every value is derived from a SHA-256 digest of the normalized symbol, so
//! repeated failures for the same ticker always yield identical records.

use crate::domain::market::{CompanyProfile, DataSource, PriceBar, Quote};
use crate::domain::{normalize_symbol, round_to};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

const SECTORS: &[(&str, &str)] = &[
    ("Technology", "Software - Infrastructure"),
    ("Healthcare", "Biotechnology"),
    ("Financial Services", "Banks - Diversified"),
    ("Consumer Cyclical", "Internet Retail"),
    ("Industrials", "Aerospace & Defense"),
    ("Energy", "Oil & Gas Integrated"),
    ("Communication Services", "Internet Content & Information"),
    ("Consumer Defensive", "Beverages - Non-Alcoholic"),
];

/// Generator for one named stream of a symbol's synthetic data.
fn seeded_rng(symbol: &str, stream: &str) -> StdRng {
    let mut hasher = Sha256::new();
    hasher.update(symbol.as_bytes());
    hasher.update(b":");
    hasher.update(stream.as_bytes());
    StdRng::seed_from_u64(digest_prefix(&hasher.finalize()))
}

fn digest_prefix(digest: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(buf)
}

pub fn symbol_seed(symbol: &str) -> u64 {
    let digest = Sha256::digest(normalize_symbol(symbol).as_bytes());
    digest_prefix(&digest)
}

/// Anchor price in [50, 250) shared by every synthetic record for a symbol.
pub fn base_price(symbol: &str) -> f64 {
    let seed = symbol_seed(symbol);
    let dollars = (seed % 200) as f64;
    let cents = ((seed / 200) % 100) as f64 / 100.0;
    round_to(50.0 + dollars + cents, 2)
}

pub fn quote(symbol: &str) -> Quote {
    let symbol = normalize_symbol(symbol);
    let prev_close = base_price(&symbol);
    let mut rng = seeded_rng(&symbol, "quote");

    let pct = rng.gen_range(-3.0..3.0);
    let change = round_to(prev_close * pct / 100.0, 2);
    let price = round_to(prev_close + change, 2);
    let open = round_to(prev_close + change * 0.3, 2);
    let spread = change.abs() * 0.5;
    let high = round_to(price.max(open) + spread, 2);
    let low = round_to(price.min(open) - spread, 2);
    let volume = rng.gen_range(1_000_000..51_000_000);

    Quote {
        change_percent: round_to(change / prev_close * 100.0, 2),
        symbol,
        price,
        change,
        volume,
        high,
        low,
        open,
        prev_close,
        latest_trading_day: None,
        timestamp: None,
        source: DataSource::Fallback,
    }
}

pub fn company_profile(symbol: &str) -> CompanyProfile {
    let symbol = normalize_symbol(symbol);
    let price = base_price(&symbol);
    let mut rng = seeded_rng(&symbol, "overview");

    let (sector, industry) = SECTORS[rng.gen_range(0..SECTORS.len())];
    let shares = round_to(rng.gen_range(50e6..5e9), 0);
    let pe = round_to(rng.gen_range(8.0..45.0), 2);
    let market_cap = round_to(price * shares, 0);

    let mut profile = CompanyProfile::empty(&symbol, DataSource::Fallback);
    profile.name = format!("{symbol} Corporation");
    profile.description =
        Some("Synthetic profile generated while market data is unavailable.".to_string());
    profile.exchange = Some("NASDAQ".to_string());
    profile.sector = Some(sector.to_string());
    profile.industry = Some(industry.to_string());
    profile.market_cap = Some(market_cap);
    profile.pe_ratio = Some(pe);
    profile.eps = Some(round_to(price / pe, 2));
    profile.price_to_book = Some(round_to(rng.gen_range(0.8..12.0), 2));
    profile.dividend_yield = Some(round_to(rng.gen_range(0.0..0.04), 4));
    profile.revenue_ttm = Some(round_to(market_cap / rng.gen_range(1.5..8.0), 0));
    profile.profit_margin = Some(round_to(rng.gen_range(-0.05..0.30), 4));
    profile.operating_margin = Some(round_to(rng.gen_range(-0.02..0.35), 4));
    profile.return_on_equity = Some(round_to(rng.gen_range(-0.05..0.35), 4));
    profile.debt_to_equity = Some(round_to(rng.gen_range(0.05..1.8), 2));
    profile.beta = Some(round_to(rng.gen_range(0.6..1.8), 2));
    profile.week_52_high = Some(round_to(price * rng.gen_range(1.05..1.40), 2));
    profile.week_52_low = Some(round_to(price * rng.gen_range(0.60..0.95), 2));
    profile.shares_outstanding = Some(shares);
    profile
}

/// `days` weekday bars ending on or before `end`, oldest first.
pub fn daily_history(symbol: &str, days: usize, end: NaiveDate) -> Vec<PriceBar> {
    let symbol = normalize_symbol(symbol);
    let mut rng = seeded_rng(&symbol, "daily");

    let mut dates = Vec::with_capacity(days);
    let mut cursor = end;
    while dates.len() < days {
        if !matches!(cursor.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(cursor);
        }
        match cursor.checked_sub_days(Days::new(1)) {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    dates.reverse();

    let mut close = base_price(&symbol) * rng.gen_range(0.85..1.15);
    dates
        .into_iter()
        .map(|date| {
            let open = close;
            close = open * (1.0 + rng.gen_range(-0.025..0.025));
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            PriceBar {
                date,
                open: round_to(open, 2),
                high: round_to(high, 2),
                low: round_to(low, 2),
                close: round_to(close, 2),
                volume: rng.gen_range(500_000..20_500_000),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_fallbacks_are_identical() {
        assert_eq!(quote("AAPL"), quote("AAPL"));
        assert_eq!(company_profile("AAPL"), company_profile("AAPL"));
        assert_eq!(quote(" aapl "), quote("AAPL"));
        let end = NaiveDate::from_ymd_opt(2026, 3, 13).unwrap();
        assert_eq!(daily_history("AAPL", 10, end), daily_history("AAPL", 10, end));
    }

    #[test]
    fn streams_are_independent_per_record_kind() {
        let mut quote_rng = seeded_rng("AAPL", "quote");
        let mut daily_rng = seeded_rng("AAPL", "daily");
        assert_ne!(quote_rng.gen::<u64>(), daily_rng.gen::<u64>());

        let mut again = seeded_rng("AAPL", "quote");
        let mut first = seeded_rng("AAPL", "quote");
        assert_eq!(first.gen_range(0.0..1.0f64), again.gen_range(0.0..1.0f64));
    }

    #[test]
    fn different_symbols_get_different_values() {
        assert_ne!(quote("AAPL").price, quote("MSFT").price);
    }

    #[test]
    fn quote_is_internally_consistent() {
        for symbol in ["AAPL", "MSFT", "TSLA", "BRK.B", "X"] {
            let q = quote(symbol);
            assert!(q.price > 0.0);
            assert!((50.0..250.0).contains(&q.prev_close));
            assert!(q.low <= q.price && q.price <= q.high);
            assert!(q.low <= q.open && q.open <= q.high);
            let expected = q.change / q.prev_close * 100.0;
            assert!((q.change_percent - expected).abs() < 0.01);
            assert_eq!(q.source, DataSource::Fallback);
            assert!(q.timestamp.is_none());
        }
    }

    #[test]
    fn profile_ratios_are_present_and_bounded() {
        let p = company_profile("NVDA");
        let pe = p.pe_ratio.unwrap();
        assert!((8.0..45.0).contains(&pe));
        assert!(p.week_52_low.unwrap() < p.week_52_high.unwrap());
        assert!(p.sector.is_some());
        assert_eq!(p.source, DataSource::Fallback);
    }

    #[test]
    fn history_is_weekday_only_and_ascending() {
        let end = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let bars = daily_history("AAPL", 30, end);
        assert_eq!(bars.len(), 30);
        assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
        assert!(bars
            .iter()
            .all(|b| !matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun)));
        assert!(bars.iter().all(|b| b.low <= b.high));
        assert_eq!(bars, daily_history("aapl", 30, end));
    }
}
