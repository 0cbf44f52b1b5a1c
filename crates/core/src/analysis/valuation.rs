//! Five-year DCF plus price and volatility metrics for research reports.

use crate::domain::market::{CompanyProfile, PriceBar};
use anyhow::ensure;
use serde::Serialize;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DEFAULT_BASE_REVENUE: f64 = 1_000_000_000.0;
const DEFAULT_SHARES_OUTSTANDING: f64 = 100_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DcfAssumptions {
    pub revenue_growth: [f64; 5],
    pub terminal_growth: f64,
    pub ebitda_margin: f64,
    pub tax_rate: f64,
    pub capex_pct_revenue: f64,
    pub working_capital_pct_revenue: f64,
    pub depreciation_pct_revenue: f64,
    pub wacc: f64,
}

impl Default for DcfAssumptions {
    fn default() -> Self {
        Self {
            revenue_growth: [0.15, 0.12, 0.10, 0.08, 0.06],
            terminal_growth: 0.025,
            ebitda_margin: 0.25,
            tax_rate: 0.21,
            capex_pct_revenue: 0.03,
            working_capital_pct_revenue: 0.02,
            depreciation_pct_revenue: 0.02,
            wacc: 0.09,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcfProjection {
    pub year: u32,
    pub revenue: f64,
    pub ebitda: f64,
    pub ebit: f64,
    pub nopat: f64,
    pub fcf: f64,
    pub discount_factor: f64,
    pub pv_fcf: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcfModel {
    pub assumptions: DcfAssumptions,
    pub base_revenue: f64,
    pub shares_outstanding: f64,
    pub projections: Vec<DcfProjection>,
    pub terminal_value: f64,
    pub pv_terminal_value: f64,
    pub enterprise_value: f64,
    /// Net debt is taken as zero, so this equals enterprise value.
    pub equity_value: f64,
    pub price_per_share: f64,
    pub current_price: f64,
    /// Percent upside of `price_per_share` over `current_price`.
    pub upside_pct: Option<f64>,
}

impl DcfModel {
    pub fn project(
        assumptions: DcfAssumptions,
        base_revenue: f64,
        shares_outstanding: f64,
        current_price: f64,
    ) -> anyhow::Result<Self> {
        ensure!(
            assumptions.wacc > assumptions.terminal_growth,
            "wacc ({}) must exceed terminal growth ({})",
            assumptions.wacc,
            assumptions.terminal_growth
        );
        ensure!(base_revenue > 0.0, "base revenue must be positive");
        ensure!(shares_outstanding > 0.0, "shares outstanding must be positive");

        let mut revenue = base_revenue;
        let mut projections = Vec::with_capacity(assumptions.revenue_growth.len());
        for (idx, growth) in assumptions.revenue_growth.iter().enumerate() {
            let year = idx as u32 + 1;
            revenue *= 1.0 + growth;

            let ebitda = revenue * assumptions.ebitda_margin;
            let depreciation = revenue * assumptions.depreciation_pct_revenue;
            let ebit = ebitda - depreciation;
            let nopat = ebit * (1.0 - assumptions.tax_rate);
            let capex = revenue * assumptions.capex_pct_revenue;
            let working_capital = revenue * assumptions.working_capital_pct_revenue;
            let fcf = nopat + depreciation - capex - working_capital;
            let discount_factor = (1.0 + assumptions.wacc).powi(year as i32);

            projections.push(DcfProjection {
                year,
                revenue,
                ebitda,
                ebit,
                nopat,
                fcf,
                discount_factor,
                pv_fcf: fcf / discount_factor,
            });
        }

        let (last_fcf, last_discount) = projections
            .last()
            .map(|p| (p.fcf, p.discount_factor))
            .unwrap_or((0.0, 1.0));
        let terminal_value = last_fcf * (1.0 + assumptions.terminal_growth)
            / (assumptions.wacc - assumptions.terminal_growth);
        let pv_terminal_value = terminal_value / last_discount;
        let enterprise_value =
            projections.iter().map(|p| p.pv_fcf).sum::<f64>() + pv_terminal_value;
        let equity_value = enterprise_value;
        let price_per_share = equity_value / shares_outstanding;

        let upside_pct = (current_price.is_finite() && current_price > 0.0)
            .then(|| (price_per_share - current_price) / current_price * 100.0);

        Ok(Self {
            assumptions,
            base_revenue,
            shares_outstanding,
            projections,
            terminal_value,
            pv_terminal_value,
            enterprise_value,
            equity_value,
            price_per_share,
            current_price,
            upside_pct,
        })
    }

    /// Default assumptions, anchored on the profile's TTM revenue and share
    /// count when those are known.
    pub fn for_profile(profile: &CompanyProfile, current_price: f64) -> anyhow::Result<Self> {
        let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
        Self::project(
            DcfAssumptions::default(),
            positive(profile.revenue_ttm).unwrap_or(DEFAULT_BASE_REVENUE),
            positive(profile.shares_outstanding).unwrap_or(DEFAULT_SHARES_OUTSTANDING),
            current_price,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMetrics {
    pub high_52w: f64,
    pub low_52w: f64,
    pub range_52w: f64,
    pub current_vs_high_pct: f64,
    pub current_vs_low_pct: f64,
    pub avg_daily_volume: f64,
}

impl PriceMetrics {
    pub fn from_history(bars: &[PriceBar], current_price: f64) -> Option<Self> {
        let closes: Vec<f64> = bars
            .iter()
            .map(|b| b.close)
            .filter(|c| c.is_finite() && *c > 0.0)
            .collect();
        if closes.is_empty() {
            return None;
        }

        let high = closes.iter().copied().fold(f64::MIN, f64::max);
        let low = closes.iter().copied().fold(f64::MAX, f64::min);
        let vs = |anchor: f64| {
            if current_price > 0.0 {
                (current_price / anchor - 1.0) * 100.0
            } else {
                0.0
            }
        };

        Some(Self {
            high_52w: high,
            low_52w: low,
            range_52w: high - low,
            current_vs_high_pct: vs(high),
            current_vs_low_pct: vs(low),
            avg_daily_volume: bars.iter().map(|b| b.volume as f64).sum::<f64>() / bars.len() as f64,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityMetrics {
    pub daily_volatility: f64,
    pub annual_volatility: f64,
    pub max_daily_return: f64,
    pub min_daily_return: f64,
    pub avg_daily_return: f64,
    /// Annualised mean return over annualised volatility; zero when flat.
    pub sharpe_ratio: f64,
}

impl VolatilityMetrics {
    /// Needs at least two positive closes.
    pub fn from_history(bars: &[PriceBar]) -> Option<Self> {
        let closes: Vec<f64> = bars
            .iter()
            .map(|b| b.close)
            .filter(|c| c.is_finite() && *c > 0.0)
            .collect();
        let returns: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        if returns.is_empty() {
            return None;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let daily = variance.sqrt();
        let annual = daily * TRADING_DAYS_PER_YEAR.sqrt();

        Some(Self {
            daily_volatility: daily,
            annual_volatility: annual,
            max_daily_return: returns.iter().copied().fold(f64::MIN, f64::max),
            min_daily_return: returns.iter().copied().fold(f64::MAX, f64::min),
            avg_daily_return: mean,
            sharpe_ratio: if annual > 0.0 {
                mean * TRADING_DAYS_PER_YEAR / annual
            } else {
                0.0
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::DataSource;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64, volume: u64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn first_projection_year_matches_hand_computation() {
        let model = DcfModel::project(DcfAssumptions::default(), 1e9, 1e8, 20.0).unwrap();
        let y1 = &model.projections[0];
        assert!(close_to(y1.revenue, 1.15e9));
        assert!(close_to(y1.ebitda, 0.2875e9));
        assert!(close_to(y1.ebit, 0.2645e9));
        assert!(close_to(y1.nopat, 0.208955e9));
        assert!(close_to(y1.fcf, 0.174455e9));
        assert!(close_to(y1.pv_fcf, 0.174455e9 / 1.09));
        assert_eq!(model.projections.len(), 5);
        assert_eq!(model.projections[4].year, 5);
    }

    #[test]
    fn enterprise_value_is_explicit_plus_terminal() {
        let model = DcfModel::project(DcfAssumptions::default(), 1e9, 1e8, 20.0).unwrap();
        let last = model.projections.last().unwrap();
        assert!(close_to(model.terminal_value, last.fcf * 1.025 / 0.065));
        let explicit: f64 = model.projections.iter().map(|p| p.pv_fcf).sum();
        assert!(close_to(model.enterprise_value, explicit + model.pv_terminal_value));
        assert!(close_to(model.price_per_share, model.enterprise_value / 1e8));

        let upside = model.upside_pct.unwrap();
        assert!(close_to(upside, (model.price_per_share - 20.0) / 20.0 * 100.0));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let mut assumptions = DcfAssumptions::default();
        assumptions.terminal_growth = 0.10;
        assert!(DcfModel::project(assumptions, 1e9, 1e8, 10.0).is_err());
        assert!(DcfModel::project(DcfAssumptions::default(), 1e9, 0.0, 10.0).is_err());
    }

    #[test]
    fn profile_overrides_base_revenue_and_shares() {
        let mut profile = CompanyProfile::empty("ACME", DataSource::AlphaVantage);
        let defaults = DcfModel::for_profile(&profile, 0.0).unwrap();
        assert_eq!(defaults.base_revenue, DEFAULT_BASE_REVENUE);
        assert_eq!(defaults.upside_pct, None);

        profile.revenue_ttm = Some(5e9);
        profile.shares_outstanding = Some(2e8);
        let anchored = DcfModel::for_profile(&profile, 50.0).unwrap();
        assert_eq!(anchored.base_revenue, 5e9);
        assert_eq!(anchored.shares_outstanding, 2e8);
    }

    #[test]
    fn price_metrics_from_history() {
        let bars = [bar(2, 100.0, 1_000), bar(3, 120.0, 3_000), bar(4, 80.0, 2_000)];
        let metrics = PriceMetrics::from_history(&bars, 100.0).unwrap();
        assert_eq!(metrics.high_52w, 120.0);
        assert_eq!(metrics.low_52w, 80.0);
        assert_eq!(metrics.range_52w, 40.0);
        assert_eq!(metrics.avg_daily_volume, 2_000.0);
        assert!(close_to(metrics.current_vs_low_pct, 25.0));
        assert!(PriceMetrics::from_history(&[], 100.0).is_none());
    }

    #[test]
    fn volatility_of_symmetric_moves() {
        let bars = [bar(2, 100.0, 0), bar(3, 110.0, 0), bar(4, 99.0, 0)];
        let vol = VolatilityMetrics::from_history(&bars).unwrap();
        assert!(close_to(vol.avg_daily_return, 0.0));
        assert!(close_to(vol.daily_volatility, 0.1));
        assert!(close_to(vol.annual_volatility, 0.1 * 252f64.sqrt()));
        assert!(close_to(vol.max_daily_return, 0.1));
        assert!(close_to(vol.min_daily_return, -0.1));
    }

    #[test]
    fn volatility_needs_two_closes() {
        assert!(VolatilityMetrics::from_history(&[bar(2, 100.0, 0)]).is_none());
        let flat = [bar(2, 50.0, 0), bar(3, 50.0, 0)];
        assert_eq!(VolatilityMetrics::from_history(&flat).unwrap().sharpe_ratio, 0.0);
    }
}
