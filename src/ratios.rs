// =============================================================================
// ratios.rs - TURNING A BALANCE SHEET INTO A FINGERPRINT
// =============================================================================
//
// Five divisions and a couple of growth rates. That is the entire ratio
// vector. What makes it worth its own module is what happens when a
// denominator is zero or a filing reports NaN: the answer is "unknown",
// never infinity, never a panic, and never a silently invented zero.
// =============================================================================

use crate::models::{FinancialAggregates, GrowthRates, RatioVector};

/// `numerator / denominator`, or unknown when the quotient is not a finite
/// number (zero denominator, non-finite operand).
fn safe_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !numerator.is_finite() || !denominator.is_finite() {
        return None;
    }
    let value = numerator / denominator;
    value.is_finite().then_some(value)
}

/// Derives the five single-period ratios from `aggregates`.
///
/// The two growth fields are left unknown; a single period cannot supply
/// them. Callers that have a prior period attach them with
/// [`RatioVector::with_growth`].
pub fn derive_ratio_vector(aggregates: &FinancialAggregates) -> RatioVector {
    RatioVector {
        current_ratio: safe_ratio(aggregates.current_assets, aggregates.current_liabilities),
        debt_ratio: safe_ratio(aggregates.total_liabilities, aggregates.equity),
        roa: safe_ratio(aggregates.net_income, aggregates.total_assets),
        roe: safe_ratio(aggregates.net_income, aggregates.equity),
        asset_turnover: safe_ratio(aggregates.revenue, aggregates.total_assets),
        revenue_growth: None,
        asset_growth: None,
    }
}

/// Year-over-year growth of revenue and total assets.
///
/// Growth is measured against the magnitude of the prior value so that a
/// loss shrinking towards zero reads as improvement. No prior, or a prior of
/// zero, means unknown.
pub fn growth_rates(current: &FinancialAggregates, prior: Option<&FinancialAggregates>) -> GrowthRates {
    let Some(prior) = prior else {
        return GrowthRates::default();
    };
    let growth = |now: f64, before: f64| safe_ratio(now - before, before.abs());
    GrowthRates {
        revenue_growth: growth(current.revenue, prior.revenue),
        asset_growth: growth(current.total_assets, prior.total_assets),
    }
}
