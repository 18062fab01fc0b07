// =============================================================================
// risk.rs - THE DISTRESS SCORECARD
// =============================================================================
//
// Five rules, each one asking a single blunt question about the ratio row:
//
//   1. Is the company drowning in debt?            (debt ratio, percent)
//   2. Can it pay the bills due this year?          (current ratio, multiple)
//   3. How thin is the equity cushion?              (equity ratio, percent)
//   4. Are the assets earning anything?             (ROA, percent)
//   5. Is the business burning cash?                (operating cash flow)
//
// Each rule fires at most once. A severe breach scores the severe weight, a
// softer breach scores the soft weight, and a healthy or unknown metric
// scores nothing. The points add up (saturating at u32::MAX) and the total
// picks the verdict. There is no model, no randomness, and no hidden state. The same
// ratios give the same answer every time.
//
// The cutoffs live in RiskThresholds so a differently calibrated table can be
// swapped in without touching the rules.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::models::{DisplayRatios, FinancialAggregates, RiskAssessment, RiskLevel};

/// One two-tier rule: a severe cutoff with its weight and a softer cutoff
/// with its (smaller) weight. Whether "breach" means above or below the
/// cutoff is fixed by the rule that owns the band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub severe: f64,
    pub severe_weight: u32,
    pub soft: f64,
    pub soft_weight: u32,
}

impl Band {
    pub const fn new(severe: f64, severe_weight: u32, soft: f64, soft_weight: u32) -> Self {
        Self {
            severe,
            severe_weight,
            soft,
            soft_weight,
        }
    }
}

/// The calibrated cutoff table. `Default` is the production calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Debt ratio in percent; breached when above.
    pub debt_ratio: Band,
    /// Current ratio as a multiple; breached when below.
    pub current_ratio: Band,
    /// Equity ratio in percent; breached when below.
    pub equity_ratio: Band,
    /// ROA in percent; breached when below.
    pub roa: Band,
    /// Weight applied when operating cash flow is negative.
    pub negative_cash_flow_weight: u32,
    pub danger_score: u32,
    pub caution_score: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            debt_ratio: Band::new(70.0, 30, 50.0, 15),
            current_ratio: Band::new(1.0, 25, 1.5, 10),
            equity_ratio: Band::new(30.0, 20, 50.0, 10),
            roa: Band::new(0.0, 20, 3.0, 5),
            negative_cash_flow_weight: 15,
            danger_score: 60,
            caution_score: 30,
        }
    }
}

/// Accumulates points and messages while the rules run.
#[derive(Default)]
struct Scorecard {
    score: u32,
    warnings: Vec<String>,
    recommendations: Vec<String>,
}

impl Scorecard {
    fn flag(&mut self, points: u32, warning: String, recommendation: &str) {
        self.score = self.score.saturating_add(points);
        self.warnings.push(warning);
        self.recommendations.push(recommendation.to_string());
    }
}

/// Scores `ratios` against the default calibration.
pub fn assess_risk(ratios: &DisplayRatios, aggregates: &FinancialAggregates) -> RiskAssessment {
    assess_risk_with(&RiskThresholds::default(), ratios, aggregates)
}

/// Scores `ratios` against an arbitrary threshold table.
///
/// Never fails. Unknown or non-finite metrics simply skip their rule, so a
/// row of nulls with non-negative cash flow is a clean bill of health.
pub fn assess_risk_with(
    thresholds: &RiskThresholds,
    ratios: &DisplayRatios,
    aggregates: &FinancialAggregates,
) -> RiskAssessment {
    let known = |value: Option<f64>| value.filter(|v| v.is_finite());
    let mut card = Scorecard::default();

    if let Some(debt) = known(ratios.debt_ratio) {
        let band = thresholds.debt_ratio;
        if debt > band.severe {
            card.flag(
                band.severe_weight,
                format!("Debt ratio of {debt:.1}% is above {}%; leverage is dangerously high.", band.severe),
                "Reduce borrowings and rebuild equity before taking on new obligations.",
            );
        } else if debt > band.soft {
            card.flag(
                band.soft_weight,
                format!("Debt ratio of {debt:.1}% is above {}%; leverage needs watching.", band.soft),
                "Put a debt management plan in place.",
            );
        }
    }

    if let Some(current) = known(ratios.current_ratio) {
        let band = thresholds.current_ratio;
        if current < band.severe {
            card.flag(
                band.severe_weight,
                format!("Current ratio of {current:.2} is below {}; short-term obligations exceed liquid assets.", band.severe),
                "Secure short-term funding and grow current assets.",
            );
        } else if current < band.soft {
            card.flag(
                band.soft_weight,
                format!("Current ratio of {current:.2} is below {}; liquidity is thin.", band.soft),
                "Tighten working capital management.",
            );
        }
    }

    if let Some(equity) = known(ratios.equity_ratio) {
        let band = thresholds.equity_ratio;
        if equity < band.severe {
            card.flag(
                band.severe_weight,
                format!("Equity ratio of {equity:.1}% is below {}%; the capital structure is unstable.", band.severe),
                "Strengthen the capital base as a matter of urgency.",
            );
        } else if equity < band.soft {
            card.flag(
                band.soft_weight,
                format!("Equity ratio of {equity:.1}% is below {}%; the capital structure could be firmer.", band.soft),
                "Consider retaining more earnings or raising capital.",
            );
        }
    }

    if let Some(roa) = known(ratios.roa) {
        let band = thresholds.roa;
        if roa < band.severe {
            card.flag(
                band.severe_weight,
                format!("ROA of {roa:.1}% is below {}%; the asset base is losing money.", band.severe),
                "Restructure loss-making operations.",
            );
        } else if roa < band.soft {
            card.flag(
                band.soft_weight,
                format!("ROA of {roa:.1}% is below {}%; assets are barely earning.", band.soft),
                "Look for ways to use assets more productively.",
            );
        }
    }

    if aggregates.operating_cash_flow.is_finite() && aggregates.operating_cash_flow < 0.0 {
        card.flag(
            thresholds.negative_cash_flow_weight,
            "Operating cash flow is negative; the business is not generating cash.".to_string(),
            "Improve cash generation and operating efficiency.",
        );
    }

    let level = if card.score >= thresholds.danger_score {
        RiskLevel::Danger
    } else if card.score >= thresholds.caution_score {
        RiskLevel::Caution
    } else {
        RiskLevel::Safe
    };

    RiskAssessment {
        level,
        score: card.score,
        warnings: card.warnings,
        recommendations: card.recommendations,
    }
}
