// =============================================================================
// orchestrator/script.rs - THE LINES WE SAY
// =============================================================================
//
// Every sentence the orchestrator puts in front of the user, and the system
// prompts it hands the assistant. Kept apart from the state machine so the
// transitions read as transitions.
// =============================================================================

use std::fmt::Write;

use crate::models::{
    CompanyIdentity, DisplayRatios, FinancialAggregates, FinancialField, GrowthRates,
};
use crate::topic::Topic;

use super::session::AnalysisReport;

pub const GREETING: &str = "Hello! Tell me the name of a listed company and I will pull its latest \
annual statements, score its distress risk, and show which delisted companies it most resembles.";

pub const FINANCIAL_PROMPT: &str = "You are a financial analyst specialising in Korean listed \
companies. Explain financial statements and ratios clearly, point out warning signs, and say \
plainly when the data is insufficient. Do not give investment advice.";

pub const GENERAL_PROMPT: &str = "You are a friendly assistant inside a corporate financial \
health checker. Answer briefly and, where it fits, suggest entering a company name to run an \
analysis. Do not give investment advice.";

pub const DIRECTORY_UNAVAILABLE: &str =
    "Sorry, the company directory could not be reached just now.";
pub const FILINGS_UNAVAILABLE: &str =
    "Sorry, the filing service could not be reached just now. Please try the company name again shortly.";
pub const RATIOS_UNAVAILABLE: &str =
    "Sorry, the ratio data could not be retrieved just now. You can keep asking questions or /reset to start over.";
pub const ASSISTANT_UNAVAILABLE: &str =
    "Sorry, I cannot answer that right now. Please try again in a moment.";
pub const DATASET_UNAVAILABLE: &str =
    "The historical distress dataset could not be read, so no similar companies are listed.";

pub fn system_prompt(topic: Topic) -> &'static str {
    match topic {
        Topic::Financial => FINANCIAL_PROMPT,
        Topic::General => GENERAL_PROMPT,
    }
}

pub fn directory_miss(name: &str) -> String {
    format!("I could not find a listed company matching \"{name}\". Treating it as a general question.")
}

pub fn no_statements(identity_name: &str, fiscal_year: i32) -> String {
    format!(
        "No annual statements are on file for {identity_name} for fiscal year {fiscal_year}. \
         Try another company name."
    )
}

pub fn ratio_miss(identity: &CompanyIdentity) -> String {
    format!(
        "No ratio data is available for {} ({}), so the analysis cannot continue. \
         You can keep asking questions or /reset to start over.",
        identity.display_name, identity.ticker
    )
}

fn amount(value: f64) -> String {
    format!("{value:.0}")
}

fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.1}%", v * 100.0),
        _ => "n/a".to_string(),
    }
}

/// The review prompt listing every editable figure.
pub fn financials_for_review(
    identity: &CompanyIdentity,
    fiscal_year: i32,
    aggregates: &FinancialAggregates,
    growth: &GrowthRates,
) -> String {
    let mut text = format!(
        "Found {} (ticker {}). Fiscal year {} figures, in hundred-millions of won:\n",
        identity.display_name, identity.ticker, fiscal_year
    );
    for field in FinancialField::ALL {
        let _ = writeln!(text, "  {:<20} {}", field.name(), amount(aggregates.get(field)));
    }
    let _ = writeln!(
        text,
        "  revenue growth {}, asset growth {}",
        percent(growth.revenue_growth),
        percent(growth.asset_growth)
    );
    text.push_str("Edit any figure with /set <field> <value>, then /confirm to run the analysis.");
    text
}

fn ratio(label: &str, value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{label} {v:.2}{unit}"),
        _ => format!("{label} n/a"),
    }
}

/// Headline of a finished analysis.
pub fn analysis_summary(identity: &CompanyIdentity, report: &AnalysisReport) -> String {
    let assessment = &report.assessment;
    let ratios = &report.display_ratios;
    let mut text = format!(
        "Analysis for {}: risk level {} (score {}).\n",
        identity.display_name, assessment.level, assessment.score
    );
    let _ = writeln!(
        text,
        "  {}, {}, {}, {}",
        ratio("debt ratio", ratios.debt_ratio, "%"),
        ratio("current ratio", ratios.current_ratio, ""),
        ratio("equity ratio", ratios.equity_ratio, "%"),
        ratio("ROA", ratios.roa, "%"),
    );
    for (warning, recommendation) in assessment.warnings.iter().zip(&assessment.recommendations) {
        let _ = writeln!(text, "  ! {warning}\n    -> {recommendation}");
    }
    if report.matches.is_empty() {
        text.push_str("No sufficiently comparable delisted companies were found.");
    } else {
        text.push_str("Most similar delisted companies:");
        for (rank, m) in report.matches.iter().enumerate() {
            let _ = write!(text, "\n  {}. {}", rank + 1, m);
        }
    }
    if let Some(note) = &report.similarity_note {
        let _ = write!(text, "\n{note}");
    }
    text
}

/// Context line handed to the assistant ahead of the history.
pub fn context_summary(
    identity: Option<&CompanyIdentity>,
    aggregates: Option<&FinancialAggregates>,
    ratios: Option<&DisplayRatios>,
) -> Option<String> {
    if aggregates.is_none() && ratios.is_none() {
        return None;
    }
    let mut text = String::from("Context for this conversation.");
    if let Some(identity) = identity {
        let _ = write!(text, " Company: {} ({}).", identity.display_name, identity.ticker);
    }
    if let Some(a) = aggregates {
        let _ = write!(
            text,
            " Figures in hundred-millions of won: total assets {}, total liabilities {}, equity {}, \
             current assets {}, current liabilities {}, revenue {}, net income {}, operating cash flow {}.",
            amount(a.total_assets),
            amount(a.total_liabilities),
            amount(a.equity),
            amount(a.current_assets),
            amount(a.current_liabilities),
            amount(a.revenue),
            amount(a.net_income),
            amount(a.operating_cash_flow),
        );
    }
    if let Some(r) = ratios {
        let _ = write!(
            text,
            " Ratios: {}, {}, {}, {}, {}, {}.",
            ratio("debt ratio", r.debt_ratio, "%"),
            ratio("current ratio", r.current_ratio, ""),
            ratio("equity ratio", r.equity_ratio, "%"),
            ratio("ROA", r.roa, "%"),
            ratio("ROE", r.roe, "%"),
            ratio("operating margin on assets", r.operating_margin_on_total_assets, "%"),
        );
    }
    Some(text)
}
