// =============================================================================
// models.rs - THE VITAL SIGNS OF A COMPANY IN TROUBLE
// =============================================================================
//
// The data structures every other module passes around. Two ratio shapes live
// here side by side and they are NOT the same thing:
//
// - RatioVector is the seven-field profile we compare against the graveyard
//   of delisted companies. Plain fractions, derived from the statements.
// - DisplayRatios is the six-field row the ratio store hands back, expressed
//   the way an analyst reads it (debt ratio in percent, ROA in percent). The
//   risk rules are calibrated against this one.
//
// They overlap on a few names and disagree on units. Keep them apart.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who the session is talking about. Created once the directory lookup and
/// the statement fetch have both succeeded, never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyIdentity {
    pub display_name: String,
    /// Code used by the regulatory filing service (DART corp_code).
    pub filing_code: String,
    /// Exchange ticker, used by the ratio store.
    pub ticker: String,
}

/// What the directory returns for a name it recognises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryHit {
    pub filing_code: String,
    pub ticker: String,
}

/// One line item of a filed statement, amounts in raw currency units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementEntry {
    pub account_name: String,
    /// Current-period amount.
    pub amount: i64,
    /// Prior-period amount, when the filing carries a comparative column.
    pub prior_amount: Option<i64>,
}

impl StatementEntry {
    pub fn new(account_name: impl Into<String>, amount: i64) -> Self {
        Self {
            account_name: account_name.into(),
            amount,
            prior_amount: None,
        }
    }

    pub fn with_prior(mut self, prior_amount: i64) -> Self {
        self.prior_amount = Some(prior_amount);
        self
    }
}

/// Headline balance sheet, income and cash flow figures in hundred-millions
/// of currency. Zero means "not reported", losses are negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialAggregates {
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub equity: f64,
    pub current_assets: f64,
    pub current_liabilities: f64,
    pub revenue: f64,
    pub net_income: f64,
    pub operating_cash_flow: f64,
}

/// Addressable fields of [`FinancialAggregates`], so the review step can
/// edit one figure at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinancialField {
    TotalAssets,
    TotalLiabilities,
    Equity,
    CurrentAssets,
    CurrentLiabilities,
    Revenue,
    NetIncome,
    OperatingCashFlow,
}

impl FinancialField {
    pub const ALL: [FinancialField; 8] = [
        FinancialField::TotalAssets,
        FinancialField::TotalLiabilities,
        FinancialField::Equity,
        FinancialField::CurrentAssets,
        FinancialField::CurrentLiabilities,
        FinancialField::Revenue,
        FinancialField::NetIncome,
        FinancialField::OperatingCashFlow,
    ];

    /// The camelCase name used on the wire and at the terminal.
    pub fn name(self) -> &'static str {
        match self {
            FinancialField::TotalAssets => "totalAssets",
            FinancialField::TotalLiabilities => "totalLiabilities",
            FinancialField::Equity => "equity",
            FinancialField::CurrentAssets => "currentAssets",
            FinancialField::CurrentLiabilities => "currentLiabilities",
            FinancialField::Revenue => "revenue",
            FinancialField::NetIncome => "netIncome",
            FinancialField::OperatingCashFlow => "operatingCashFlow",
        }
    }

    /// Maps a DART account name onto the field it feeds.
    pub fn from_account_name(account_name: &str) -> Option<Self> {
        match account_name.trim() {
            "자산총계" => Some(FinancialField::TotalAssets),
            "부채총계" => Some(FinancialField::TotalLiabilities),
            "자본총계" => Some(FinancialField::Equity),
            "유동자산" => Some(FinancialField::CurrentAssets),
            "유동부채" => Some(FinancialField::CurrentLiabilities),
            "매출액" => Some(FinancialField::Revenue),
            "당기순이익" => Some(FinancialField::NetIncome),
            "영업활동현금흐름" => Some(FinancialField::OperatingCashFlow),
            _ => None,
        }
    }
}

impl fmt::Display for FinancialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FinancialField {
    type Err = String;

    /// Accepts the camelCase name, case-insensitively, with or without
    /// underscores (`netIncome`, `net_income`, `NETINCOME`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        FinancialField::ALL
            .into_iter()
            .find(|field| field.name().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown financial field '{}'", s.trim()))
    }
}

impl FinancialAggregates {
    pub fn get(&self, field: FinancialField) -> f64 {
        match field {
            FinancialField::TotalAssets => self.total_assets,
            FinancialField::TotalLiabilities => self.total_liabilities,
            FinancialField::Equity => self.equity,
            FinancialField::CurrentAssets => self.current_assets,
            FinancialField::CurrentLiabilities => self.current_liabilities,
            FinancialField::Revenue => self.revenue,
            FinancialField::NetIncome => self.net_income,
            FinancialField::OperatingCashFlow => self.operating_cash_flow,
        }
    }

    pub fn set(&mut self, field: FinancialField, value: f64) {
        let slot = match field {
            FinancialField::TotalAssets => &mut self.total_assets,
            FinancialField::TotalLiabilities => &mut self.total_liabilities,
            FinancialField::Equity => &mut self.equity,
            FinancialField::CurrentAssets => &mut self.current_assets,
            FinancialField::CurrentLiabilities => &mut self.current_liabilities,
            FinancialField::Revenue => &mut self.revenue,
            FinancialField::NetIncome => &mut self.net_income,
            FinancialField::OperatingCashFlow => &mut self.operating_cash_flow,
        };
        *slot = value;
    }
}

/// Year-over-year growth that a single period cannot provide on its own.
/// Fractions (0.12 = 12% growth), unknown when there is no usable prior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthRates {
    pub revenue_growth: Option<f64>,
    pub asset_growth: Option<f64>,
}

/// The seven comparison dimensions of a [`RatioVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RatioField {
    CurrentRatio,
    DebtRatio,
    Roa,
    Roe,
    AssetTurnover,
    RevenueGrowth,
    AssetGrowth,
}

impl RatioField {
    pub const ALL: [RatioField; 7] = [
        RatioField::CurrentRatio,
        RatioField::DebtRatio,
        RatioField::Roa,
        RatioField::Roe,
        RatioField::AssetTurnover,
        RatioField::RevenueGrowth,
        RatioField::AssetGrowth,
    ];

    /// Column name in the historical dataset.
    pub fn column(self) -> &'static str {
        match self {
            RatioField::CurrentRatio => "current_ratio",
            RatioField::DebtRatio => "debt_ratio",
            RatioField::Roa => "ROA",
            RatioField::Roe => "ROE",
            RatioField::AssetTurnover => "asset_turnover",
            RatioField::RevenueGrowth => "revenue_growth",
            RatioField::AssetGrowth => "asset_growth",
        }
    }
}

/// Seven-field ratio profile used for similarity search. Every field is
/// either a finite number or unknown (`None`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatioVector {
    pub current_ratio: Option<f64>,
    pub debt_ratio: Option<f64>,
    #[serde(rename = "ROA")]
    pub roa: Option<f64>,
    #[serde(rename = "ROE")]
    pub roe: Option<f64>,
    pub asset_turnover: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub asset_growth: Option<f64>,
}

impl RatioVector {
    /// The value of `field`, with non-finite numbers reported as unknown.
    pub fn get(&self, field: RatioField) -> Option<f64> {
        let raw = match field {
            RatioField::CurrentRatio => self.current_ratio,
            RatioField::DebtRatio => self.debt_ratio,
            RatioField::Roa => self.roa,
            RatioField::Roe => self.roe,
            RatioField::AssetTurnover => self.asset_turnover,
            RatioField::RevenueGrowth => self.revenue_growth,
            RatioField::AssetGrowth => self.asset_growth,
        };
        raw.filter(|v| v.is_finite())
    }

    /// Stores `value`, normalising non-finite numbers to unknown.
    pub fn set(&mut self, field: RatioField, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        match field {
            RatioField::CurrentRatio => self.current_ratio = value,
            RatioField::DebtRatio => self.debt_ratio = value,
            RatioField::Roa => self.roa = value,
            RatioField::Roe => self.roe = value,
            RatioField::AssetTurnover => self.asset_turnover = value,
            RatioField::RevenueGrowth => self.revenue_growth = value,
            RatioField::AssetGrowth => self.asset_growth = value,
        }
    }

    /// Fills in the two growth dimensions supplied by the caller.
    pub fn with_growth(mut self, growth: GrowthRates) -> Self {
        self.set(RatioField::RevenueGrowth, growth.revenue_growth);
        self.set(RatioField::AssetGrowth, growth.asset_growth);
        self
    }

    /// Number of fields holding a usable value.
    pub fn known_fields(&self) -> usize {
        RatioField::ALL
            .iter()
            .filter(|field| self.get(**field).is_some())
            .count()
    }
}

/// The ratio row kept in the ratio store for the current period. Percent
/// units except `current_ratio`, which is a plain multiple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayRatios {
    #[serde(default)]
    pub debt_ratio: Option<f64>,
    #[serde(default)]
    pub current_ratio: Option<f64>,
    #[serde(default)]
    pub equity_ratio: Option<f64>,
    #[serde(
        default,
        rename = "ROA",
        alias = "roa",
        alias = "pretax_income_to_total_assets"
    )]
    pub roa: Option<f64>,
    #[serde(default, rename = "ROE", alias = "roe")]
    pub roe: Option<f64>,
    #[serde(default)]
    pub operating_margin_on_total_assets: Option<f64>,
}

/// Qualitative verdict of the risk scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Caution,
    Danger,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Safe => write!(f, "safe"),
            RiskLevel::Caution => write!(f, "caution"),
            RiskLevel::Danger => write!(f, "danger"),
        }
    }
}

/// Output of the risk scoring engine. Built fresh for every analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: u32,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// One row of the historical distress dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistressRecord {
    pub ticker: String,
    pub year: Option<String>,
    pub ratios: RatioVector,
}

/// A delisted company that resembles the one under analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub ticker: String,
    pub year: Option<String>,
    /// Cosine similarity, clamped to [0, 1].
    pub similarity: f64,
}

impl fmt::Display for SimilarityMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.year {
            Some(year) => write!(f, "{} ({}) - {:.1}%", self.ticker, year, self.similarity * 100.0),
            None => write!(f, "{} - {:.1}%", self.ticker, self.similarity * 100.0),
        }
    }
}

/// Speaker of a turn sent to the conversational fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of the conversation handed to the fallback assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    #[serde(rename = "content")]
    pub text: String,
}

impl ChatTurn {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: ChatRole::System, text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, text: text.into() }
    }
}
