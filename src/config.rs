// =============================================================================
// config.rs - EVERY KNOB IN ONE PLACE
// =============================================================================
//
// Where the data store lives, which DART key to use, which model answers the
// small talk, where the graveyard CSV sits on disk, how long we wait for any
// of them, and the exact cutoffs the risk scorecard applies.
//
// Everything comes from DISTRESS_RADAR_* environment variables (a .env file
// is honoured), and everything has a default, so the binary starts with no
// configuration at all. It just will not get very far without API keys.
// A value that fails to parse falls back to its default rather than
// aborting the session.
// =============================================================================

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::circuit_breaker::BreakerSettings;
use crate::orchestrator::DialogueSettings;
use crate::risk::{Band, RiskThresholds};
use crate::services::assistant::CompletionSettings;

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // DATA STORE (directory + ratio table)
    // =========================================================================
    /// PostgREST base URL, without the `/rest/v1` suffix.
    pub data_store_url: String,
    pub data_store_key: String,
    /// Table mapping company names to corp_code and ticker.
    pub directory_table: String,
    /// Table of precomputed display ratios, keyed by ticker. The store keeps
    /// one `<year>_ratio` table per published snapshot. The default follows
    /// `DISTRESS_RADAR_FISCAL_YEAR` when that is set and otherwise names the
    /// latest snapshot, `2024_ratio`, which does not move with the clock the
    /// way unset statement years do.
    pub ratio_table: String,

    // =========================================================================
    // DART
    // =========================================================================
    pub dart_base_url: String,
    pub dart_api_key: String,

    // =========================================================================
    // ASSISTANT
    // =========================================================================
    /// Full chat-completions URL.
    pub assistant_url: String,
    pub assistant_api_key: String,
    pub completion: CompletionSettings,

    // =========================================================================
    // DIALOGUE
    // =========================================================================
    pub dataset_path: PathBuf,
    /// Fiscal year to fetch statements for. `None` means the latest year on
    /// file: last calendar year, or the one before if nothing is filed yet.
    pub fiscal_year: Option<i32>,
    /// Number of recent messages sent to the assistant as history.
    pub history_window: usize,

    // =========================================================================
    // RESILIENCE
    // =========================================================================
    pub request_timeout: Duration,
    pub breaker: BreakerSettings,

    // =========================================================================
    // RISK SCORECARD
    // =========================================================================
    pub risk_thresholds: RiskThresholds,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let completion_defaults = CompletionSettings::default();
        let breaker_defaults = BreakerSettings::default();
        let fiscal_year: Option<i32> =
            lookup("DISTRESS_RADAR_FISCAL_YEAR").and_then(|v| v.trim().parse().ok());

        Config {
            data_store_url: text("DISTRESS_RADAR_DATA_STORE_URL", "http://127.0.0.1:54321"),
            data_store_key: text("DISTRESS_RADAR_DATA_STORE_KEY", ""),
            directory_table: text("DISTRESS_RADAR_DIRECTORY_TABLE", "ticker_info"),
            ratio_table: text("DISTRESS_RADAR_RATIO_TABLE", &ratio_table_for(fiscal_year)),

            dart_base_url: text("DISTRESS_RADAR_DART_URL", "https://opendart.fss.or.kr/api"),
            dart_api_key: text("DISTRESS_RADAR_DART_KEY", ""),

            assistant_url: text(
                "DISTRESS_RADAR_ASSISTANT_URL",
                "https://api.openai.com/v1/chat/completions",
            ),
            assistant_api_key: text("DISTRESS_RADAR_ASSISTANT_KEY", ""),
            completion: CompletionSettings {
                model: text("DISTRESS_RADAR_ASSISTANT_MODEL", &completion_defaults.model),
                max_tokens: parse_or(&lookup, "DISTRESS_RADAR_ASSISTANT_MAX_TOKENS", completion_defaults.max_tokens),
                temperature: parse_or(&lookup, "DISTRESS_RADAR_ASSISTANT_TEMPERATURE", completion_defaults.temperature),
            },

            dataset_path: PathBuf::from(text(
                "DISTRESS_RADAR_DATASET_PATH",
                "data/delisted_financials_with_metrics.csv",
            )),
            fiscal_year,
            history_window: parse_or(&lookup, "DISTRESS_RADAR_HISTORY_WINDOW", 10),

            request_timeout: Duration::from_secs(parse_or(&lookup, "DISTRESS_RADAR_REQUEST_TIMEOUT_SECS", 20)),
            breaker: BreakerSettings {
                failure_threshold: parse_or(&lookup, "DISTRESS_RADAR_CB_FAILURE_THRESHOLD", breaker_defaults.failure_threshold),
                reset_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "DISTRESS_RADAR_CB_RESET_TIMEOUT_SECS",
                    breaker_defaults.reset_timeout.as_secs(),
                )),
                success_threshold: parse_or(&lookup, "DISTRESS_RADAR_CB_SUCCESS_THRESHOLD", breaker_defaults.success_threshold),
            },

            risk_thresholds: risk_thresholds_from(&lookup),
        }
    }

    /// The subset the orchestrator needs.
    pub fn dialogue_settings(&self) -> DialogueSettings {
        DialogueSettings {
            history_window: self.history_window,
            fiscal_year: self.fiscal_year,
            thresholds: self.risk_thresholds,
        }
    }
}

/// Latest published ratio snapshot.
const LATEST_RATIO_TABLE: &str = "2024_ratio";

fn ratio_table_for(fiscal_year: Option<i32>) -> String {
    fiscal_year.map_or_else(|| LATEST_RATIO_TABLE.to_string(), |year| format!("{year}_ratio"))
}

/// Parses `key`, keeping `default` when unset or malformed.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// One band, each of its four numbers individually overridable under
/// `DISTRESS_RADAR_RISK_<NAME>_{SEVERE,SEVERE_WEIGHT,SOFT,SOFT_WEIGHT}`.
fn band_from<F>(lookup: &F, name: &str, default: Band) -> Band
where
    F: Fn(&str) -> Option<String>,
{
    let key = |suffix: &str| format!("DISTRESS_RADAR_RISK_{name}_{suffix}");
    Band {
        severe: parse_or(lookup, &key("SEVERE"), default.severe),
        severe_weight: parse_or(lookup, &key("SEVERE_WEIGHT"), default.severe_weight),
        soft: parse_or(lookup, &key("SOFT"), default.soft),
        soft_weight: parse_or(lookup, &key("SOFT_WEIGHT"), default.soft_weight),
    }
}

fn risk_thresholds_from<F>(lookup: &F) -> RiskThresholds
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RiskThresholds::default();
    RiskThresholds {
        debt_ratio: band_from(lookup, "DEBT", defaults.debt_ratio),
        current_ratio: band_from(lookup, "CURRENT", defaults.current_ratio),
        equity_ratio: band_from(lookup, "EQUITY", defaults.equity_ratio),
        roa: band_from(lookup, "ROA", defaults.roa),
        negative_cash_flow_weight: parse_or(
            lookup,
            "DISTRESS_RADAR_RISK_NEGATIVE_CASH_FLOW_WEIGHT",
            defaults.negative_cash_flow_weight,
        ),
        danger_score: parse_or(lookup, "DISTRESS_RADAR_RISK_DANGER_SCORE", defaults.danger_score),
        caution_score: parse_or(lookup, "DISTRESS_RADAR_RISK_CAUTION_SCORE", defaults.caution_score),
    }
}
