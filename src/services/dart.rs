// =============================================================================
// services/dart.rs - READING THE OFFICIAL RECORD
// =============================================================================
//
// DART (the Korean electronic disclosure system) publishes every listed
// company's annual statements as a flat list of line items. We ask for the
// full single-company account list (fnlttSinglAcntAll) of the annual report
// (reprt_code 11011), consolidated first. Plenty of smaller companies never
// file consolidated statements, so an empty consolidated answer is retried
// against the separate statements before we give up.
//
// DART speaks HTTP 200 even when it is unhappy. The real verdict is the
// `status` field in the body: "000" is fine, "013" means "no data", and
// anything else is a complaint we pass on as a rejection.
// =============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::FilingService;
use crate::circuit_breaker::{BreakerSettings, CircuitBreaker};
use crate::error::ServiceError;
use crate::models::StatementEntry;

const SERVICE: &str = "DART";

/// Annual business report.
const ANNUAL_REPORT: &str = "11011";

const STATUS_OK: &str = "000";
const STATUS_NO_DATA: &str = "013";

/// Which statement set to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementScope {
    Consolidated,
    Separate,
}

impl StatementScope {
    fn code(self) -> &'static str {
        match self {
            StatementScope::Consolidated => "CFS",
            StatementScope::Separate => "OFS",
        }
    }
}

#[derive(Debug, Deserialize)]
struct DartResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    list: Vec<DartAccount>,
}

#[derive(Debug, Deserialize)]
struct DartAccount {
    account_nm: String,
    #[serde(default)]
    thstrm_amount: Option<String>,
    #[serde(default)]
    frmtrm_amount: Option<String>,
}

/// Parses a DART amount string. Commas are thousands separators; anything
/// that still fails to parse (blank, "-") counts as zero.
pub fn parse_amount(raw: &str) -> i64 {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse().unwrap_or(0)
}

/// Turns a decoded response body into statement entries.
fn entries_from(response: DartResponse) -> Result<Vec<StatementEntry>, ServiceError> {
    match response.status.as_str() {
        STATUS_OK => Ok(response
            .list
            .into_iter()
            .map(|account| StatementEntry {
                account_name: account.account_nm,
                amount: account.thstrm_amount.as_deref().map_or(0, parse_amount),
                prior_amount: account.frmtrm_amount.as_deref().map(parse_amount),
            })
            .collect()),
        STATUS_NO_DATA => Ok(Vec::new()),
        other => Err(ServiceError::Rejected {
            service: SERVICE,
            detail: format!(
                "status {}: {}",
                other,
                response.message.unwrap_or_default()
            ),
        }),
    }
}

/// Client for the DART open API.
pub struct DartClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
    breaker: CircuitBreaker,
}

impl DartClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
        breaker: BreakerSettings,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("distress_radar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::transport(SERVICE, e))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            request_timeout,
            breaker: CircuitBreaker::new(SERVICE, breaker),
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn statements_url(&self, filing_code: &str, fiscal_year: i32, scope: StatementScope) -> String {
        format!(
            "{}/fnlttSinglAcntAll.json?crtfc_key={}&corp_code={}&bsns_year={}&reprt_code={}&fs_div={}",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(filing_code),
            fiscal_year,
            ANNUAL_REPORT,
            scope.code()
        )
    }

    /// One request for one statement scope.
    pub async fn fetch_scope(
        &self,
        filing_code: &str,
        fiscal_year: i32,
        scope: StatementScope,
    ) -> Result<Vec<StatementEntry>, ServiceError> {
        let url = self.statements_url(filing_code, fiscal_year, scope);
        debug!(filing_code = filing_code, fiscal_year = fiscal_year, scope = ?scope, "DART request");

        self.breaker
            .call(self.request_timeout, async {
                let response = self
                    .http
                    .get(&url)
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .map_err(|e| ServiceError::transport(SERVICE, e))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ServiceError::Status {
                        service: SERVICE,
                        status: status.as_u16(),
                    });
                }

                let body = response
                    .text()
                    .await
                    .map_err(|e| ServiceError::transport(SERVICE, e))?;
                let decoded: DartResponse =
                    serde_json::from_str(&body).map_err(|e| ServiceError::decode(SERVICE, e))?;
                entries_from(decoded)
            })
            .await
    }
}

#[async_trait]
impl FilingService for DartClient {
    async fn fetch_statements(
        &self,
        filing_code: &str,
        fiscal_year: i32,
    ) -> Result<Vec<StatementEntry>, ServiceError> {
        let consolidated = self
            .fetch_scope(filing_code, fiscal_year, StatementScope::Consolidated)
            .await?;
        if !consolidated.is_empty() {
            return Ok(consolidated);
        }

        info!(
            filing_code = filing_code,
            fiscal_year = fiscal_year,
            "No consolidated statements filed, falling back to separate statements"
        );
        self.fetch_scope(filing_code, fiscal_year, StatementScope::Separate)
            .await
    }
}
