// =============================================================================
// services/data_store.rs - THE POSTGREST PLUMBING
// =============================================================================
//
// Two lookups live in the hosted data store: the company directory
// (name -> corp_code + ticker) and the precomputed ratio table
// (ticker -> one row of display ratios). Both go through a single
// DataStoreClient that owns the HTTP client, the credentials, the deadline
// and the circuit breaker. It is built once in main.rs and handed to both
// adapters. There is no global client.
// =============================================================================

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{CompanyDirectory, RatioStore};
use crate::circuit_breaker::{BreakerSettings, CircuitBreaker};
use crate::error::ServiceError;
use crate::models::{DirectoryHit, DisplayRatios};

const SERVICE: &str = "data store";

/// Shared connection to the PostgREST data store.
pub struct DataStoreClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
    breaker: CircuitBreaker,
}

impl DataStoreClient {
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

    /// Runs a PostgREST select against `table` with the given query string
    /// and decodes the returned array.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, ServiceError> {
        let url = format!(
            "{}/rest/v1/{}?{}",
            self.base_url,
            urlencoding::encode(table),
            query
        );
        debug!(table = table, query = query, "Data store select");

        self.breaker
            .call(self.request_timeout, async {
                let response = self
                    .http
                    .get(&url)
                    .header("apikey", &self.api_key)
                    .bearer_auth(&self.api_key)
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
                serde_json::from_str(&body).map_err(|e| ServiceError::decode(SERVICE, e))
            })
            .await
    }
}

/// Row of the directory table. Only the identifying columns are selected.
#[derive(Debug, Deserialize)]
struct DirectoryRow {
    corp_code: String,
    #[serde(default)]
    ticker: Option<String>,
}

/// Drops the characters `ilike` treats as wildcards, so user input only
/// ever matches literally.
fn literal_pattern(name: &str) -> String {
    name.chars().filter(|c| !matches!(c, '*' | '%')).collect()
}

/// Query string for a case-insensitive, partial-match name search.
fn directory_query(name: &str) -> String {
    format!(
        "select=corp_code,ticker,corp_name&corp_name=ilike.*{}*&limit=5",
        urlencoding::encode(&literal_pattern(name))
    )
}

/// Query string for an exact ticker match on the ratio table.
fn ratio_query(ticker: &str) -> String {
    format!("select=*&ticker=eq.{}&limit=1", urlencoding::encode(ticker))
}

/// First row with a listed ticker wins. Unlisted rows have nothing to look
/// up in the ratio store.
fn first_hit(rows: Vec<DirectoryRow>) -> Option<DirectoryHit> {
    rows.into_iter().find_map(|row| {
        let ticker = row.ticker.filter(|t| !t.trim().is_empty())?;
        Some(DirectoryHit {
            filing_code: row.corp_code,
            ticker,
        })
    })
}

/// Company directory backed by the data store.
pub struct DataStoreDirectory {
    client: Arc<DataStoreClient>,
    table: String,
}

impl DataStoreDirectory {
    pub fn new(client: Arc<DataStoreClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl CompanyDirectory for DataStoreDirectory {
    async fn lookup(&self, name: &str) -> Result<Option<DirectoryHit>, ServiceError> {
        if literal_pattern(name).trim().is_empty() {
            return Ok(None);
        }
        let rows: Vec<DirectoryRow> = self
            .client
            .select(&self.table, &directory_query(name))
            .await?;
        debug!(name = name, rows = rows.len(), "Directory lookup answered");
        Ok(first_hit(rows))
    }
}

/// Ratio store backed by the data store.
pub struct DataStoreRatioStore {
    client: Arc<DataStoreClient>,
    table: String,
}

impl DataStoreRatioStore {
    pub fn new(client: Arc<DataStoreClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl RatioStore for DataStoreRatioStore {
    async fn ratios_for(&self, ticker: &str) -> Result<Option<DisplayRatios>, ServiceError> {
        let rows: Vec<DisplayRatios> = self.client.select(&self.table, &ratio_query(ticker)).await?;
        Ok(rows.into_iter().next())
    }
}
