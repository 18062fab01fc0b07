// =============================================================================
// services/fixtures.rs - STAND-INS FOR THE OUTSIDE WORLD (tests only)
// =============================================================================
//
// Scriptable fakes of every collaborator. Each one either answers from a
// canned table, answers "nothing found", or fails with a 503, and records
// what it was asked so tests can assert on the conversation it had.
// =============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{CompanyDirectory, ConversationalFallback, DistressDataset, FilingService, RatioStore};
use crate::error::ServiceError;
use crate::models::{ChatTurn, DirectoryHit, DisplayRatios, DistressRecord, StatementEntry};

fn unavailable(service: &'static str) -> ServiceError {
    ServiceError::Status { service, status: 503 }
}

#[derive(Default)]
pub struct FakeDirectory {
    entries: HashMap<String, DirectoryHit>,
    failing: bool,
    pub queries: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub fn with(name: &str, filing_code: &str, ticker: &str) -> Self {
        let mut directory = Self::default();
        directory.entries.insert(
            name.to_string(),
            DirectoryHit {
                filing_code: filing_code.to_string(),
                ticker: ticker.to_string(),
            },
        );
        directory
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CompanyDirectory for FakeDirectory {
    async fn lookup(&self, name: &str) -> Result<Option<DirectoryHit>, ServiceError> {
        self.queries.lock().push(name.to_string());
        if self.failing {
            return Err(unavailable("directory"));
        }
        Ok(self.entries.get(name).cloned())
    }
}

#[derive(Default)]
pub struct FakeFilings {
    entries: Vec<StatementEntry>,
    /// When set, only this fiscal year has anything on file.
    only_year: Option<i32>,
    failing: bool,
    pub requests: Mutex<Vec<(String, i32)>>,
}

impl FakeFilings {
    pub fn with(entries: Vec<StatementEntry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    /// Statements filed for `year` and no other.
    pub fn for_year(year: i32, entries: Vec<StatementEntry>) -> Self {
        Self {
            entries,
            only_year: Some(year),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl FilingService for FakeFilings {
    async fn fetch_statements(
        &self,
        filing_code: &str,
        fiscal_year: i32,
    ) -> Result<Vec<StatementEntry>, ServiceError> {
        self.requests.lock().push((filing_code.to_string(), fiscal_year));
        if self.failing {
            return Err(unavailable("filings"));
        }
        if self.only_year.is_some_and(|year| year != fiscal_year) {
            return Ok(Vec::new());
        }
        Ok(self.entries.clone())
    }
}

#[derive(Default)]
pub struct FakeRatios {
    rows: HashMap<String, DisplayRatios>,
    failing: bool,
    pub tickers: Mutex<Vec<String>>,
}

impl FakeRatios {
    pub fn with(ticker: &str, ratios: DisplayRatios) -> Self {
        let mut store = Self::default();
        store.rows.insert(ticker.to_string(), ratios);
        store
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl RatioStore for FakeRatios {
    async fn ratios_for(&self, ticker: &str) -> Result<Option<DisplayRatios>, ServiceError> {
        self.tickers.lock().push(ticker.to_string());
        if self.failing {
            return Err(unavailable("ratios"));
        }
        Ok(self.rows.get(ticker).copied())
    }
}

/// A dataset that cannot be read.
pub struct BrokenDataset;

#[async_trait]
impl DistressDataset for BrokenDataset {
    async fn load(&self) -> Result<Vec<DistressRecord>, ServiceError> {
        Err(ServiceError::DatasetIo(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "dataset missing",
        )))
    }
}

pub struct FakeAssistant {
    reply: Option<String>,
    pub conversations: Mutex<Vec<Vec<ChatTurn>>>,
}

impl FakeAssistant {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            conversations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            conversations: Mutex::new(Vec::new()),
        }
    }

    /// The turns of the most recent request.
    pub fn last_conversation(&self) -> Vec<ChatTurn> {
        self.conversations.lock().last().cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.conversations.lock().len()
    }
}

#[async_trait]
impl ConversationalFallback for FakeAssistant {
    async fn reply(&self, turns: &[ChatTurn]) -> Result<String, ServiceError> {
        self.conversations.lock().push(turns.to_vec());
        self.reply.clone().ok_or_else(|| unavailable("assistant"))
    }
}
