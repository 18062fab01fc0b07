// =============================================================================
// services/mod.rs - THE OUTSIDE WORLD, ON A SHORT LEASH
// =============================================================================
//
// The orchestrator needs five things it cannot do itself: find a company by
// name, pull its filed statements, fetch its precomputed ratio row, read the
// graveyard of delisted companies, and make small talk when all else fails.
// Each of those is a trait here, so the state machine can be driven against
// real HTTP adapters in production and against in-memory fakes in tests.
//
// Every implementation reports trouble as a ServiceError and never panics.
// A "not found" is not trouble: it is Ok(None) or an empty list.
// =============================================================================

pub mod assistant;
pub mod dart;
pub mod data_store;

#[cfg(test)]
pub mod fixtures;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::{ChatTurn, DirectoryHit, DisplayRatios, DistressRecord, StatementEntry};

/// Resolves a free-text company name to its filing code and ticker.
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// Case-insensitive, partial-match lookup. `name` arrives trimmed and
    /// upper-cased.
    async fn lookup(&self, name: &str) -> Result<Option<DirectoryHit>, ServiceError>;
}

/// Fetches line items from the regulatory filing service.
#[async_trait]
pub trait FilingService: Send + Sync {
    /// Annual statement entries for `filing_code` in `fiscal_year`. An empty
    /// vector means the filing does not exist.
    async fn fetch_statements(
        &self,
        filing_code: &str,
        fiscal_year: i32,
    ) -> Result<Vec<StatementEntry>, ServiceError>;
}

/// Looks up precomputed display ratios by exact ticker.
#[async_trait]
pub trait RatioStore: Send + Sync {
    async fn ratios_for(&self, ticker: &str) -> Result<Option<DisplayRatios>, ServiceError>;
}

/// Source of historical distress records.
#[async_trait]
pub trait DistressDataset: Send + Sync {
    /// Every record, in dataset order. Read in full on each call.
    async fn load(&self) -> Result<Vec<DistressRecord>, ServiceError>;
}

/// General-purpose language model used when the structured path has nothing
/// to say.
#[async_trait]
pub trait ConversationalFallback: Send + Sync {
    async fn reply(&self, turns: &[ChatTurn]) -> Result<String, ServiceError>;
}
