// =============================================================================
// dataset.rs - THE GRAVEYARD LEDGER
// =============================================================================
//
// A flat CSV of ratio profiles for companies that were delisted after
// running into trouble. One row per company-year:
//
//   ticker,year,current_ratio,debt_ratio,ROA,ROE,asset_turnover,revenue_growth,asset_growth
//
// The file is hand-maintained, so the reader is forgiving: columns may come
// in any order, extra columns are ignored, and a blank or garbled cell just
// means "unknown". A row without a ticker is skipped. A missing file or a
// structurally broken CSV is an error, reported to the orchestrator, which
// carries on without similarity matches.
//
// The file is re-read on every query so edits show up without a restart.
// =============================================================================

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::models::{DistressRecord, RatioField, RatioVector};
use crate::services::DistressDataset;

/// Parses a dataset cell. Blank, non-numeric and non-finite cells are
/// unknown.
fn parse_cell(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Column positions resolved from the header row.
struct Columns {
    ticker: usize,
    year: Option<usize>,
    ratios: Vec<(RatioField, usize)>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Option<Self> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);
        let ticker = position("ticker")?;
        let ratios = RatioField::ALL
            .into_iter()
            .filter_map(|field| position(field.column()).map(|idx| (field, idx)))
            .collect();
        Some(Self {
            ticker,
            year: position("year"),
            ratios,
        })
    }

    fn record(&self, row: &csv::StringRecord) -> Option<DistressRecord> {
        let ticker = row.get(self.ticker)?.trim();
        if ticker.is_empty() {
            return None;
        }
        let year = self
            .year
            .and_then(|idx| row.get(idx))
            .map(str::trim)
            .filter(|y| !y.is_empty())
            .map(str::to_string);

        let mut ratios = RatioVector::default();
        for (field, idx) in &self.ratios {
            ratios.set(*field, row.get(*idx).and_then(parse_cell));
        }

        Some(DistressRecord {
            ticker: ticker.to_string(),
            year,
            ratios,
        })
    }
}

/// Parses dataset CSV text into records, in file order.
pub fn parse_distress_csv(text: &str) -> Result<Vec<DistressRecord>, ServiceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let columns = Columns::resolve(&headers).ok_or_else(|| {
        ServiceError::decode("distress dataset", "header row has no 'ticker' column")
    })?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        match columns.record(&row) {
            Some(record) => records.push(record),
            None => debug!(line = ?row.position().map(|p| p.line()), "Skipping dataset row without ticker"),
        }
    }
    Ok(records)
}

/// The distress dataset as a CSV file on disk.
pub struct CsvDistressDataset {
    path: PathBuf,
}

impl CsvDistressDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DistressDataset for CsvDistressDataset {
    async fn load(&self) -> Result<Vec<DistressRecord>, ServiceError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Could not read distress dataset");
            ServiceError::from(e)
        })?;
        let records = parse_distress_csv(&text)?;
        debug!(path = %self.path.display(), records = records.len(), "Distress dataset loaded");
        Ok(records)
    }
}

/// A fixed, in-memory dataset.
pub struct InMemoryDistressDataset {
    records: Vec<DistressRecord>,
}

impl InMemoryDistressDataset {
    pub fn new(records: Vec<DistressRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl DistressDataset for InMemoryDistressDataset {
    async fn load(&self) -> Result<Vec<DistressRecord>, ServiceError> {
        Ok(self.records.clone())
    }
}
