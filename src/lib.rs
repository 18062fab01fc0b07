// =============================================================================
// lib.rs - DISTRESS RADAR
// =============================================================================
//
// Type a company name, look over its latest annual figures, and get back a
// rule-based distress verdict plus the delisted companies whose numbers
// looked most like it before they went under.
//
// Leaf modules first: the ratio model, the scorecard and the similarity
// search are pure functions. The orchestrator sequences them against the
// outside world, which lives behind the traits in `services`.
// =============================================================================

pub mod circuit_breaker;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod ratios;
pub mod risk;
pub mod services;
pub mod similarity;
pub mod topic;

pub use error::{DialogueError, ServiceError};
pub use orchestrator::{DialogueOrchestrator, DialogueSettings, Step};
