// =============================================================================
// orchestrator/session.rs - WHAT THE CONVERSATION REMEMBERS
// =============================================================================
//
// One session per user, never shared. It knows where in the flow we are,
// which company we settled on, the figures under review, and every message
// exchanged so far. The orchestrator is the only writer.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::models::{
    CompanyIdentity, DisplayRatios, FinancialAggregates, GrowthRates, RatioVector,
    RiskAssessment, SimilarityMatch,
};

/// Position in the dialogue. Only ever moves forward; `reset` is the one
/// way back to the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    CollectingName,
    ReviewingFinancials,
    Analyzing,
    Complete,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::CollectingName => write!(f, "collecting-name"),
            Step::ReviewingFinancials => write!(f, "reviewing-financials"),
            Step::Analyzing => write!(f, "analyzing"),
            Step::Complete => write!(f, "complete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    System,
}

/// Everything an analysis produced, attached to the message announcing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub display_ratios: DisplayRatios,
    pub ratio_vector: RatioVector,
    pub assessment: RiskAssessment,
    pub matches: Vec<SimilarityMatch>,
    /// Set when similarity matching could not run.
    pub similarity_note: Option<String>,
}

/// Structured payload carried alongside a message's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attachment {
    /// The figures put up for review.
    Financials {
        identity: CompanyIdentity,
        aggregates: FinancialAggregates,
        growth: GrowthRates,
    },
    Analysis(Box<AnalysisReport>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub author: Author,
    pub text: String,
    pub attachment: Option<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(author: Author, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            text: text.into(),
            attachment: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Per-user dialogue state.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub step: Step,
    pub identity: Option<CompanyIdentity>,
    /// Draft figures while reviewing, confirmed figures afterwards.
    pub aggregates: Option<FinancialAggregates>,
    /// Prior-period figures from the filing. Growth is measured against
    /// these, whatever the user does to the current ones.
    pub prior: Option<FinancialAggregates>,
    /// Ratio row used by the most recent analysis.
    pub last_ratios: Option<DisplayRatios>,
    pub messages: Vec<Message>,
}

impl Session {
    /// A fresh session at `collecting-name`, opened with `greeting`.
    pub fn new(greeting: &str) -> Self {
        Self {
            step: Step::CollectingName,
            identity: None,
            aggregates: None,
            prior: None,
            last_ratios: None,
            messages: vec![Message::new(Author::System, greeting)],
        }
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn say(&mut self, text: impl Into<String>) {
        self.push(Message::new(Author::System, text));
    }

    pub(crate) fn hear(&mut self, text: impl Into<String>) {
        self.push(Message::new(Author::User, text));
    }

    /// Number of system-authored messages.
    pub fn system_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.author == Author::System)
            .count()
    }
}
