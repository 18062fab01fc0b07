// =============================================================================
// orchestrator/mod.rs - THE CONVERSATION STATE MACHINE
// =============================================================================
//
//   collecting-name ──name──▶ reviewing-financials ──confirm──▶ analyzing ──▶ complete
//         ▲                                                                      │
//         └───────────────────────────── reset ──────────────────────────────────┘
//
// Plus a free-form path (`ask`) that works from any step and never moves it.
//
// The rules of the road:
//
// - A step only ever moves forward. `reset` is the one way back.
// - Nothing an upstream does can crash the session. Every failure becomes an
//   apologetic system message and a warn! line, and the step stays put.
// - "Not found" is not a failure. It gets an informational message instead.
// - Calling an operation in the wrong step is the caller's bug and comes
//   back as DialogueError::WrongStep with the session untouched.
// - Every operation takes &mut self, so one session can never have two
//   operations in flight at once.
// =============================================================================

mod script;
pub mod session;

pub use session::{AnalysisReport, Attachment, Author, Message, Session, Step};

use chrono::{Datelike, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{DialogueError, ServiceError};
use crate::metrics::DialogueMetrics;
use crate::models::{
    ChatTurn, CompanyIdentity, FinancialAggregates, FinancialField, StatementEntry,
};
use crate::ratios::{derive_ratio_vector, growth_rates};
use crate::risk::{assess_risk_with, RiskThresholds};
use crate::services::{
    CompanyDirectory, ConversationalFallback, DistressDataset, FilingService, RatioStore,
};
use crate::similarity::find_similar_distressed_companies;
use crate::topic;

/// Raw DART amounts are in won; the aggregates are in hundred-millions.
const HUNDRED_MILLION: f64 = 100_000_000.0;

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialogueSettings {
    /// How many recent messages go to the assistant as history.
    pub history_window: usize,
    /// Fiscal year to request statements for. When unset, the latest year
    /// with statements on file (last calendar year, or the one before).
    pub fiscal_year: Option<i32>,
    pub thresholds: RiskThresholds,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            history_window: 10,
            fiscal_year: None,
            thresholds: RiskThresholds::default(),
        }
    }
}

/// The external collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn CompanyDirectory>,
    pub filings: Arc<dyn FilingService>,
    pub ratios: Arc<dyn RatioStore>,
    pub dataset: Arc<dyn DistressDataset>,
    pub assistant: Arc<dyn ConversationalFallback>,
}

/// Folds statement line items into current and prior-period aggregates.
///
/// Unknown account names are ignored and later rows overwrite earlier ones.
/// The prior aggregates exist only if at least one mapped row carried a
/// prior-period amount.
pub fn aggregate_statements(
    entries: &[StatementEntry],
) -> (FinancialAggregates, Option<FinancialAggregates>) {
    let mut current = FinancialAggregates::default();
    let mut prior = FinancialAggregates::default();
    let mut has_prior = false;

    for entry in entries {
        let Some(field) = FinancialField::from_account_name(&entry.account_name) else {
            continue;
        };
        current.set(field, entry.amount as f64 / HUNDRED_MILLION);
        if let Some(prior_amount) = entry.prior_amount {
            prior.set(field, prior_amount as f64 / HUNDRED_MILLION);
            has_prior = true;
        }
    }

    (current, has_prior.then_some(prior))
}

/// Drives one user's session through lookup, review and analysis.
pub struct DialogueOrchestrator {
    services: Collaborators,
    settings: DialogueSettings,
    metrics: Arc<DialogueMetrics>,
    session: Session,
}

impl DialogueOrchestrator {
    pub fn new(
        services: Collaborators,
        settings: DialogueSettings,
        metrics: Arc<DialogueMetrics>,
    ) -> Self {
        Self {
            services,
            settings,
            metrics,
            session: Session::new(script::GREETING),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn step(&self) -> Step {
        self.session.step
    }

    fn expect_step(&self, operation: &'static str, wanted: Step) -> Result<(), DialogueError> {
        if self.session.step == wanted {
            Ok(())
        } else {
            Err(DialogueError::WrongStep {
                operation,
                actual: self.session.step,
            })
        }
    }

    /// Statements for the configured fiscal year, or for the latest year on
    /// file when none is configured. Last calendar year's reports are filed
    /// by the end of March, so until then an empty answer retries the year
    /// before. Returns the year the entries belong to.
    async fn latest_statements(
        &self,
        filing_code: &str,
    ) -> Result<(i32, Vec<StatementEntry>), ServiceError> {
        let filings = &self.services.filings;
        if let Some(year) = self.settings.fiscal_year {
            return Ok((year, filings.fetch_statements(filing_code, year).await?));
        }

        let year = Utc::now().year() - 1;
        let entries = filings.fetch_statements(filing_code, year).await?;
        if !entries.is_empty() {
            return Ok((year, entries));
        }
        debug!(filing_code, fiscal_year = year, "Nothing filed yet, trying the year before");
        let earlier = year - 1;
        Ok((earlier, filings.fetch_statements(filing_code, earlier).await?))
    }

    fn upstream_failed(&self, stage: &'static str, err: &ServiceError) {
        self.metrics.record_upstream_failure();
        warn!(stage = stage, error = %err, "Upstream failure, apologising to the user");
    }

    /// Handles a company name typed at `collecting-name`.
    ///
    /// A miss (or an unreachable directory) answers the text as a free-form
    /// question in a single system message. A hit with statements on file
    /// moves the session to `reviewing-financials`.
    pub async fn submit_company_name(&mut self, text: &str) -> Result<(), DialogueError> {
        self.expect_step("submit_company_name", Step::CollectingName)?;
        let name = text.trim();
        if name.is_empty() {
            return Ok(());
        }

        self.session.hear(name);
        self.metrics.record_lookup();
        let key = name.to_uppercase();
        debug!(name = %key, "Looking up company");

        let hit = match self.services.directory.lookup(&key).await {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                self.metrics.record_directory_miss();
                info!(name = %key, "Company not in directory, answering free-form");
                let reply = self.fallback_reply(name).await;
                self.session
                    .say(format!("{}\n\n{}", script::directory_miss(name), reply));
                return Ok(());
            }
            Err(err) => {
                self.upstream_failed("directory", &err);
                let reply = self.fallback_reply(name).await;
                self.session
                    .say(format!("{}\n\n{}", script::DIRECTORY_UNAVAILABLE, reply));
                return Ok(());
            }
        };

        let (fiscal_year, entries) = match self.latest_statements(&hit.filing_code).await {
            Ok(found) => found,
            Err(err) => {
                self.upstream_failed("filings", &err);
                self.session.say(script::FILINGS_UNAVAILABLE);
                return Ok(());
            }
        };

        if entries.is_empty() {
            info!(filing_code = %hit.filing_code, fiscal_year, "No statements on file");
            self.session.say(script::no_statements(name, fiscal_year));
            return Ok(());
        }

        let (aggregates, prior) = aggregate_statements(&entries);
        let growth = growth_rates(&aggregates, prior.as_ref());
        let identity = CompanyIdentity {
            display_name: name.to_string(),
            filing_code: hit.filing_code,
            ticker: hit.ticker,
        };

        let text = script::financials_for_review(&identity, fiscal_year, &aggregates, &growth);
        self.session.push(Message::new(Author::System, text).with_attachment(
            Attachment::Financials {
                identity: identity.clone(),
                aggregates,
                growth,
            },
        ));

        info!(
            company = %identity.display_name,
            ticker = %identity.ticker,
            fiscal_year,
            entries = entries.len(),
            "collecting-name -> reviewing-financials"
        );
        self.session.identity = Some(identity);
        self.session.aggregates = Some(aggregates);
        self.session.prior = prior;
        self.session.step = Step::ReviewingFinancials;
        Ok(())
    }

    /// Edits one draft figure during review.
    pub fn update_financial_field(
        &mut self,
        field: FinancialField,
        value: f64,
    ) -> Result<(), DialogueError> {
        self.expect_step("update_financial_field", Step::ReviewingFinancials)?;
        let draft = self.session.aggregates.get_or_insert_with(Default::default);
        draft.set(field, value);
        debug!(field = %field, value, "Draft figure edited");
        Ok(())
    }

    /// Accepts the reviewed figures and runs the analysis.
    ///
    /// Ends in `complete` when the ratio store knows the ticker, otherwise
    /// stays in `analyzing` with an explanatory message.
    pub async fn submit_financials(
        &mut self,
        aggregates: FinancialAggregates,
    ) -> Result<(), DialogueError> {
        self.expect_step("submit_financials", Step::ReviewingFinancials)?;

        self.session.aggregates = Some(aggregates);
        self.session.hear("Figures confirmed.");
        self.session.step = Step::Analyzing;
        info!("reviewing-financials -> analyzing");

        self.run_analysis(aggregates).await;
        Ok(())
    }

    async fn run_analysis(&mut self, aggregates: FinancialAggregates) {
        let Some(identity) = self.session.identity.clone() else {
            return;
        };

        let display_ratios = match self.services.ratios.ratios_for(&identity.ticker).await {
            Ok(Some(ratios)) => ratios,
            Ok(None) => {
                self.metrics.record_ratio_miss();
                info!(ticker = %identity.ticker, "No ratio row for ticker");
                self.session.say(script::ratio_miss(&identity));
                return;
            }
            Err(err) => {
                self.upstream_failed("ratios", &err);
                self.session.say(script::RATIOS_UNAVAILABLE);
                return;
            }
        };

        let assessment = assess_risk_with(&self.settings.thresholds, &display_ratios, &aggregates);
        let growth = growth_rates(&aggregates, self.session.prior.as_ref());
        let ratio_vector = derive_ratio_vector(&aggregates).with_growth(growth);

        let (matches, similarity_note) = match self.services.dataset.load().await {
            Ok(records) => {
                debug!(candidates = records.len(), "Scoring similarity");
                (find_similar_distressed_companies(&ratio_vector, &records), None)
            }
            Err(err) => {
                self.upstream_failed("dataset", &err);
                (Vec::new(), Some(script::DATASET_UNAVAILABLE.to_string()))
            }
        };

        let report = AnalysisReport {
            display_ratios,
            ratio_vector,
            assessment,
            matches,
            similarity_note,
        };
        let text = script::analysis_summary(&identity, &report);

        info!(
            company = %identity.display_name,
            level = %report.assessment.level,
            score = report.assessment.score,
            matches = report.matches.len(),
            "analyzing -> complete"
        );
        self.session.last_ratios = Some(display_ratios);
        self.session
            .push(Message::new(Author::System, text).with_attachment(Attachment::Analysis(Box::new(report))));
        self.session.step = Step::Complete;
        self.metrics.record_analysis();
    }

    /// Free-form question, allowed at any step. The assistant's reply (or an
    /// apology) is appended; the step does not change.
    pub async fn ask(&mut self, question: &str) {
        let question = question.trim();
        if question.is_empty() {
            return;
        }
        self.session.hear(question);
        let reply = self.fallback_reply(question).await;
        self.session.say(reply);
    }

    /// Starts over with a fresh session.
    pub fn reset(&mut self) {
        info!(from = %self.session.step, "Session reset");
        self.session = Session::new(script::GREETING);
        self.metrics.record_reset();
    }

    /// Conversation handed to the assistant for `question`, which must
    /// already be the last message in the session.
    fn fallback_turns(&self, question: &str) -> Vec<ChatTurn> {
        let mut turns = vec![ChatTurn::system(script::system_prompt(topic::classify(question)))];

        if let Some(context) = script::context_summary(
            self.session.identity.as_ref(),
            self.session.aggregates.as_ref(),
            self.session.last_ratios.as_ref(),
        ) {
            turns.push(ChatTurn::system(context));
        }

        let messages = &self.session.messages;
        let earlier = &messages[..messages.len().saturating_sub(1)];
        let start = earlier.len().saturating_sub(self.settings.history_window);
        turns.extend(
            earlier[start..]
                .iter()
                .filter(|m| !m.text.trim().is_empty())
                .map(|m| match m.author {
                    Author::User => ChatTurn::user(m.text.clone()),
                    Author::System => ChatTurn::assistant(m.text.clone()),
                }),
        );

        turns.push(ChatTurn::user(question));
        turns
    }

    async fn fallback_reply(&self, question: &str) -> String {
        let turns = self.fallback_turns(question);
        match self.services.assistant.reply(&turns).await {
            Ok(reply) => {
                self.metrics.record_fallback_reply();
                reply
            }
            Err(err) => {
                self.upstream_failed("assistant", &err);
                script::ASSISTANT_UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests;
