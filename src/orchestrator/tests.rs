use std::sync::Arc;

use super::*;
use crate::dataset::InMemoryDistressDataset;
use crate::models::{
    ChatRole, DisplayRatios, DistressRecord, GrowthRates, RatioVector, RiskLevel,
};
use crate::services::fixtures::{
    BrokenDataset, FakeAssistant, FakeDirectory, FakeFilings, FakeRatios,
};

const EOK: i64 = 100_000_000;

struct Harness {
    orchestrator: DialogueOrchestrator,
    directory: Arc<FakeDirectory>,
    filings: Arc<FakeFilings>,
    ratios: Arc<FakeRatios>,
    assistant: Arc<FakeAssistant>,
    metrics: Arc<DialogueMetrics>,
}

fn harness_with(
    directory: FakeDirectory,
    filings: FakeFilings,
    ratios: FakeRatios,
    dataset: Arc<dyn DistressDataset>,
    assistant: FakeAssistant,
    settings: DialogueSettings,
) -> Harness {
    let directory = Arc::new(directory);
    let filings = Arc::new(filings);
    let ratios = Arc::new(ratios);
    let assistant = Arc::new(assistant);
    let metrics = Arc::new(DialogueMetrics::new());
    let orchestrator = DialogueOrchestrator::new(
        Collaborators {
            directory: directory.clone(),
            filings: filings.clone(),
            ratios: ratios.clone(),
            dataset,
            assistant: assistant.clone(),
        },
        settings,
        metrics.clone(),
    );
    Harness {
        orchestrator,
        directory,
        filings,
        ratios,
        assistant,
        metrics,
    }
}

fn settings() -> DialogueSettings {
    DialogueSettings {
        fiscal_year: Some(2024),
        ..Default::default()
    }
}

fn scenario_entries() -> Vec<StatementEntry> {
    vec![
        StatementEntry::new("자산총계", 1000 * EOK).with_prior(800 * EOK),
        StatementEntry::new("부채총계", 800 * EOK),
        StatementEntry::new("자본총계", 200 * EOK),
        StatementEntry::new("유동자산", 300 * EOK),
        StatementEntry::new("유동부채", 400 * EOK),
        StatementEntry::new("매출액", 500 * EOK).with_prior(400 * EOK),
        StatementEntry::new("당기순이익", -50 * EOK),
        StatementEntry::new("영업활동현금흐름", -10 * EOK),
        StatementEntry::new("이익잉여금", 77 * EOK),
    ]
}

fn scenario_aggregates() -> FinancialAggregates {
    FinancialAggregates {
        total_assets: 1000.0,
        total_liabilities: 800.0,
        equity: 200.0,
        current_assets: 300.0,
        current_liabilities: 400.0,
        revenue: 500.0,
        net_income: -50.0,
        operating_cash_flow: -10.0,
    }
}

fn distressed_ratios() -> DisplayRatios {
    DisplayRatios {
        debt_ratio: Some(400.0),
        current_ratio: Some(0.75),
        roa: Some(-5.0),
        ..Default::default()
    }
}

fn graveyard() -> Arc<dyn DistressDataset> {
    let twin = derive_ratio_vector(&scenario_aggregates()).with_growth(GrowthRates {
        revenue_growth: Some(0.25),
        asset_growth: Some(0.25),
    });
    let stranger = RatioVector {
        current_ratio: Some(3.0),
        debt_ratio: Some(0.2),
        roa: Some(0.15),
        roe: Some(0.2),
        asset_turnover: Some(1.5),
        revenue_growth: Some(0.3),
        asset_growth: Some(0.1),
    };
    Arc::new(InMemoryDistressDataset::new(vec![
        DistressRecord {
            ticker: "STRANGER".into(),
            year: None,
            ratios: stranger,
        },
        DistressRecord {
            ticker: "TWIN".into(),
            year: Some("2017".into()),
            ratios: twin,
        },
    ]))
}

/// Directory knows ACME, filings return the scenario, ratios are distressed.
fn happy_harness() -> Harness {
    harness_with(
        FakeDirectory::with("ACME", "00000001", "000001"),
        FakeFilings::with(scenario_entries()),
        FakeRatios::with("000001", distressed_ratios()),
        graveyard(),
        FakeAssistant::replying("assistant says hi"),
        settings(),
    )
}

fn last_text(h: &Harness) -> &str {
    &h.orchestrator.session().messages.last().unwrap().text
}

// =========================================================================
// collecting-name
// =========================================================================

#[tokio::test]
async fn test_directory_miss_stays_collecting_with_one_system_message() {
    let mut h = happy_harness();
    let before = h.orchestrator.session().system_message_count();

    h.orchestrator.submit_company_name("XYZCORP123").await.unwrap();

    let session = h.orchestrator.session();
    assert_eq!(session.step, Step::CollectingName);
    assert!(session.identity.is_none());
    assert_eq!(session.system_message_count(), before + 1);
    assert_eq!(h.assistant.calls(), 1);
    assert!(last_text(&h).contains("XYZCORP123"));
    assert!(last_text(&h).ends_with("assistant says hi"));
    assert_eq!(h.metrics.snapshot().directory_misses, 1);
    assert!(h.filings.requests.lock().is_empty());
}

#[tokio::test]
async fn test_lookup_uses_trimmed_uppercase_name() {
    let mut h = happy_harness();
    h.orchestrator.submit_company_name("  acme \n").await.unwrap();

    assert_eq!(h.directory.queries.lock().as_slice(), ["ACME".to_string()]);
    let identity = h.orchestrator.session().identity.clone().unwrap();
    assert_eq!(identity.display_name, "acme");
    assert_eq!(identity.ticker, "000001");
}

#[tokio::test]
async fn test_hit_moves_to_review_with_aggregates_and_growth() {
    let mut h = happy_harness();
    h.orchestrator.submit_company_name("ACME").await.unwrap();

    let session = h.orchestrator.session();
    assert_eq!(session.step, Step::ReviewingFinancials);
    assert_eq!(session.aggregates, Some(scenario_aggregates()));
    let prior = session.prior.unwrap();
    assert_eq!(prior.revenue, 400.0);
    assert_eq!(prior.total_assets, 800.0);
    assert_eq!(
        h.filings.requests.lock().as_slice(),
        [("00000001".to_string(), 2024)]
    );

    match &session.messages.last().unwrap().attachment {
        Some(Attachment::Financials { identity, aggregates, growth }) => {
            assert_eq!(identity.filing_code, "00000001");
            assert_eq!(aggregates.revenue, 500.0);
            assert_eq!(growth.revenue_growth, Some(0.25));
            assert_eq!(growth.asset_growth, Some(0.25));
        }
        other => panic!("expected financials attachment, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_filing_is_not_found() {
    let mut h = harness_with(
        FakeDirectory::with("ACME", "00000001", "000001"),
        FakeFilings::empty(),
        FakeRatios::empty(),
        graveyard(),
        FakeAssistant::replying("unused"),
        settings(),
    );
    h.orchestrator.submit_company_name("ACME").await.unwrap();

    let session = h.orchestrator.session();
    assert_eq!(session.step, Step::CollectingName);
    assert!(session.identity.is_none());
    assert!(session.aggregates.is_none());
    assert!(last_text(&h).contains("No annual statements"));
    assert_eq!(h.metrics.snapshot().upstream_failures, 0);
}

#[tokio::test]
async fn test_unset_year_falls_back_to_the_year_before() {
    let last_year = Utc::now().year() - 1;
    let mut h = harness_with(
        FakeDirectory::with("ACME", "00000001", "000001"),
        FakeFilings::for_year(last_year - 1, scenario_entries()),
        FakeRatios::empty(),
        graveyard(),
        FakeAssistant::replying("unused"),
        DialogueSettings::default(),
    );
    h.orchestrator.submit_company_name("ACME").await.unwrap();

    assert_eq!(h.orchestrator.step(), Step::ReviewingFinancials);
    assert_eq!(
        h.filings.requests.lock().as_slice(),
        [
            ("00000001".to_string(), last_year),
            ("00000001".to_string(), last_year - 1),
        ]
    );
    assert!(last_text(&h).contains(&format!("Fiscal year {} figures", last_year - 1)));
}

#[tokio::test]
async fn test_unset_year_prefers_last_year_when_filed() {
    let last_year = Utc::now().year() - 1;
    let mut h = harness_with(
        FakeDirectory::with("ACME", "00000001", "000001"),
        FakeFilings::for_year(last_year, scenario_entries()),
        FakeRatios::empty(),
        graveyard(),
        FakeAssistant::replying("unused"),
        DialogueSettings::default(),
    );
    h.orchestrator.submit_company_name("ACME").await.unwrap();

    assert_eq!(h.orchestrator.step(), Step::ReviewingFinancials);
    assert_eq!(h.filings.requests.lock().len(), 1);
}

#[tokio::test]
async fn test_explicit_year_never_falls_back() {
    let mut h = harness_with(
        FakeDirectory::with("ACME", "00000001", "000001"),
        FakeFilings::for_year(2023, scenario_entries()),
        FakeRatios::empty(),
        graveyard(),
        FakeAssistant::replying("unused"),
        settings(),
    );
    h.orchestrator.submit_company_name("ACME").await.unwrap();

    assert_eq!(h.orchestrator.step(), Step::CollectingName);
    assert_eq!(
        h.filings.requests.lock().as_slice(),
        [("00000001".to_string(), 2024)]
    );
    assert!(last_text(&h).contains("No annual statements"));
}

#[tokio::test]
async fn test_filing_failure_apologises_and_stays() {
    let mut h = harness_with(
        FakeDirectory::with("ACME", "00000001", "000001"),
        FakeFilings::failing(),
        FakeRatios::empty(),
        graveyard(),
        FakeAssistant::replying("unused"),
        settings(),
    );
    h.orchestrator.submit_company_name("ACME").await.unwrap();

    assert_eq!(h.orchestrator.step(), Step::CollectingName);
    assert!(h.orchestrator.session().identity.is_none());
    assert_eq!(last_text(&h), script::FILINGS_UNAVAILABLE);
    assert_eq!(h.metrics.snapshot().upstream_failures, 1);
}

#[tokio::test]
async fn test_directory_failure_apologises_and_answers_free_form() {
    let mut h = harness_with(
        FakeDirectory::failing(),
        FakeFilings::empty(),
        FakeRatios::empty(),
        graveyard(),
        FakeAssistant::replying("general answer"),
        settings(),
    );
    h.orchestrator.submit_company_name("ACME").await.unwrap();

    assert_eq!(h.orchestrator.step(), Step::CollectingName);
    assert!(last_text(&h).starts_with(script::DIRECTORY_UNAVAILABLE));
    assert!(last_text(&h).ends_with("general answer"));
}

#[tokio::test]
async fn test_blank_name_is_ignored() {
    let mut h = happy_harness();
    h.orchestrator.submit_company_name("   ").await.unwrap();
    assert_eq!(h.orchestrator.session().messages.len(), 1);
    assert!(h.directory.queries.lock().is_empty());
}

#[tokio::test]
async fn test_submit_financials_in_wrong_step_is_rejected() {
    let mut h = happy_harness();
    let err = h
        .orchestrator
        .submit_financials(scenario_aggregates())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DialogueError::WrongStep {
            operation: "submit_financials",
            actual: Step::CollectingName,
        }
    );
    assert_eq!(h.orchestrator.session().messages.len(), 1);
    assert!(h.orchestrator.session().aggregates.is_none());
}

// =========================================================================
// reviewing-financials -> analyzing -> complete
// =========================================================================

#[tokio::test]
async fn test_full_analysis_reaches_complete() {
    let mut h = happy_harness();
    h.orchestrator.submit_company_name("ACME").await.unwrap();
    h.orchestrator
        .submit_financials(scenario_aggregates())
        .await
        .unwrap();

    let session = h.orchestrator.session();
    assert_eq!(session.step, Step::Complete);
    assert_eq!(session.last_ratios, Some(distressed_ratios()));
    assert_eq!(h.ratios.tickers.lock().as_slice(), ["000001".to_string()]);

    let report = match &session.messages.last().unwrap().attachment {
        Some(Attachment::Analysis(report)) => report.clone(),
        other => panic!("expected analysis attachment, got {other:?}"),
    };
    assert_eq!(report.assessment.level, RiskLevel::Danger);
    assert!(report.assessment.score >= 90);
    assert_eq!(report.ratio_vector.debt_ratio, Some(4.0));
    assert_eq!(report.ratio_vector.current_ratio, Some(0.75));
    assert_eq!(report.ratio_vector.roa, Some(-0.05));
    assert_eq!(report.ratio_vector.known_fields(), 7);
    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.matches[0].ticker, "TWIN");
    assert!(report.matches[0].similarity > 0.999);
    assert!(report.similarity_note.is_none());
    assert_eq!(h.metrics.snapshot().analyses_completed, 1);
}

#[tokio::test]
async fn test_edited_figures_feed_the_score() {
    let mut h = happy_harness();
    h.orchestrator.submit_company_name("ACME").await.unwrap();
    h.orchestrator
        .update_financial_field(FinancialField::OperatingCashFlow, 50.0)
        .unwrap();
    let draft = h.orchestrator.session().aggregates.unwrap();
    assert_eq!(draft.operating_cash_flow, 50.0);

    h.orchestrator.submit_financials(draft).await.unwrap();
    let Some(Attachment::Analysis(report)) = &h.orchestrator.session().messages.last().unwrap().attachment
    else {
        panic!("expected analysis");
    };
    assert_eq!(report.assessment.score, 30 + 25 + 20);
}

#[tokio::test]
async fn test_edited_figures_recompute_growth() {
    let mut h = happy_harness();
    h.orchestrator.submit_company_name("ACME").await.unwrap();
    h.orchestrator
        .update_financial_field(FinancialField::Revenue, 800.0)
        .unwrap();
    let draft = h.orchestrator.session().aggregates.unwrap();

    h.orchestrator.submit_financials(draft).await.unwrap();
    let Some(Attachment::Analysis(report)) = &h.orchestrator.session().messages.last().unwrap().attachment
    else {
        panic!("expected analysis");
    };
    assert_eq!(report.ratio_vector.revenue_growth, Some(1.0));
    assert_eq!(report.ratio_vector.asset_growth, Some(0.25));
}

#[tokio::test]
async fn test_update_field_outside_review_is_rejected() {
    let mut h = happy_harness();
    let err = h
        .orchestrator
        .update_financial_field(FinancialField::Revenue, 1.0)
        .unwrap_err();
    assert!(matches!(err, DialogueError::WrongStep { actual: Step::CollectingName, .. }));
}

#[tokio::test]
async fn test_ratio_miss_remains_analyzing() {
    let mut h = harness_with(
        FakeDirectory::with("ACME", "00000001", "000001"),
        FakeFilings::with(scenario_entries()),
        FakeRatios::empty(),
        graveyard(),
        FakeAssistant::replying("ok"),
        settings(),
    );
    h.orchestrator.submit_company_name("ACME").await.unwrap();
    h.orchestrator
        .submit_financials(scenario_aggregates())
        .await
        .unwrap();

    assert_eq!(h.orchestrator.step(), Step::Analyzing);
    assert!(last_text(&h).contains("No ratio data"));
    assert!(h.orchestrator.session().last_ratios.is_none());
    assert_eq!(h.metrics.snapshot().ratio_misses, 1);

    let err = h
        .orchestrator
        .submit_financials(scenario_aggregates())
        .await
        .unwrap_err();
    assert!(matches!(err, DialogueError::WrongStep { actual: Step::Analyzing, .. }));
}

#[tokio::test]
async fn test_ratio_failure_apologises_and_remains_analyzing() {
    let mut h = harness_with(
        FakeDirectory::with("ACME", "00000001", "000001"),
        FakeFilings::with(scenario_entries()),
        FakeRatios::failing(),
        graveyard(),
        FakeAssistant::replying("ok"),
        settings(),
    );
    h.orchestrator.submit_company_name("ACME").await.unwrap();
    h.orchestrator
        .submit_financials(scenario_aggregates())
        .await
        .unwrap();

    assert_eq!(h.orchestrator.step(), Step::Analyzing);
    assert_eq!(last_text(&h), script::RATIOS_UNAVAILABLE);
    assert_eq!(h.metrics.snapshot().upstream_failures, 1);
}

#[tokio::test]
async fn test_dataset_failure_still_delivers_verdict() {
    let mut h = harness_with(
        FakeDirectory::with("ACME", "00000001", "000001"),
        FakeFilings::with(scenario_entries()),
        FakeRatios::with("000001", distressed_ratios()),
        Arc::new(BrokenDataset),
        FakeAssistant::replying("ok"),
        settings(),
    );
    h.orchestrator.submit_company_name("ACME").await.unwrap();
    h.orchestrator
        .submit_financials(scenario_aggregates())
        .await
        .unwrap();

    assert_eq!(h.orchestrator.step(), Step::Complete);
    let Some(Attachment::Analysis(report)) = &h.orchestrator.session().messages.last().unwrap().attachment
    else {
        panic!("expected analysis");
    };
    assert_eq!(report.assessment.level, RiskLevel::Danger);
    assert!(report.matches.is_empty());
    assert_eq!(report.similarity_note.as_deref(), Some(script::DATASET_UNAVAILABLE));
}

// =========================================================================
// free-form and reset
// =========================================================================

#[tokio::test]
async fn test_ask_never_moves_the_step() {
    let mut h = happy_harness();
    h.orchestrator.submit_company_name("ACME").await.unwrap();
    h.orchestrator.ask("what is a current ratio?").await;

    assert_eq!(h.orchestrator.step(), Step::ReviewingFinancials);
    assert_eq!(last_text(&h), "assistant says hi");
}

#[tokio::test]
async fn test_ask_after_analysis_sends_financial_prompt_and_context() {
    let mut h = happy_harness();
    h.orchestrator.submit_company_name("ACME").await.unwrap();
    h.orchestrator
        .submit_financials(scenario_aggregates())
        .await
        .unwrap();
    h.orchestrator.ask("부채비율이 왜 이렇게 높아?").await;

    assert_eq!(h.orchestrator.step(), Step::Complete);
    let turns = h.assistant.last_conversation();
    assert_eq!(turns[0], ChatTurn::system(script::FINANCIAL_PROMPT));
    assert_eq!(turns[1].role, ChatRole::System);
    assert!(turns[1].text.contains("debt ratio 400.00%"));
    assert!(turns[1].text.contains("total assets 1000"));
    assert_eq!(turns.last().unwrap(), &ChatTurn::user("부채비율이 왜 이렇게 높아?"));
}

#[tokio::test]
async fn test_general_question_gets_general_prompt_without_context() {
    let mut h = happy_harness();
    h.orchestrator.ask("hello there").await;

    let turns = h.assistant.last_conversation();
    assert_eq!(turns[0], ChatTurn::system(script::GENERAL_PROMPT));
    // greeting as history, then the question
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[1].role, ChatRole::Assistant);
    assert_eq!(turns[2], ChatTurn::user("hello there"));
}

#[tokio::test]
async fn test_history_is_limited_to_the_window() {
    let mut h = harness_with(
        FakeDirectory::default(),
        FakeFilings::empty(),
        FakeRatios::empty(),
        graveyard(),
        FakeAssistant::replying("reply"),
        DialogueSettings {
            history_window: 3,
            ..settings()
        },
    );
    h.orchestrator.ask("q1").await;
    h.orchestrator.ask("q2").await;
    h.orchestrator.ask("q3").await;

    let roles: Vec<ChatRole> = h
        .assistant
        .last_conversation()
        .iter()
        .map(|t| t.role)
        .collect();
    assert_eq!(
        roles,
        vec![
            ChatRole::System,
            ChatRole::Assistant,
            ChatRole::User,
            ChatRole::Assistant,
            ChatRole::User,
        ]
    );
    let turns = h.assistant.last_conversation();
    assert_eq!(turns[2].text, "q2");
    assert_eq!(turns[4].text, "q3");
}

#[tokio::test]
async fn test_assistant_failure_becomes_apology() {
    let mut h = harness_with(
        FakeDirectory::default(),
        FakeFilings::empty(),
        FakeRatios::empty(),
        graveyard(),
        FakeAssistant::failing(),
        settings(),
    );
    h.orchestrator.ask("anything").await;
    assert_eq!(last_text(&h), script::ASSISTANT_UNAVAILABLE);
    assert_eq!(h.metrics.snapshot().upstream_failures, 1);
    assert_eq!(h.metrics.snapshot().fallback_replies, 0);
}

#[tokio::test]
async fn test_reset_returns_to_a_fresh_session() {
    let mut h = happy_harness();
    h.orchestrator.submit_company_name("ACME").await.unwrap();
    h.orchestrator
        .submit_financials(scenario_aggregates())
        .await
        .unwrap();
    h.orchestrator.reset();

    let session = h.orchestrator.session();
    assert_eq!(session.step, Step::CollectingName);
    assert!(session.identity.is_none());
    assert!(session.aggregates.is_none());
    assert!(session.prior.is_none());
    assert!(session.last_ratios.is_none());
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].text, script::GREETING);
    assert_eq!(h.metrics.snapshot().resets, 1);
}

// =========================================================================
// statement folding
// =========================================================================

#[test]
fn test_aggregate_statements_maps_known_accounts() {
    let (current, prior) = aggregate_statements(&scenario_entries());
    assert_eq!(current, scenario_aggregates());
    let prior = prior.unwrap();
    assert_eq!(prior.total_assets, 800.0);
    assert_eq!(prior.revenue, 400.0);
    assert_eq!(prior.equity, 0.0);
}

#[test]
fn test_aggregate_statements_later_rows_win() {
    let entries = vec![
        StatementEntry::new("매출액", 100 * EOK),
        StatementEntry::new("매출액", 250 * EOK),
    ];
    let (current, prior) = aggregate_statements(&entries);
    assert_eq!(current.revenue, 250.0);
    assert!(prior.is_none());
}

#[test]
fn test_aggregate_statements_ignores_unknown_accounts() {
    let entries = vec![StatementEntry::new("영업권", 5 * EOK).with_prior(4 * EOK)];
    let (current, prior) = aggregate_statements(&entries);
    assert_eq!(current, FinancialAggregates::default());
    assert!(prior.is_none());
}
