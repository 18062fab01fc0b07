// =============================================================================
// topic.rs - IS THIS QUESTION ABOUT MONEY?
// =============================================================================
//
// Before a free-form question goes to the assistant we decide which hat the
// assistant should wear: financial analyst, or general helper. The decision
// is a single Aho-Corasick pass over the question looking for financial
// vocabulary in Korean and English, plus the big conglomerate names users
// tend to ask about.
//
// Two automatons, because the brand tokens are short enough that matching
// them case-insensitively would fire on "ask" and "plgrim". Brands must
// match exactly; everything else ignores ASCII case.
// =============================================================================

use aho_corasick::AhoCorasick;
use std::sync::LazyLock;
use tracing::debug;

/// Financial vocabulary, matched ignoring ASCII case.
static FINANCE_TERMS: &[&str] = &[
    // Korean
    "재무",
    "재무제표",
    "손익계산서",
    "재무상태표",
    "현금흐름표",
    "매출",
    "이익",
    "부채",
    "자산",
    "자본",
    "비율",
    "분석",
    "기업",
    "주식",
    "투자",
    "상장폐지",
    // English
    "financial",
    "finance",
    "balance sheet",
    "income statement",
    "cash flow",
    "revenue",
    "profit",
    "earnings",
    "debt",
    "liabilit",
    "asset",
    "equity",
    "ratio",
    "return on assets",
    "return on equity",
    "liquidity",
    "solvency",
    "delist",
    "bankrupt",
    "stock",
    "invest",
];

/// Group names, matched exactly.
static BRAND_TERMS: &[&str] = &["삼성", "현대", "LG", "SK"];

static FINANCE_AUTOMATON: LazyLock<Option<AhoCorasick>> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(FINANCE_TERMS)
        .ok()
});

static BRAND_AUTOMATON: LazyLock<Option<AhoCorasick>> =
    LazyLock::new(|| AhoCorasick::new(BRAND_TERMS).ok());

/// Which system prompt a free-form question should be answered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Financial,
    General,
}

/// Every financial term found in `question`, in order of appearance.
pub fn matched_terms(question: &str) -> Vec<&'static str> {
    let mut hits: Vec<(usize, &'static str)> = Vec::new();
    if let Some(automaton) = FINANCE_AUTOMATON.as_ref() {
        hits.extend(
            automaton
                .find_iter(question)
                .map(|m| (m.start(), FINANCE_TERMS[m.pattern().as_usize()])),
        );
    }
    if let Some(automaton) = BRAND_AUTOMATON.as_ref() {
        hits.extend(
            automaton
                .find_iter(question)
                .map(|m| (m.start(), BRAND_TERMS[m.pattern().as_usize()])),
        );
    }
    hits.sort_by_key(|(start, _)| *start);
    hits.into_iter().map(|(_, term)| term).collect()
}

/// Classifies a free-form question.
pub fn classify(question: &str) -> Topic {
    let terms = matched_terms(question);
    if terms.is_empty() {
        Topic::General
    } else {
        debug!(terms = ?terms, "Question reads as financial");
        Topic::Financial
    }
}
