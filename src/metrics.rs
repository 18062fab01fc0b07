// ═══════════════════════════════════════════════════════════════
// METRICS - How did the conversation go?
// ═══════════════════════════════════════════════════════════════
//
// Lock-free counters bumped by the orchestrator at every interesting
// moment: a lookup, a miss, a finished analysis, a fallback reply, an
// upstream that let us down. The binary dumps a JSON snapshot when the
// session ends.

use portable_atomic::{AtomicU64, Ordering};
use serde::Serialize;
use std::time::Instant;

/// Serializable view of the counters.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub company_lookups: u64,
    pub directory_misses: u64,
    pub ratio_misses: u64,
    pub analyses_completed: u64,
    pub fallback_replies: u64,
    pub upstream_failures: u64,
    pub resets: u64,
    pub uptime_seconds: u64,
}

/// Counters for one dialogue session.
pub struct DialogueMetrics {
    company_lookups: AtomicU64,
    directory_misses: AtomicU64,
    ratio_misses: AtomicU64,
    analyses_completed: AtomicU64,
    fallback_replies: AtomicU64,
    upstream_failures: AtomicU64,
    resets: AtomicU64,
    started: Instant,
}

impl Default for DialogueMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogueMetrics {
    pub fn new() -> Self {
        Self {
            company_lookups: AtomicU64::new(0),
            directory_misses: AtomicU64::new(0),
            ratio_misses: AtomicU64::new(0),
            analyses_completed: AtomicU64::new(0),
            fallback_replies: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_lookup(&self) {
        self.company_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_directory_miss(&self) {
        self.directory_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ratio_miss(&self) {
        self.ratio_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analysis(&self) {
        self.analyses_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_reply(&self) {
        self.fallback_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            company_lookups: self.company_lookups.load(Ordering::Relaxed),
            directory_misses: self.directory_misses.load(Ordering::Relaxed),
            ratio_misses: self.ratio_misses.load(Ordering::Relaxed),
            analyses_completed: self.analyses_completed.load(Ordering::Relaxed),
            fallback_replies: self.fallback_replies.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}
