// ═══════════════════════════════════════════════════════════════
// METRICS COLLECTOR - How many rivals did we roast today?
// ═══════════════════════════════════════════════════════════════
//
// Atomic counters for every fork in the analysis pipeline. No locks,
// just Relaxed increments, since nobody needs these to be linearizable.
// A snapshot is served as JSON from GET /metrics.
//
// The interesting ratios:
// - scrape_failures / analyses_requested: how often Firecrawl gives up
// - (ai_unavailable + ai_errors + parse_fallbacks) / analyses_completed:
//   how much of what we return is a placeholder rather than an insight

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use serde::Serialize;

/// The metrics snapshot - what gets serialized to JSON
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub analyses_requested: u64,
    pub analyses_completed: u64,
    pub rejected_models: u64,
    pub scrape_failures: u64,
    pub ai_unavailable: u64,
    pub ai_errors: u64,
    pub parse_fallbacks: u64,
    pub insights_persisted: u64,
    pub persistence_failures: u64,
    pub uptime_seconds: u64,
    pub analyses_per_minute: f64,
    pub status: String,
}

/// Thread-safe atomic metrics collector, shared by every actix worker.
pub struct MetricsCollector {
    analyses_requested: AtomicU64,
    analyses_completed: AtomicU64,
    rejected_models: AtomicU64,
    scrape_failures: AtomicU64,
    ai_unavailable: AtomicU64,
    ai_errors: AtomicU64,
    parse_fallbacks: AtomicU64,
    insights_persisted: AtomicU64,
    persistence_failures: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            analyses_requested: AtomicU64::new(0),
            analyses_completed: AtomicU64::new(0),
            rejected_models: AtomicU64::new(0),
            scrape_failures: AtomicU64::new(0),
            ai_unavailable: AtomicU64::new(0),
            ai_errors: AtomicU64::new(0),
            parse_fallbacks: AtomicU64::new(0),
            insights_persisted: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_requested(&self) {
        self.analyses_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.analyses_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected_models(&self) {
        self.rejected_models.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scrape_failures(&self) {
        self.scrape_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ai_unavailable(&self) {
        self.ai_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ai_errors(&self) {
        self.ai_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_parse_fallbacks(&self) {
        self.parse_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_insights_persisted(&self, count: u64) {
        self.insights_persisted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_persistence_failures(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all metrics (lock-free reads)
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        let completed = self.analyses_completed.load(Ordering::Relaxed);
        let analyses_per_minute = if uptime > 0 {
            (completed as f64 / uptime as f64) * 60.0
        } else {
            0.0
        };

        MetricsSnapshot {
            analyses_requested: self.analyses_requested.load(Ordering::Relaxed),
            analyses_completed: completed,
            rejected_models: self.rejected_models.load(Ordering::Relaxed),
            scrape_failures: self.scrape_failures.load(Ordering::Relaxed),
            ai_unavailable: self.ai_unavailable.load(Ordering::Relaxed),
            ai_errors: self.ai_errors.load(Ordering::Relaxed),
            parse_fallbacks: self.parse_fallbacks.load(Ordering::Relaxed),
            insights_persisted: self.insights_persisted.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            uptime_seconds: uptime,
            analyses_per_minute,
            status: "operational".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let snap = MetricsCollector::new().snapshot();
        assert_eq!(snap.analyses_requested, 0);
        assert_eq!(snap.insights_persisted, 0);
        assert_eq!(snap.analyses_per_minute, 0.0);
    }

    #[test]
    fn test_increments_show_up_in_snapshot() {
        let metrics = MetricsCollector::new();
        metrics.increment_requested();
        metrics.increment_requested();
        metrics.increment_scrape_failures();
        metrics.add_insights_persisted(12);

        let snap = metrics.snapshot();
        assert_eq!(snap.analyses_requested, 2);
        assert_eq!(snap.scrape_failures, 1);
        assert_eq!(snap.insights_persisted, 12);
        assert_eq!(snap.status, "operational");
    }
}
