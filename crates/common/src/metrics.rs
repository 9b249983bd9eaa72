//! Metrics collection for forum-rs.
//!
//! Counters for the voting engine and the content collaborators, plus
//! database timing. Exported as a snapshot or in Prometheus text format.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Initialize global metrics with custom instance.
pub fn init_metrics(metrics: Arc<Metrics>) -> Result<(), Arc<Metrics>> {
    METRICS.set(metrics)
}

/// Application metrics collector.
#[derive(Debug, Default)]
pub struct Metrics {
    // === Vote Metrics ===
    /// Votes created on a target the voter had not voted on
    pub votes_cast: AtomicU64,
    /// Votes flipped between up and down
    pub votes_changed: AtomicU64,
    /// Votes removed by re-casting the same value
    pub votes_retracted: AtomicU64,
    /// Casts rejected before the ledger was touched
    pub votes_rejected: AtomicU64,
    /// Ledger writes that lost a race and were retried
    pub vote_races: AtomicU64,
    /// Conflicts surfaced to the caller after retries ran out
    pub vote_conflicts: AtomicU64,
    /// Score lookups (single and batched)
    pub score_queries_total: AtomicU64,

    // === Database Metrics ===
    /// Total database queries executed
    pub db_queries_total: AtomicU64,
    /// Database query errors
    pub db_errors_total: AtomicU64,
    /// Total database query time in microseconds
    pub db_query_time_us_total: AtomicU64,

    // === Content Metrics ===
    /// Communities created
    pub communities_created: AtomicU64,
    /// Posts created
    pub posts_created: AtomicU64,
    /// Comments created
    pub comments_created: AtomicU64,
}

/// Which way a vote command resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransitionKind {
    Cast,
    Changed,
    Retracted,
}

impl Metrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            votes_cast: AtomicU64::new(0),
            votes_changed: AtomicU64::new(0),
            votes_retracted: AtomicU64::new(0),
            votes_rejected: AtomicU64::new(0),
            vote_races: AtomicU64::new(0),
            vote_conflicts: AtomicU64::new(0),
            score_queries_total: AtomicU64::new(0),

            db_queries_total: AtomicU64::new(0),
            db_errors_total: AtomicU64::new(0),
            db_query_time_us_total: AtomicU64::new(0),

            communities_created: AtomicU64::new(0),
            posts_created: AtomicU64::new(0),
            comments_created: AtomicU64::new(0),
        }
    }

    /// Record a completed vote transition.
    pub fn record_vote(&self, kind: VoteTransitionKind) {
        let counter = match kind {
            VoteTransitionKind::Cast => &self.votes_cast,
            VoteTransitionKind::Changed => &self.votes_changed,
            VoteTransitionKind::Retracted => &self.votes_retracted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a vote command rejected by validation, identity or target checks.
    pub fn record_vote_rejected(&self) {
        self.votes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lost race that will be retried.
    pub fn record_vote_race(&self) {
        self.vote_races.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a conflict surfaced to the caller.
    pub fn record_vote_conflict(&self) {
        self.vote_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a new community.
    pub fn record_community_created(&self) {
        self.communities_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a new post.
    pub fn record_post_created(&self) {
        self.posts_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a new comment.
    pub fn record_comment_created(&self) {
        self.comments_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a score lookup.
    pub fn record_score_query(&self) {
        self.score_queries_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a database query.
    pub fn record_db_query(&self, duration: Duration, is_error: bool) {
        self.db_queries_total.fetch_add(1, Ordering::Relaxed);
        self.db_query_time_us_total
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if is_error {
            self.db_errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            votes_cast: self.votes_cast.load(Ordering::Relaxed),
            votes_changed: self.votes_changed.load(Ordering::Relaxed),
            votes_retracted: self.votes_retracted.load(Ordering::Relaxed),
            votes_rejected: self.votes_rejected.load(Ordering::Relaxed),
            vote_races: self.vote_races.load(Ordering::Relaxed),
            vote_conflicts: self.vote_conflicts.load(Ordering::Relaxed),
            score_queries_total: self.score_queries_total.load(Ordering::Relaxed),

            db_queries_total: self.db_queries_total.load(Ordering::Relaxed),
            db_errors_total: self.db_errors_total.load(Ordering::Relaxed),
            db_query_avg_time_us: self.average_db_query_time_us(),

            communities_created: self.communities_created.load(Ordering::Relaxed),
            posts_created: self.posts_created.load(Ordering::Relaxed),
            comments_created: self.comments_created.load(Ordering::Relaxed),
        }
    }

    /// Calculate average database query time.
    fn average_db_query_time_us(&self) -> u64 {
        let total = self.db_query_time_us_total.load(Ordering::Relaxed);
        let count = self.db_queries_total.load(Ordering::Relaxed);
        if count > 0 { total / count } else { 0 }
    }

    /// Export metrics in Prometheus format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        output.push_str("# HELP forum_votes_total Vote commands by outcome\n");
        output.push_str("# TYPE forum_votes_total counter\n");
        output.push_str(&format!(
            "forum_votes_total{{outcome=\"cast\"}} {}\n",
            snapshot.votes_cast
        ));
        output.push_str(&format!(
            "forum_votes_total{{outcome=\"changed\"}} {}\n",
            snapshot.votes_changed
        ));
        output.push_str(&format!(
            "forum_votes_total{{outcome=\"retracted\"}} {}\n",
            snapshot.votes_retracted
        ));

        output.push_str("# HELP forum_votes_rejected_total Vote commands rejected before any write\n");
        output.push_str("# TYPE forum_votes_rejected_total counter\n");
        output.push_str(&format!(
            "forum_votes_rejected_total {}\n",
            snapshot.votes_rejected
        ));

        output.push_str("# HELP forum_vote_races_total Vote writes that lost a race and were retried\n");
        output.push_str("# TYPE forum_vote_races_total counter\n");
        output.push_str(&format!("forum_vote_races_total {}\n", snapshot.vote_races));

        output.push_str("# HELP forum_vote_conflicts_total Conflicts surfaced to callers\n");
        output.push_str("# TYPE forum_vote_conflicts_total counter\n");
        output.push_str(&format!(
            "forum_vote_conflicts_total {}\n",
            snapshot.vote_conflicts
        ));

        output.push_str("# HELP forum_score_queries_total Score lookups\n");
        output.push_str("# TYPE forum_score_queries_total counter\n");
        output.push_str(&format!(
            "forum_score_queries_total {}\n",
            snapshot.score_queries_total
        ));

        output.push_str("# HELP forum_db_queries_total Total database queries\n");
        output.push_str("# TYPE forum_db_queries_total counter\n");
        output.push_str(&format!(
            "forum_db_queries_total {}\n",
            snapshot.db_queries_total
        ));

        output.push_str("# HELP forum_db_errors_total Database query errors\n");
        output.push_str("# TYPE forum_db_errors_total counter\n");
        output.push_str(&format!(
            "forum_db_errors_total {}\n",
            snapshot.db_errors_total
        ));

        output.push_str("# HELP forum_db_query_avg_time_us Average database query time in microseconds\n");
        output.push_str("# TYPE forum_db_query_avg_time_us gauge\n");
        output.push_str(&format!(
            "forum_db_query_avg_time_us {}\n",
            snapshot.db_query_avg_time_us
        ));

        output.push_str("# HELP forum_content_created_total Content created by kind\n");
        output.push_str("# TYPE forum_content_created_total counter\n");
        output.push_str(&format!(
            "forum_content_created_total{{kind=\"community\"}} {}\n",
            snapshot.communities_created
        ));
        output.push_str(&format!(
            "forum_content_created_total{{kind=\"post\"}} {}\n",
            snapshot.posts_created
        ));
        output.push_str(&format!(
            "forum_content_created_total{{kind=\"comment\"}} {}\n",
            snapshot.comments_created
        ));

        output
    }
}

/// Point-in-time copy of all metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    // Votes
    pub votes_cast: u64,
    pub votes_changed: u64,
    pub votes_retracted: u64,
    pub votes_rejected: u64,
    pub vote_races: u64,
    pub vote_conflicts: u64,
    pub score_queries_total: u64,

    // Database
    pub db_queries_total: u64,
    pub db_errors_total: u64,
    pub db_query_avg_time_us: u64,

    // Content
    pub communities_created: u64,
    pub posts_created: u64,
    pub comments_created: u64,
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.votes_cast.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.posts_created.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_vote() {
        let metrics = Metrics::new();

        metrics.record_vote(VoteTransitionKind::Cast);
        metrics.record_vote(VoteTransitionKind::Cast);
        metrics.record_vote(VoteTransitionKind::Changed);
        metrics.record_vote(VoteTransitionKind::Retracted);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.votes_cast, 2);
        assert_eq!(snapshot.votes_changed, 1);
        assert_eq!(snapshot.votes_retracted, 1);
    }

    #[test]
    fn test_record_db_query() {
        let metrics = Metrics::new();

        metrics.record_db_query(Duration::from_micros(500), false);
        metrics.record_db_query(Duration::from_micros(1500), true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.db_queries_total, 2);
        assert_eq!(snapshot.db_errors_total, 1);
        assert_eq!(snapshot.db_query_avg_time_us, 1000);
    }

    #[test]
    fn test_average_without_queries() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().db_query_avg_time_us, 0);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.record_vote(VoteTransitionKind::Retracted);
        metrics.record_vote_race();

        let output = metrics.to_prometheus();
        assert!(output.contains("forum_votes_total{outcome=\"retracted\"} 1"));
        assert!(output.contains("forum_vote_races_total 1"));
        assert!(output.contains("# TYPE forum_db_queries_total counter"));
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start();
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() >= Duration::from_millis(2));
    }
}
