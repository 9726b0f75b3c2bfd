// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collection for connection and identity handling.
//!
//! Lightweight in-process counters and latency histograms. Suitable for a
//! library embedded in a tool server where a full observability stack is
//! the host's business.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Events counted by the connection subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// A session was constructed and verified.
    SessionCreated,
    /// A cached session was returned.
    CacheHit,
    /// Session construction or verification failed.
    SessionFailed,
    /// A 401 challenge was answered with a fresh token.
    ChallengeAnswered,
    /// The retry after a challenge was rejected again.
    ChallengeRejected,
    /// An identity was matched by the identity service.
    IdentityResolved,
    /// An identity fell through to a synthesized placeholder.
    IdentitySynthesized,
}

impl Counter {
    const ALL: [Counter; 7] = [
        Counter::SessionCreated,
        Counter::CacheHit,
        Counter::SessionFailed,
        Counter::ChallengeAnswered,
        Counter::ChallengeRejected,
        Counter::IdentityResolved,
        Counter::IdentitySynthesized,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Metric name.
    pub fn name(self) -> &'static str {
        match self {
            Counter::SessionCreated => "session.created",
            Counter::CacheHit => "session.cache_hit",
            Counter::SessionFailed => "session.failed",
            Counter::ChallengeAnswered => "auth.challenge_answered",
            Counter::ChallengeRejected => "auth.challenge_rejected",
            Counter::IdentityResolved => "identity.resolved",
            Counter::IdentitySynthesized => "identity.synthesized",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Event counters indexed by [`Counter`].
    counters: [AtomicU64; 7],

    /// Latency by operation name.
    operations: RwLock<HashMap<String, OperationMetrics>>,

    /// Start time for calculating uptime.
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            counters: Default::default(),
            operations: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Increment a counter.
    pub fn increment(&self, counter: Counter) {
        self.counters[counter.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Current value of a counter.
    pub fn count(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Record an operation duration.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        if let Ok(mut ops) = self.operations.write() {
            ops.entry(name.to_string())
                .or_insert_with(OperationMetrics::new)
                .record(duration);
        }
    }

    /// Get metrics for a specific operation.
    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations.read().ok()?.get(name).cloned()
    }

    /// Get uptime since metrics were initialized.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = Counter::ALL
            .iter()
            .map(|c| (c.name(), self.count(*c)))
            .collect();
        let operations = self
            .operations
            .read()
            .map(|ops| ops.clone())
            .unwrap_or_default();

        MetricsSnapshot {
            counters,
            operations,
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut ops) = self.operations.write() {
            ops.clear();
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Operation metrics with histogram.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    /// Number of operations.
    pub count: u64,

    /// Total duration.
    pub total_duration: Duration,

    /// Maximum duration.
    pub max_duration: Duration,

    /// Histogram buckets for latency distribution.
    pub histogram: Histogram,
}

impl OperationMetrics {
    /// Create new operation metrics.
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    /// Record an operation.
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    /// Calculate average duration.
    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bounds in milliseconds; one extra overflow bucket follows.
    bounds_ms: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom upper bounds (in milliseconds).
    pub fn with_bounds(bounds_ms: Vec<u64>) -> Self {
        let counts = vec![0; bounds_ms.len() + 1];
        Self { bounds_ms, counts }
    }

    /// Record a duration value.
    pub fn record(&mut self, duration: Duration) {
        let millis = duration.as_millis() as u64;
        let idx = self
            .bounds_ms
            .iter()
            .position(|&b| millis <= b)
            .unwrap_or(self.bounds_ms.len());
        self.counts[idx] += 1;
    }

    /// Get counts for each bucket.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Approximate percentile, reported as the bucket's upper bound.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let millis = self
                    .bounds_ms
                    .get(i)
                    .copied()
                    .unwrap_or_else(|| self.bounds_ms.last().copied().unwrap_or(0) * 10);
                return Duration::from_millis(millis);
            }
        }
        Duration::ZERO
    }

    /// Get p50 (median) latency.
    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    /// Get p99 latency.
    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // Network round trips: 10ms .. 30s
        Self::with_bounds(vec![10, 50, 100, 250, 500, 1_000, 5_000, 30_000])
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Counter values by metric name.
    pub counters: HashMap<&'static str, u64>,

    /// Operation metrics by name.
    pub operations: HashMap<String, OperationMetrics>,

    /// Uptime when snapshot was taken.
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Connection Metrics ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n\n", self.uptime));

        let mut counters: Vec<_> = self.counters.iter().collect();
        counters.sort();
        for (name, value) in counters {
            report.push_str(&format!("  {}: {}\n", name, value));
        }

        if !self.operations.is_empty() {
            report.push_str("\nOperations:\n");
            for (name, metrics) in &self.operations {
                report.push_str(&format!(
                    "  {}: {} ops, avg {:.2?}, p99 {:.2?}\n",
                    name,
                    metrics.count,
                    metrics.avg_duration(),
                    metrics.histogram.p99()
                ));
            }
        }

        report
    }
}

/// Increment a counter on the global metrics.
pub fn increment(counter: Counter) {
    #[cfg(feature = "telemetry")]
    GLOBAL_METRICS.increment(counter);
    #[cfg(not(feature = "telemetry"))]
    let _ = counter;
}

/// Record an operation duration on the global metrics.
pub fn record_operation(name: &str, duration: Duration) {
    #[cfg(feature = "telemetry")]
    GLOBAL_METRICS.record_operation(name, duration);
    #[cfg(not(feature = "telemetry"))]
    let _ = (name, duration);
}
