// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured logging initialization and a lightweight in-process metrics
//! collector for the agent coordination hub.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Output format for the `tracing-subscriber` formatter, driven by
/// `HUB_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable formatter.
    Pretty,
    /// Newline-delimited JSON formatter.
    Json,
}

impl LogFormat {
    /// Parse from an environment value; unrecognized values fall back to
    /// [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initialize the global `tracing` subscriber.
///
/// `level` is an [`EnvFilter`] directive string (e.g. `"info"`,
/// `"hub_store=debug,info"`). Call once, at process startup; a second call
/// is a no-op (the error from `tracing`'s global-default guard is ignored).
pub fn init_tracing(format: LogFormat, level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let result = match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}

/// Point-in-time snapshot of [`HubMetrics`]' counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total `poll_and_claim` invocations.
    pub polls: u64,
    /// Total successful claims (via `poll_and_claim` or `claim_task`).
    pub claims: u64,
    /// Total claim renewals.
    pub renewals: u64,
    /// Total expired leases reclaimed during a poll or claim attempt.
    pub reclaimed_leases: u64,
    /// Total done-gate evaluation failures.
    pub done_gate_failures: u64,
    /// Total idempotency-gate cache hits (replayed results).
    pub idempotency_hits: u64,
}

/// Thread-safe counters for hub operations, exposed for diagnostics.
///
/// Each counter is an independent [`AtomicU64`]; there is no cross-counter
/// consistency guarantee beyond what a snapshot read observes at one instant.
#[derive(Debug, Default)]
pub struct HubMetrics {
    polls: AtomicU64,
    claims: AtomicU64,
    renewals: AtomicU64,
    reclaimed_leases: AtomicU64,
    done_gate_failures: AtomicU64,
    idempotency_hits: AtomicU64,
}

impl HubMetrics {
    /// Create a new, zeroed collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `poll_and_claim` invocation.
    pub fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one successful claim.
    pub fn record_claim(&self) {
        self.claims.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one claim renewal.
    pub fn record_renewal(&self) {
        self.renewals.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` expired leases reclaimed.
    pub fn record_reclaimed_leases(&self, count: u64) {
        self.reclaimed_leases.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one done-gate evaluation failure.
    pub fn record_done_gate_failure(&self) {
        self.done_gate_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one idempotency-gate cache hit.
    pub fn record_idempotency_hit(&self) {
        self.idempotency_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            claims: self.claims.load(Ordering::Relaxed),
            renewals: self.renewals.load(Ordering::Relaxed),
            reclaimed_leases: self.reclaimed_leases.load(Ordering::Relaxed),
            done_gate_failures: self.done_gate_failures.load(Ordering::Relaxed),
            idempotency_hits: self.idempotency_hits.load(Ordering::Relaxed),
        }
    }
}
