//! Prometheus metrics for sync sessions
//!
//! Provides typed, labeled counters and gauges for everything observable in
//! a session: events flowing through the middleware chain, connector calls,
//! retries, halts, splits and conflicts.

use std::time::Duration;

use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Metrics registry for one session.
///
/// Cheap to clone; clones share the same underlying metrics.
#[derive(Clone)]
pub struct SessionMetrics {
    registry: Registry,
    /// Counter: events that reached the end of the chain, by event name
    pub events_total: IntCounterVec,
    /// Counter: connector calls by (kind, status)
    pub connector_calls_total: IntCounterVec,
    /// Counter: retries scheduled by work kind
    pub retries_total: IntCounterVec,
    /// Counter: halts
    pub halts_total: IntCounter,
    /// Counter: modify operations split into chunks or halves
    pub splits_total: IntCounter,
    /// Counter: conflict batches by outcome (resolved, unresolved)
    pub conflicts_total: IntCounterVec,
    /// Gauge: current throttle duration in seconds
    pub throttle_seconds: Gauge,
}

impl std::fmt::Debug for SessionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMetrics").finish_non_exhaustive()
    }
}

impl SessionMetrics {
    /// Creates a new `SessionMetrics` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("cloudsync".to_string()), None)?;

        let events_total = IntCounterVec::new(
            Opts::new("events_total", "Events processed by the session"),
            &["event"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let connector_calls_total = IntCounterVec::new(
            Opts::new("connector_calls_total", "Remote connector calls"),
            &["kind", "status"],
        )?;
        registry.register(Box::new(connector_calls_total.clone()))?;

        let retries_total = IntCounterVec::new(
            Opts::new("retries_total", "Retries scheduled for failed work"),
            &["kind"],
        )?;
        registry.register(Box::new(retries_total.clone()))?;

        let halts_total = IntCounter::new("halts_total", "Times the session halted")?;
        registry.register(Box::new(halts_total.clone()))?;

        let splits_total = IntCounter::new("splits_total", "Modify operations split")?;
        registry.register(Box::new(splits_total.clone()))?;

        let conflicts_total = IntCounterVec::new(
            Opts::new("conflicts_total", "Conflict batches by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let throttle_seconds = Gauge::new(
            "throttle_seconds",
            "Current delay between connector calls in seconds",
        )?;
        registry.register(Box::new(throttle_seconds.clone()))?;

        Ok(Self {
            registry,
            events_total,
            connector_calls_total,
            retries_total,
            halts_total,
            splits_total,
            conflicts_total,
            throttle_seconds,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record an event by its short name.
    pub fn record_event(&self, event: &str) {
        self.events_total.with_label_values(&[event]).inc();
    }

    /// Record a connector call outcome.
    pub fn record_connector_call(&self, kind: &str, status: &str) {
        self.connector_calls_total
            .with_label_values(&[kind, status])
            .inc();
    }

    /// Record a scheduled retry.
    pub fn record_retry(&self, kind: &str) {
        self.retries_total.with_label_values(&[kind]).inc();
    }

    pub fn record_halt(&self) {
        self.halts_total.inc();
    }

    pub fn record_split(&self) {
        self.splits_total.inc();
    }

    /// Record a conflict batch outcome.
    pub fn record_conflict(&self, outcome: &str) {
        self.conflicts_total.with_label_values(&[outcome]).inc();
    }

    /// Set the throttle gauge.
    pub fn set_throttle(&self, duration: Duration) {
        self.throttle_seconds.set(duration.as_secs_f64());
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Returns the underlying registry, e.g. to serve it over HTTP.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
