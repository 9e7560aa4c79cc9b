//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the chain service:
//!
//! - `chain_requests_total` - Total requests handled
//! - `chain_unauthorized_total` - Requests rejected by the authorization checks
//! - `chain_blocks_total` - Blocks appended
//! - `chain_request_duration_seconds` - Histogram of request latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total requests handled
    pub requests_total: IntCounter,

    /// Requests rejected by identity binding or signature checks
    pub unauthorized_total: IntCounter,

    /// Blocks appended
    pub blocks_total: IntCounter,

    /// Request latency histogram
    pub request_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a new metrics collector with its own registry. Each instance
    /// registers into a private registry, so two instances never collide.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests_total = IntCounter::new("chain_requests_total", "Total requests handled")?;
        registry.register(Box::new(requests_total.clone()))?;

        let unauthorized_total = IntCounter::new(
            "chain_unauthorized_total",
            "Requests rejected by the authorization checks",
        )?;
        registry.register(Box::new(unauthorized_total.clone()))?;

        let blocks_total = IntCounter::new("chain_blocks_total", "Blocks appended")?;
        registry.register(Box::new(blocks_total.clone()))?;

        let request_duration = Histogram::with_opts(
            HistogramOpts::new("chain_request_duration_seconds", "Histogram of request latencies")
                .buckets(vec![0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            requests_total,
            unauthorized_total,
            blocks_total,
            request_duration,
            registry,
        })
    }

    /// Record a handled request
    pub fn record_request(&self) {
        self.requests_total.inc();
    }

    /// Record an authorization rejection
    pub fn record_unauthorized(&self) {
        self.unauthorized_total.inc();
    }

    /// Record an appended block
    pub fn record_block(&self) {
        self.blocks_total.inc();
    }

    /// Record a request latency
    pub fn observe_request_duration(&self, duration_seconds: f64) {
        self.request_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
