//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the custody ledger.
//! Each ledger owns its own registry.
//!
//! # Metrics
//!
//! - `custody_trusts_created_total` - Trusts created
//! - `custody_split_trusts_created_total` - Split trusts created
//! - `custody_milestone_releases_total` - Milestone verifications committed
//! - `custody_value_released_total` - Value released to recipients
//! - `custody_value_refunded_total` - Value refunded to grantors
//! - `custody_calls_rejected_total{kind}` - Rejected calls by error kind

use prometheus::{Counter, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Trusts created
    pub trusts_created: IntCounter,

    /// Split trusts created
    pub splits_created: IntCounter,

    /// Milestone releases
    pub releases: IntCounter,

    /// Value released
    pub value_released: Counter,

    /// Value refunded
    pub value_refunded: Counter,

    /// Rejected calls by error kind
    pub rejections: IntCounterVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let trusts_created =
            IntCounter::new("custody_trusts_created_total", "Trusts created")?;
        registry.register(Box::new(trusts_created.clone()))?;

        let splits_created =
            IntCounter::new("custody_split_trusts_created_total", "Split trusts created")?;
        registry.register(Box::new(splits_created.clone()))?;

        let releases = IntCounter::new(
            "custody_milestone_releases_total",
            "Milestone verifications committed",
        )?;
        registry.register(Box::new(releases.clone()))?;

        let value_released =
            Counter::new("custody_value_released_total", "Value released to recipients")?;
        registry.register(Box::new(value_released.clone()))?;

        let value_refunded =
            Counter::new("custody_value_refunded_total", "Value refunded to grantors")?;
        registry.register(Box::new(value_refunded.clone()))?;

        let rejections = IntCounterVec::new(
            Opts::new("custody_calls_rejected_total", "Rejected calls by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(rejections.clone()))?;

        Ok(Self {
            trusts_created,
            splits_created,
            releases,
            value_released,
            value_refunded,
            rejections,
            registry,
        })
    }

    /// Record trust creation
    pub fn record_trust_created(&self) {
        self.trusts_created.inc();
    }

    /// Record split-trust creation
    pub fn record_split_created(&self) {
        self.splits_created.inc();
    }

    /// Record a milestone release
    pub fn record_release(&self, amount: u128) {
        self.releases.inc();
        self.value_released.inc_by(amount as f64);
    }

    /// Record a refund
    pub fn record_refund(&self, amount: u128) {
        self.value_refunded.inc_by(amount as f64);
    }

    /// Record a rejected call
    pub fn record_rejection(&self, kind: &str) {
        self.rejections.with_label_values(&[kind]).inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
