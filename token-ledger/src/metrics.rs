//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_grants_total` - Grants applied
//! - `ledger_debits_total` - Debits applied
//! - `ledger_tokens_issued_total` - Tokens credited
//! - `ledger_tokens_consumed_total` - Tokens debited
//! - `ledger_reconciliations_total` - Wallet reconciliations run
//! - `ledger_apply_duration_seconds` - Mutation commit latency
//! - `ledger_outstanding_balance` - Sum of wallet display balances

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Grants applied
    pub grants_total: IntCounter,

    /// Debits applied
    pub debits_total: IntCounter,

    /// Tokens credited across all grants
    pub tokens_issued_total: IntCounter,

    /// Tokens debited across all debits
    pub tokens_consumed_total: IntCounter,

    /// Wallet reconciliations run
    pub reconciliations_total: IntCounter,

    /// Mutation commit latency
    pub apply_duration: Histogram,

    /// Sum of wallet display balances
    pub outstanding_balance: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let grants_total =
            IntCounter::with_opts(Opts::new("ledger_grants_total", "Grants applied"))?;
        registry.register(Box::new(grants_total.clone()))?;

        let debits_total =
            IntCounter::with_opts(Opts::new("ledger_debits_total", "Debits applied"))?;
        registry.register(Box::new(debits_total.clone()))?;

        let tokens_issued_total = IntCounter::with_opts(Opts::new(
            "ledger_tokens_issued_total",
            "Tokens credited across all grants",
        ))?;
        registry.register(Box::new(tokens_issued_total.clone()))?;

        let tokens_consumed_total = IntCounter::with_opts(Opts::new(
            "ledger_tokens_consumed_total",
            "Tokens debited across all debits",
        ))?;
        registry.register(Box::new(tokens_consumed_total.clone()))?;

        let reconciliations_total = IntCounter::with_opts(Opts::new(
            "ledger_reconciliations_total",
            "Wallet reconciliations run",
        ))?;
        registry.register(Box::new(reconciliations_total.clone()))?;

        let apply_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_apply_duration_seconds",
                "Mutation commit latency",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(apply_duration.clone()))?;

        let outstanding_balance = IntGauge::with_opts(Opts::new(
            "ledger_outstanding_balance",
            "Sum of wallet display balances",
        ))?;
        registry.register(Box::new(outstanding_balance.clone()))?;

        Ok(Self {
            grants_total,
            debits_total,
            tokens_issued_total,
            tokens_consumed_total,
            reconciliations_total,
            apply_duration,
            outstanding_balance,
            registry,
        })
    }

    /// Record an applied grant
    pub fn record_grant(&self, amount: i64) {
        self.grants_total.inc();
        self.tokens_issued_total.inc_by(amount as u64);
    }

    /// Record an applied debit (amount is the debited magnitude)
    pub fn record_debit(&self, amount: i64) {
        self.debits_total.inc();
        self.tokens_consumed_total.inc_by(amount as u64);
    }

    /// Record a reconciliation run
    pub fn record_reconciliation(&self) {
        self.reconciliations_total.inc();
    }

    /// Record mutation commit latency
    pub fn record_apply_duration(&self, duration_seconds: f64) {
        self.apply_duration.observe(duration_seconds);
    }

    /// Shift the outstanding-balance gauge by a wallet's balance delta
    pub fn shift_outstanding(&self, delta: i64) {
        self.outstanding_balance.add(delta);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.grants_total.get(), 0);
        assert_eq!(metrics.debits_total.get(), 0);
    }

    #[test]
    fn test_record_grant_and_debit() {
        let metrics = Metrics::new().unwrap();

        metrics.record_grant(100);
        metrics.record_grant(50);
        assert_eq!(metrics.grants_total.get(), 2);
        assert_eq!(metrics.tokens_issued_total.get(), 150);

        metrics.record_debit(30);
        assert_eq!(metrics.debits_total.get(), 1);
        assert_eq!(metrics.tokens_consumed_total.get(), 30);
    }

    #[test]
    fn test_shift_outstanding() {
        let metrics = Metrics::new().unwrap();
        metrics.shift_outstanding(100);
        metrics.shift_outstanding(-40);
        assert_eq!(metrics.outstanding_balance.get(), 60);
    }
}
