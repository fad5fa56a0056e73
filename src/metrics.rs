//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the ledger:
//!
//! - `ledger_stakes_total` - Stakes applied
//! - `ledger_unstakes_total` - Unstakes applied
//! - `ledger_transactions_total` - Ledger entries appended
//! - `ledger_rewards_total` - Monetary reward grants
//! - `ledger_xp_grants_total` - XP grants applied
//! - `ledger_achievements_total` - Achievement links created
//! - `ledger_conflict_retries_total` - Mutations retried after a conflict
//! - `ledger_mutation_duration_seconds` - Mutation latency histogram
//!
//! Every collector registers against an owned registry so that multiple
//! ledger instances can coexist in one process.

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Stakes applied
    pub stakes_total: IntCounter,

    /// Unstakes applied
    pub unstakes_total: IntCounter,

    /// Ledger entries appended
    pub transactions_total: IntCounter,

    /// Monetary reward grants
    pub rewards_total: IntCounter,

    /// XP grants applied
    pub xp_grants_total: IntCounter,

    /// Achievement links created
    pub achievements_total: IntCounter,

    /// Mutations retried after a conflict
    pub conflict_retries_total: IntCounter,

    /// Mutation latency histogram
    pub mutation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let stakes_total =
            IntCounter::with_opts(Opts::new("ledger_stakes_total", "Stakes applied"))?;
        registry.register(Box::new(stakes_total.clone()))?;

        let unstakes_total =
            IntCounter::with_opts(Opts::new("ledger_unstakes_total", "Unstakes applied"))?;
        registry.register(Box::new(unstakes_total.clone()))?;

        let transactions_total = IntCounter::with_opts(Opts::new(
            "ledger_transactions_total",
            "Ledger entries appended",
        ))?;
        registry.register(Box::new(transactions_total.clone()))?;

        let rewards_total =
            IntCounter::with_opts(Opts::new("ledger_rewards_total", "Monetary reward grants"))?;
        registry.register(Box::new(rewards_total.clone()))?;

        let xp_grants_total =
            IntCounter::with_opts(Opts::new("ledger_xp_grants_total", "XP grants applied"))?;
        registry.register(Box::new(xp_grants_total.clone()))?;

        let achievements_total = IntCounter::with_opts(Opts::new(
            "ledger_achievements_total",
            "Achievement links created",
        ))?;
        registry.register(Box::new(achievements_total.clone()))?;

        let conflict_retries_total = IntCounter::with_opts(Opts::new(
            "ledger_conflict_retries_total",
            "Mutations retried after a conflict",
        ))?;
        registry.register(Box::new(conflict_retries_total.clone()))?;

        let mutation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_mutation_duration_seconds",
                "Mutation latency histogram",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(mutation_duration.clone()))?;

        Ok(Self {
            stakes_total,
            unstakes_total,
            transactions_total,
            rewards_total,
            xp_grants_total,
            achievements_total,
            conflict_retries_total,
            mutation_duration,
            registry,
        })
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("stakes_total", &self.stakes_total.get())
            .field("transactions_total", &self.transactions_total.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.stakes_total.get(), 0);
        assert_eq!(metrics.transactions_total.get(), 0);
    }

    #[test]
    fn test_multiple_instances_coexist() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.stakes_total.inc();
        assert_eq!(first.stakes_total.get(), 1);
        assert_eq!(second.stakes_total.get(), 0);
    }

    #[test]
    fn test_counters_increment() {
        let metrics = Metrics::new().unwrap();
        metrics.stakes_total.inc();
        metrics.conflict_retries_total.inc();
        metrics.conflict_retries_total.inc();
        assert_eq!(metrics.stakes_total.get(), 1);
        assert_eq!(metrics.conflict_retries_total.get(), 2);
    }
}
