use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Opts, Registry};
use std::sync::Arc;

/// Prometheus metrics for join field data loading and global ordinal builds
#[derive(Clone)]
pub struct JoinIndexMetrics {
    // Counters
    pub global_builds: Counter,
    pub global_build_failures: Counter,
    pub cache_hits: Counter,
    pub leaf_loads: Counter,

    // Gauges
    pub global_ordinals: Gauge,

    // Histograms
    pub build_latency: Histogram,

    registry: Arc<Registry>,
}

impl JoinIndexMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let global_builds = Counter::with_opts(Opts::new(
            "joinindex_global_builds_total",
            "Total number of completed global ordinal builds",
        ))?;
        registry.register(Box::new(global_builds.clone()))?;

        let global_build_failures = Counter::with_opts(Opts::new(
            "joinindex_global_build_failures_total",
            "Total number of failed global ordinal builds",
        ))?;
        registry.register(Box::new(global_build_failures.clone()))?;

        let cache_hits = Counter::with_opts(Opts::new(
            "joinindex_global_cache_hits_total",
            "Requests served from an already built global structure",
        ))?;
        registry.register(Box::new(cache_hits.clone()))?;

        let leaf_loads = Counter::with_opts(Opts::new(
            "joinindex_leaf_loads_total",
            "Total number of per-segment join field data loads",
        ))?;
        registry.register(Box::new(leaf_loads.clone()))?;

        let global_ordinals = Gauge::with_opts(Opts::new(
            "joinindex_global_ordinals",
            "Distinct join keys across all types in the current snapshot",
        ))?;
        registry.register(Box::new(global_ordinals.clone()))?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new(
                "joinindex_global_build_seconds",
                "Global ordinal build latency",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(build_latency.clone()))?;

        Ok(Self {
            global_builds,
            global_build_failures,
            cache_hits,
            leaf_loads,
            global_ordinals,
            build_latency,
            registry: Arc::new(registry),
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record a successful global build
    pub fn record_build(&self, duration_secs: f64, total_ordinals: usize) {
        self.global_builds.inc();
        self.build_latency.observe(duration_secs);
        self.global_ordinals.set(total_ordinals as f64);
    }

    pub fn record_build_failure(&self) {
        self.global_build_failures.inc();
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    pub fn record_leaf_load(&self) {
        self.leaf_loads.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_build() {
        let metrics = JoinIndexMetrics::new().unwrap();
        metrics.record_build(0.002, 12);
        metrics.record_build_failure();
        metrics.record_cache_hit();
        metrics.record_cache_hit();

        assert_eq!(metrics.global_builds.get(), 1.0);
        assert_eq!(metrics.global_build_failures.get(), 1.0);
        assert_eq!(metrics.cache_hits.get(), 2.0);
        assert_eq!(metrics.global_ordinals.get(), 12.0);
        assert_eq!(metrics.build_latency.get_sample_count(), 1);
        assert!(!metrics.registry().gather().is_empty());
    }
}
