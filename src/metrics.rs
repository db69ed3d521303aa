//! Lifetime counters and export for connector pools

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot for a pool
///
/// # Examples
///
/// ```
/// use connector_pool::{FnFactory, ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(FnFactory::new(|| Ok(1)), PoolConfiguration::default()).unwrap();
///
/// {
///     let _entry = pool.borrow().unwrap();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.total_borrowed, 1);
///     assert_eq!(metrics.total_created, 1);
///     assert_eq!(metrics.active_objects, 1);
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolMetrics {
    /// Resources created by the factory
    pub total_created: u64,

    /// Resources handed to the factory for disposal
    pub total_disposed: u64,

    /// Successful borrows
    pub total_borrowed: u64,

    /// Returns that put the entry back into the idle set
    pub total_returned: u64,

    /// Idle entries disposed by an eviction sweep
    pub total_evicted: u64,

    /// Failed health checks
    pub health_check_failures: u64,

    /// Borrows that gave up because the pool stayed at capacity
    pub exhausted_events: u64,

    /// Current active entries
    pub active_objects: usize,

    /// Current idle entries
    pub idle_objects: usize,

    /// Configured ceiling on idle + active
    pub max_objects: usize,

    /// Active share of `max_objects` (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_disposed".to_string(), self.total_disposed.to_string());
        metrics.insert("total_borrowed".to_string(), self.total_borrowed.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_evicted".to_string(), self.total_evicted.to_string());
        metrics.insert("health_check_failures".to_string(), self.health_check_failures.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("active_objects".to_string(), self.active_objects.to_string());
        metrics.insert("idle_objects".to_string(), self.idle_objects.to_string());
        metrics.insert("max_objects".to_string(), self.max_objects.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use connector_pool::{FnFactory, ObjectPool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = ObjectPool::new(FnFactory::new(|| Ok(1)), PoolConfiguration::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("connector".to_string(), "ldap".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("ldap_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("connector_pool_objects_active"));
    /// assert!(output.contains("connector=\"ldap\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let labels = Self::const_labels(pool_name, tags);
        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace("connector_pool")
                .const_labels(labels.clone())
        };
        let registry = Registry::new();

        let gauges = [
            ("objects_active", "Current active objects", metrics.active_objects),
            ("objects_idle", "Current idle objects", metrics.idle_objects),
            ("objects_max", "Configured maximum objects", metrics.max_objects),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help))?;
            gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
            registry.register(Box::new(gauge))?;
        }

        let utilization = Gauge::with_opts(opts("utilization", "Pool utilization ratio"))?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization))?;

        let counters = [
            ("objects_created_total", "Total objects created", metrics.total_created),
            ("objects_disposed_total", "Total objects disposed", metrics.total_disposed),
            ("objects_borrowed_total", "Total objects borrowed", metrics.total_borrowed),
            ("objects_returned_total", "Total objects returned to idle", metrics.total_returned),
            ("objects_evicted_total", "Total idle objects evicted", metrics.total_evicted),
            ("health_check_failures_total", "Failed health checks", metrics.health_check_failures),
            (
                "events_exhausted_total",
                "Borrows that timed out at capacity",
                metrics.exhausted_events,
            ),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help))?;
            counter.inc_by(value);
            registry.register(Box::new(counter))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn const_labels(
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        labels
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicU64,
    pub total_disposed: AtomicU64,
    pub total_borrowed: AtomicU64,
    pub total_returned: AtomicU64,
    pub total_evicted: AtomicU64,
    pub health_check_failures: AtomicU64,
    pub exhausted_events: AtomicU64,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, active: usize, idle: usize, max_objects: usize) -> PoolMetrics {
        let utilization = if max_objects > 0 {
            active as f64 / max_objects as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_disposed: self.total_disposed.load(Ordering::Relaxed),
            total_borrowed: self.total_borrowed.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            health_check_failures: self.health_check_failures.load(Ordering::Relaxed),
            exhausted_events: self.exhausted_events.load(Ordering::Relaxed),
            active_objects: active,
            idle_objects: idle,
            max_objects,
            utilization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization_and_export() {
        let tracker = MetricsTracker::new();
        MetricsTracker::incr(&tracker.total_created);
        MetricsTracker::incr(&tracker.total_borrowed);

        let metrics = tracker.get_metrics(1, 3, 4);
        assert_eq!(metrics.utilization, 0.25);

        let exported = metrics.export();
        assert_eq!(exported["total_created"], "1");
        assert_eq!(exported["idle_objects"], "3");
        assert_eq!(exported["utilization"], "0.25");
    }

    #[test]
    fn test_zero_capacity_utilization() {
        let metrics = MetricsTracker::new().get_metrics(0, 0, 0);
        assert_eq!(metrics.utilization, 0.0);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_rejects_invalid_label() {
        let metrics = MetricsTracker::new().get_metrics(0, 0, 1);
        let mut tags = HashMap::new();
        tags.insert("not a label".to_string(), "x".to_string());

        assert!(MetricsExporter::export_prometheus(&metrics, "p", Some(&tags)).is_err());
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_output() {
        let tracker = MetricsTracker::new();
        MetricsTracker::incr(&tracker.total_evicted);
        let metrics = tracker.get_metrics(2, 1, 4);

        let output = MetricsExporter::export_prometheus(&metrics, "crm", None).unwrap();
        assert!(output.contains("# TYPE connector_pool_objects_active gauge"));
        assert!(output.contains("connector_pool_objects_active{pool=\"crm\"} 2"));
        assert!(output.contains("connector_pool_objects_evicted_total{pool=\"crm\"} 1"));
    }
}
