//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIN_EVICTION_INTERVAL: Duration = Duration::from_millis(1);

/// Limits governing an [`ObjectPool`](crate::ObjectPool).
///
/// The configuration is handed to the pool once at construction and is
/// immutable afterwards.
///
/// # Examples
///
/// ```
/// use connector_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_objects(20)
///     .with_max_idle(10)
///     .with_min_idle(2)
///     .with_max_wait(Duration::from_secs(5));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_objects, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolConfiguration {
    /// Ceiling on idle and active entries combined
    pub max_objects: usize,

    /// Ceiling on idle entries
    pub max_idle: usize,

    /// Floor the evictor preserves when evicting for idleness
    pub min_idle: usize,

    /// How long a borrow blocks before failing; zero means don't wait
    pub max_wait: Duration,

    /// Idle time after which an entry above `min_idle` may be evicted; zero disables
    pub min_evictable_idle_time: Duration,

    /// Hard cap on idle time regardless of `min_idle`; zero means unlimited
    pub max_idle_lifetime: Duration,

    /// Interval between eviction sweeps; derived from the thresholds when unset
    pub eviction_interval: Option<Duration>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_objects: 10,
            max_idle: 10,
            min_idle: 1,
            max_wait: Duration::from_secs(150),
            min_evictable_idle_time: Duration::from_secs(120),
            max_idle_lifetime: Duration::ZERO,
            eviction_interval: None,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries (idle + active)
    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// Set the maximum number of idle entries
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the idle floor kept by the evictor
    pub fn with_min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set how long a borrow may block
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the idle time after which entries become evictable
    pub fn with_min_evictable_idle_time(mut self, idle: Duration) -> Self {
        self.min_evictable_idle_time = idle;
        self
    }

    /// Set the hard cap on idle time
    pub fn with_max_idle_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_idle_lifetime = lifetime;
        self
    }

    /// Set an explicit eviction sweep interval
    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = Some(interval);
        self
    }

    /// Check every relation between the limits.
    ///
    /// Fails with [`PoolError::Configuration`] naming the first violated
    /// relation.
    ///
    /// # Examples
    ///
    /// ```
    /// use connector_pool::{PoolConfiguration, PoolError};
    ///
    /// let config = PoolConfiguration::new().with_max_idle(5).with_min_idle(6);
    /// assert!(matches!(config.validate(), Err(PoolError::Configuration(_))));
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.min_idle > self.max_idle {
            return Err(PoolError::configuration(format!(
                "min_idle ({}) must not exceed max_idle ({})",
                self.min_idle, self.max_idle
            )));
        }
        if self.max_idle > self.max_objects {
            return Err(PoolError::configuration(format!(
                "max_idle ({}) must not exceed max_objects ({})",
                self.max_idle, self.max_objects
            )));
        }
        if !self.max_idle_lifetime.is_zero()
            && self.max_idle_lifetime < self.min_evictable_idle_time
        {
            return Err(PoolError::configuration(format!(
                "max_idle_lifetime ({:?}) must not be shorter than min_evictable_idle_time ({:?})",
                self.max_idle_lifetime, self.min_evictable_idle_time
            )));
        }
        if self.eviction_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(PoolError::configuration(
                "eviction_interval must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Interval the evictor runs at, or `None` when nothing can ever be evicted.
    pub fn effective_eviction_interval(&self) -> Option<Duration> {
        if self.min_evictable_idle_time.is_zero() && self.max_idle_lifetime.is_zero() {
            return None;
        }
        if let Some(interval) = self.eviction_interval {
            return Some(interval);
        }

        let shortest = [self.min_evictable_idle_time, self.max_idle_lifetime]
            .into_iter()
            .filter(|d| !d.is_zero())
            .min()?;
        Some((shortest / 2).max(MIN_EVICTION_INTERVAL))
    }
}

/// Externally supplied pool settings, e.g. read from a connector's
/// configuration file.
///
/// Values are signed so that malformed input is reported as a
/// configuration error instead of a parse failure.
///
/// ```
/// use connector_pool::{PoolConfiguration, PoolSettings};
/// use std::time::Duration;
///
/// let settings = PoolSettings {
///     max_objects: 4,
///     max_idle: 4,
///     min_idle: 0,
///     max_wait_ms: 250,
///     ..PoolSettings::default()
/// };
/// let config = PoolConfiguration::try_from(settings).unwrap();
/// assert_eq!(config.max_wait, Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    #[serde(alias = "maxObjects")]
    pub max_objects: i64,
    #[serde(alias = "maxIdle")]
    pub max_idle: i64,
    #[serde(alias = "minIdle")]
    pub min_idle: i64,
    #[serde(alias = "maxWait")]
    pub max_wait_ms: i64,
    #[serde(alias = "minEvictableIdleTimeMillis")]
    pub min_evictable_idle_time_ms: i64,
    #[serde(alias = "maxIdleTimeMillis")]
    pub max_idle_lifetime_ms: i64,
    #[serde(alias = "evictionIntervalMillis")]
    pub eviction_interval_ms: Option<i64>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings::from(&PoolConfiguration::default())
    }
}

impl From<&PoolConfiguration> for PoolSettings {
    fn from(config: &PoolConfiguration) -> Self {
        Self {
            max_objects: saturating_i64(config.max_objects as u128),
            max_idle: saturating_i64(config.max_idle as u128),
            min_idle: saturating_i64(config.min_idle as u128),
            max_wait_ms: saturating_i64(config.max_wait.as_millis()),
            min_evictable_idle_time_ms: saturating_i64(config.min_evictable_idle_time.as_millis()),
            max_idle_lifetime_ms: saturating_i64(config.max_idle_lifetime.as_millis()),
            eviction_interval_ms: config
                .eviction_interval
                .map(|interval| saturating_i64(interval.as_millis())),
        }
    }
}

impl TryFrom<PoolSettings> for PoolConfiguration {
    type Error = PoolError;

    fn try_from(settings: PoolSettings) -> PoolResult<Self> {
        let config = PoolConfiguration {
            max_objects: non_negative("max_objects", settings.max_objects)?,
            max_idle: non_negative("max_idle", settings.max_idle)?,
            min_idle: non_negative("min_idle", settings.min_idle)?,
            max_wait: millis("max_wait", settings.max_wait_ms)?,
            min_evictable_idle_time: millis(
                "min_evictable_idle_time",
                settings.min_evictable_idle_time_ms,
            )?,
            max_idle_lifetime: millis("max_idle_lifetime", settings.max_idle_lifetime_ms)?,
            eviction_interval: settings
                .eviction_interval_ms
                .map(|ms| millis("eviction_interval", ms))
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn saturating_i64(value: u128) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn non_negative(field: &str, value: i64) -> PoolResult<usize> {
    usize::try_from(value)
        .map_err(|_| {
            PoolError::configuration(format!("{field} must not be negative (got {value})"))
        })
}

fn millis(field: &str, value: i64) -> PoolResult<Duration> {
    let ms = u64::try_from(value).map_err(|_| {
        PoolError::configuration(format!("{field} must not be negative (got {value}ms)"))
    })?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_config_error(result: PoolResult<impl std::fmt::Debug>, needle: &str) {
        match result {
            Err(PoolError::Configuration(msg)) => {
                assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}")
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(PoolConfiguration::default().validate().is_ok());
    }

    #[test]
    fn test_min_idle_above_max_idle() {
        let config = PoolConfiguration::new().with_max_idle(3).with_min_idle(4);
        assert_config_error(config.validate(), "min_idle");
    }

    #[test]
    fn test_max_idle_above_max_objects() {
        let config = PoolConfiguration::new()
            .with_max_objects(2)
            .with_max_idle(3)
            .with_min_idle(0);
        assert_config_error(config.validate(), "max_idle");
    }

    #[test]
    fn test_lifetime_shorter_than_evictable_idle() {
        let config = PoolConfiguration::new()
            .with_min_evictable_idle_time(Duration::from_secs(10))
            .with_max_idle_lifetime(Duration::from_secs(5));
        assert_config_error(config.validate(), "max_idle_lifetime");

        let unlimited = PoolConfiguration::new().with_max_idle_lifetime(Duration::ZERO);
        assert!(unlimited.validate().is_ok());
    }

    #[test]
    fn test_zero_eviction_interval() {
        let config = PoolConfiguration::new().with_eviction_interval(Duration::ZERO);
        assert_config_error(config.validate(), "eviction_interval");
    }

    #[test]
    fn test_negative_max_wait() {
        let settings = PoolSettings {
            max_wait_ms: -1,
            ..PoolSettings::default()
        };
        assert_config_error(PoolConfiguration::try_from(settings), "max_wait");
    }

    #[test]
    fn test_negative_count() {
        let settings = PoolSettings {
            min_idle: -3,
            ..PoolSettings::default()
        };
        assert_config_error(PoolConfiguration::try_from(settings), "min_idle");
    }

    #[test]
    fn test_settings_from_json() {
        let settings: PoolSettings = serde_json::from_str(
            r#"{"maxObjects": 5, "maxIdle": 3, "minIdle": 1, "maxWait": 100}"#,
        )
        .unwrap();
        let config = PoolConfiguration::try_from(settings).unwrap();

        assert_eq!(config.max_objects, 5);
        assert_eq!(config.max_idle, 3);
        assert_eq!(config.min_idle, 1);
        assert_eq!(config.max_wait, Duration::from_millis(100));
        assert_eq!(
            config.min_evictable_idle_time,
            PoolConfiguration::default().min_evictable_idle_time
        );
    }

    #[test]
    fn test_settings_roundtrip_preserves_equality() {
        let config = PoolConfiguration::new()
            .with_max_objects(7)
            .with_max_idle(5)
            .with_eviction_interval(Duration::from_millis(40));
        let back = PoolConfiguration::try_from(PoolSettings::from(&config)).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_structural_equality_and_hash() {
        use std::collections::HashSet;

        let a = PoolConfiguration::new().with_max_objects(3).with_max_idle(3);
        let b = PoolConfiguration::new().with_max_objects(3).with_max_idle(3);
        let c = b.clone().with_min_idle(0);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_effective_eviction_interval() {
        let disabled = PoolConfiguration::new().with_min_evictable_idle_time(Duration::ZERO);
        assert_eq!(disabled.effective_eviction_interval(), None);

        let derived = PoolConfiguration::new()
            .with_min_evictable_idle_time(Duration::from_millis(200))
            .with_max_idle_lifetime(Duration::from_millis(400));
        assert_eq!(
            derived.effective_eviction_interval(),
            Some(Duration::from_millis(100))
        );

        let explicit = derived.with_eviction_interval(Duration::from_millis(7));
        assert_eq!(
            explicit.effective_eviction_interval(),
            Some(Duration::from_millis(7))
        );
    }
}
