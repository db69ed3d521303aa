//! Point-in-time pool statistics

use serde::{Deserialize, Serialize};

/// Active and idle counts read under the pool lock.
///
/// # Examples
///
/// ```
/// use connector_pool::{FnFactory, ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(FnFactory::new(|| Ok(1)), PoolConfiguration::default()).unwrap();
/// let entry = pool.borrow().unwrap();
///
/// let stats = pool.statistics();
/// assert_eq!(stats.num_active, 1);
/// assert_eq!(stats.num_idle, 0);
///
/// drop(entry);
/// assert_eq!(pool.statistics().num_idle, 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatistics {
    /// Entries checked out, including ones still being created or health-checked
    pub num_active: usize,

    /// Entries held by the pool
    pub num_idle: usize,
}

impl PoolStatistics {
    /// Idle plus active entries
    pub fn total(&self) -> usize {
        self.num_active + self.num_idle
    }
}
