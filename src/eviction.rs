//! Idle eviction: sweep rules and the background evictor thread

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::pool::{IdleEntry, PoolInner};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Remove the idle entries a sweep at `now` should dispose.
///
/// `idle` is ordered oldest-returned first. An entry idle longer than
/// `max_idle_lifetime` always goes; otherwise it goes when idle longer than
/// `min_evictable_idle_time` and more than `min_idle` entries remain.
pub(crate) fn sweep<T>(
    idle: &mut VecDeque<IdleEntry<T>>,
    config: &PoolConfiguration,
    now: Instant,
) -> Vec<IdleEntry<T>> {
    let mut evicted = Vec::new();
    let mut idx = 0;

    while idx < idle.len() {
        let idle_for = now.saturating_duration_since(idle[idx].last_returned_at);

        let overstayed =
            !config.max_idle_lifetime.is_zero() && idle_for > config.max_idle_lifetime;
        let evictable = !config.min_evictable_idle_time.is_zero()
            && idle.len() > config.min_idle
            && idle_for > config.min_evictable_idle_time;

        if overstayed || evictable {
            if let Some(entry) = idle.remove(idx) {
                evicted.push(entry);
            }
        } else {
            idx += 1;
        }
    }

    evicted
}

/// Dedicated thread running [`PoolInner::evict`] on a fixed interval.
///
/// The thread holds only a weak reference to the pool and exits when the
/// pool is gone or the stop channel closes.
pub(crate) struct Evictor {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Evictor {
    pub fn spawn<T: Send + 'static>(
        pool: Weak<PoolInner<T>>,
        interval: Duration,
    ) -> PoolResult<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("connector-pool-evictor".to_string())
            .spawn(move || {
                debug!(?interval, "evictor started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let Some(pool) = pool.upgrade() else { break };
                            pool.evict();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("evictor stopped");
            })
            .map_err(|e| {
                PoolError::illegal_state(format!("failed to start evictor thread: {e}"))
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to finish its current sweep.
    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("evictor thread panicked");
            }
        }
    }
}

impl Drop for Evictor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_since(id: u64, returned: Instant) -> IdleEntry<u64> {
        IdleEntry {
            id,
            resource: id,
            created_at: returned,
            last_returned_at: returned,
        }
    }

    fn ids(entries: &[IdleEntry<u64>]) -> Vec<u64> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_idle_rule_preserves_min_idle() {
        let base = Instant::now();
        let mut idle: VecDeque<_> = (0..4).map(|id| idle_since(id, base)).collect();

        let config = PoolConfiguration::new()
            .with_min_idle(1)
            .with_min_evictable_idle_time(Duration::from_secs(5));

        let evicted = sweep(&mut idle, &config, base + Duration::from_secs(10));
        assert_eq!(ids(&evicted), vec![0, 1, 2]);
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].id, 3);
    }

    #[test]
    fn test_fresh_entries_survive() {
        let base = Instant::now();
        let mut idle: VecDeque<_> = vec![
            idle_since(0, base),
            idle_since(1, base + Duration::from_secs(9)),
        ]
        .into();

        let config = PoolConfiguration::new()
            .with_min_idle(0)
            .with_min_evictable_idle_time(Duration::from_secs(5));

        let evicted = sweep(&mut idle, &config, base + Duration::from_secs(10));
        assert_eq!(ids(&evicted), vec![0]);
        assert_eq!(idle[0].id, 1);
    }

    #[test]
    fn test_lifetime_rule_ignores_min_idle() {
        let base = Instant::now();
        let mut idle: VecDeque<_> = (0..2).map(|id| idle_since(id, base)).collect();

        let config = PoolConfiguration::new()
            .with_min_idle(2)
            .with_min_evictable_idle_time(Duration::from_secs(5))
            .with_max_idle_lifetime(Duration::from_secs(20));

        let evicted = sweep(&mut idle, &config, base + Duration::from_secs(30));
        assert_eq!(evicted.len(), 2);
        assert!(idle.is_empty());
    }

    #[test]
    fn test_zero_thresholds_never_evict() {
        let base = Instant::now();
        let mut idle: VecDeque<_> = (0..3).map(|id| idle_since(id, base)).collect();

        let config = PoolConfiguration::new()
            .with_min_idle(0)
            .with_min_evictable_idle_time(Duration::ZERO);

        assert!(sweep(&mut idle, &config, base + Duration::from_secs(3600)).is_empty());
        assert_eq!(idle.len(), 3);
    }
}
