//! Core object pool implementation

use crate::config::PoolConfiguration;
use crate::entry::PooledEntry;
use crate::errors::{PoolError, PoolResult};
use crate::eviction::{self, Evictor};
use crate::factory::ResourceFactory;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::stats::PoolStatistics;

#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often a cancellable or async borrow re-checks for cancellation
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A resource held by the pool, not checked out
pub(crate) struct IdleEntry<T> {
    pub id: u64,
    pub resource: T,
    pub created_at: Instant,
    pub last_returned_at: Instant,
}

/// Everything guarded by the pool lock
struct PoolState<T> {
    /// Oldest-returned first
    idle: VecDeque<IdleEntry<T>>,
    /// Checked-out entries, including ones still being created or health-checked
    active: HashSet<u64>,
    next_id: u64,
    shutdown: bool,
}

impl<T> PoolState<T> {
    fn total(&self) -> usize {
        self.idle.len() + self.active.len()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// What a borrower got hold of under the lock
enum Reservation<T> {
    Reuse(IdleEntry<T>),
    Create(u64),
}

/// Shared pool internals, referenced by the pool, its entries and the evictor
pub(crate) struct PoolInner<T> {
    factory: Box<dyn ResourceFactory<T>>,
    config: PoolConfiguration,
    state: Mutex<PoolState<T>>,
    available: Condvar,
    metrics: MetricsTracker,
}

impl<T: Send + 'static> PoolInner<T> {
    /// Claim the freshest idle entry or a creation slot, counting it active.
    fn reserve(&self, state: &mut PoolState<T>) -> Option<Reservation<T>> {
        if let Some(entry) = state.idle.pop_back() {
            state.active.insert(entry.id);
            return Some(Reservation::Reuse(entry));
        }
        if state.total() < self.config.max_objects {
            let id = state.allocate_id();
            state.active.insert(id);
            return Some(Reservation::Create(id));
        }
        None
    }

    /// Borrow loop. `Ok(None)` means the wait budget ran out at capacity.
    fn acquire(
        self: &Arc<Self>,
        max_wait: Duration,
        cancel: Option<&CancellationToken>,
    ) -> PoolResult<Option<PooledEntry<T>>> {
        let deadline = Instant::now().checked_add(max_wait);

        loop {
            let reservation = {
                let mut state = self.state.lock();
                loop {
                    if state.shutdown {
                        return Err(PoolError::PoolShutdown);
                    }
                    if cancel.is_some_and(|token| token.is_cancelled()) {
                        // Pass on any wakeup this waiter consumed.
                        self.available.notify_one();
                        return Err(PoolError::InterruptedWait);
                    }
                    if let Some(reservation) = self.reserve(&mut state) {
                        break reservation;
                    }

                    let now = Instant::now();
                    if max_wait.is_zero() || deadline.is_some_and(|d| now >= d) {
                        return Ok(None);
                    }

                    let wake_at = match (cancel, deadline) {
                        (Some(_), Some(d)) => d.min(now + CANCEL_POLL_INTERVAL),
                        (Some(_), None) => now + CANCEL_POLL_INTERVAL,
                        (None, Some(d)) => d,
                        (None, None) => {
                            self.available.wait(&mut state);
                            continue;
                        }
                    };
                    self.available.wait_until(&mut state, wake_at);
                }
            };

            if let Some(entry) = self.activate(reservation)? {
                return Ok(Some(entry));
            }
        }
    }

    /// Turn a reservation into a handed-out entry.
    ///
    /// `Ok(None)` means a reused idle resource failed its health check and
    /// was disposed; the caller should try again.
    fn activate(
        self: &Arc<Self>,
        reservation: Reservation<T>,
    ) -> PoolResult<Option<PooledEntry<T>>> {
        match reservation {
            Reservation::Reuse(mut idle) => {
                if let Err(err) = self.factory.test_health(&mut idle.resource) {
                    MetricsTracker::incr(&self.metrics.health_check_failures);
                    warn!(entry_id = idle.id, error = %err, "idle resource failed health check");
                    self.dispose(idle.id, idle.resource);
                    self.unreserve(idle.id);
                    return Ok(None);
                }
                debug!(entry_id = idle.id, "reusing idle resource");
                self.hand_out(idle.id, idle.resource, idle.created_at, Some(idle.last_returned_at))
                    .map(Some)
            }
            Reservation::Create(id) => {
                let mut resource = match self.factory.create() {
                    Ok(resource) => resource,
                    Err(err) => {
                        self.unreserve(id);
                        return Err(PoolError::CreationFailed(err));
                    }
                };
                MetricsTracker::incr(&self.metrics.total_created);

                if let Err(err) = self.factory.test_health(&mut resource) {
                    MetricsTracker::incr(&self.metrics.health_check_failures);
                    warn!(entry_id = id, error = %err, "new resource failed health check");
                    self.dispose(id, resource);
                    self.unreserve(id);
                    return Err(PoolError::Unhealthy(err));
                }
                debug!(entry_id = id, "created new resource");
                self.hand_out(id, resource, Instant::now(), None).map(Some)
            }
        }
    }

    fn hand_out(
        self: &Arc<Self>,
        id: u64,
        resource: T,
        created_at: Instant,
        last_returned_at: Option<Instant>,
    ) -> PoolResult<PooledEntry<T>> {
        let shut_down = self.state.lock().shutdown;
        if shut_down {
            self.dispose(id, resource);
            self.unreserve(id);
            return Err(PoolError::PoolShutdown);
        }

        MetricsTracker::incr(&self.metrics.total_borrowed);
        Ok(PooledEntry::new(resource, id, created_at, last_returned_at, Arc::clone(self)))
    }

    /// Drop a reservation that never became a handed-out entry.
    fn unreserve(&self, id: u64) {
        self.state.lock().active.remove(&id);
        self.available.notify_one();
    }

    /// Stop tracking a detached entry.
    pub(crate) fn forget(&self, id: u64) {
        debug!(entry_id = id, "entry detached from pool");
        self.unreserve(id);
    }

    /// Hand a resource to the factory for disposal, logging failures.
    fn dispose(&self, id: u64, resource: T) {
        MetricsTracker::incr(&self.metrics.total_disposed);
        if let Err(err) = self.factory.dispose(resource) {
            warn!(entry_id = id, error = %err, "failed to dispose resource");
        }
    }

    /// Take back a checked-out resource.
    pub(crate) fn release(
        &self,
        id: u64,
        resource: T,
        created_at: Instant,
        broken: bool,
    ) -> PoolResult<()> {
        let broken = broken || self.factory.has_broken(&resource);
        let mut doomed = Vec::new();
        let mut pooled = false;

        {
            let mut state = self.state.lock();
            if !state.active.remove(&id) {
                drop(state);
                self.dispose(id, resource);
                return Err(PoolError::illegal_state(format!(
                    "entry {id} is not checked out from this pool"
                )));
            }

            if broken || state.shutdown {
                debug!(entry_id = id, broken, "disposing returned resource");
                doomed.push((id, resource));
            } else {
                state.idle.push_back(IdleEntry {
                    id,
                    resource,
                    created_at,
                    last_returned_at: Instant::now(),
                });
                MetricsTracker::incr(&self.metrics.total_returned);
                pooled = true;

                while state.idle.len() > self.config.max_idle {
                    if let Some(oldest) = state.idle.pop_front() {
                        debug!(entry_id = oldest.id, "trimming idle resource above max_idle");
                        doomed.push((oldest.id, oldest.resource));
                    }
                }
            }
        }

        // Every pooled or disposed entry frees something a waiter can use.
        for _ in 0..doomed.len() + usize::from(pooled) {
            self.available.notify_one();
        }
        for (id, resource) in doomed {
            self.dispose(id, resource);
        }
        Ok(())
    }

    /// Run one eviction sweep, returning how many idle entries were disposed.
    pub(crate) fn evict(&self) -> usize {
        let evicted = {
            let mut state = self.state.lock();
            if state.shutdown {
                return 0;
            }
            eviction::sweep(&mut state.idle, &self.config, Instant::now())
        };

        let count = evicted.len();
        for entry in evicted {
            debug!(entry_id = entry.id, "evicting idle resource");
            MetricsTracker::incr(&self.metrics.total_evicted);
            self.available.notify_one();
            self.dispose(entry.id, entry.resource);
        }
        count
    }

    fn warm_up(&self, count: usize) -> PoolResult<usize> {
        let mut created = 0;

        while created < count {
            let id = {
                let mut state = self.state.lock();
                if state.shutdown {
                    return Err(PoolError::PoolShutdown);
                }
                if state.idle.len() >= self.config.max_idle
                    || state.total() >= self.config.max_objects
                {
                    break;
                }
                let id = state.allocate_id();
                state.active.insert(id);
                id
            };

            let resource = match self.factory.create() {
                Ok(resource) => resource,
                Err(err) => {
                    self.unreserve(id);
                    return Err(PoolError::CreationFailed(err));
                }
            };
            MetricsTracker::incr(&self.metrics.total_created);

            let mut state = self.state.lock();
            state.active.remove(&id);
            if state.shutdown {
                drop(state);
                self.dispose(id, resource);
                return Err(PoolError::PoolShutdown);
            }
            let now = Instant::now();
            state.idle.push_back(IdleEntry {
                id,
                resource,
                created_at: now,
                last_returned_at: now,
            });
            drop(state);

            self.available.notify_one();
            created += 1;
        }

        debug!(created, "warmed up pool");
        Ok(created)
    }

    /// Mark the pool shut down and dispose its idle entries.
    ///
    /// Returns `false` when the pool was already shut down.
    fn shutdown(&self) -> bool {
        let drained = {
            let mut state = self.state.lock();
            if state.shutdown {
                return false;
            }
            state.shutdown = true;
            std::mem::take(&mut state.idle)
        };
        self.available.notify_all();

        info!(idle = drained.len(), "shutting down pool");
        for entry in drained {
            self.dispose(entry.id, entry.resource);
        }
        true
    }

    fn statistics(&self) -> PoolStatistics {
        let state = self.state.lock();
        PoolStatistics {
            num_active: state.active.len(),
            num_idle: state.idle.len(),
        }
    }
}

/// Thread-safe pool of expensive, stateful resources.
///
/// Resources are created lazily through a [`ResourceFactory`], handed out
/// one holder at a time as [`PooledEntry`] values, health-checked before
/// reuse and evicted in the background once idle for too long.
///
/// # Examples
///
/// ```
/// use connector_pool::{FnFactory, ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(
///     FnFactory::new(|| Ok(String::from("session"))),
///     PoolConfiguration::new().with_max_objects(2).with_max_idle(2),
/// )
/// .unwrap();
///
/// let entry = pool.borrow().unwrap();
/// assert_eq!(entry.as_str(), "session");
/// pool.return_object(entry).unwrap();
///
/// assert_eq!(pool.statistics().num_idle, 1);
/// ```
///
/// Returning the same entry twice does not compile:
///
/// ```compile_fail
/// use connector_pool::{FnFactory, ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(FnFactory::new(|| Ok(1)), PoolConfiguration::default()).unwrap();
/// let entry = pool.borrow().unwrap();
/// pool.return_object(entry).unwrap();
/// pool.return_object(entry).unwrap();
/// ```
pub struct ObjectPool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
    evictor: Mutex<Option<Evictor>>,
}

impl<T: Send + 'static> ObjectPool<T> {
    /// Create a pool backed by `factory`.
    ///
    /// The factory may adjust the configuration first; the result is then
    /// validated. A background evictor thread is started when the
    /// configuration allows idle entries to expire.
    pub fn new<F>(factory: F, config: PoolConfiguration) -> PoolResult<Self>
    where
        F: ResourceFactory<T> + 'static,
    {
        let config = factory.validate_configuration(config)?;
        config.validate()?;

        info!(
            max_objects = config.max_objects,
            max_idle = config.max_idle,
            min_idle = config.min_idle,
            max_wait = ?config.max_wait,
            "creating pool"
        );

        let interval = config.effective_eviction_interval();
        let inner = Arc::new(PoolInner {
            factory: Box::new(factory),
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                active: HashSet::new(),
                next_id: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
            metrics: MetricsTracker::new(),
        });

        let evictor = interval
            .map(|interval| Evictor::spawn(Arc::downgrade(&inner), interval))
            .transpose()?;

        Ok(Self {
            inner,
            evictor: Mutex::new(evictor),
        })
    }

    /// Borrow a resource, blocking up to `max_wait` while the pool is at
    /// capacity.
    ///
    /// # Errors
    ///
    /// - [`PoolError::PoolShutdown`] once [`shutdown`](Self::shutdown) has started
    /// - [`PoolError::PoolExhausted`] when no resource frees up within `max_wait`
    /// - [`PoolError::CreationFailed`] / [`PoolError::Unhealthy`] when a new
    ///   resource cannot be created or fails its health check
    pub fn borrow(&self) -> PoolResult<PooledEntry<T>> {
        let max_wait = self.inner.config.max_wait;
        let acquired = self.inner.acquire(max_wait, None)?;
        self.exhausted_unless(acquired, max_wait)
    }

    /// Borrow without waiting; fails with `PoolExhausted` at capacity.
    pub fn try_borrow(&self) -> PoolResult<PooledEntry<T>> {
        let acquired = self.inner.acquire(Duration::ZERO, None)?;
        self.exhausted_unless(acquired, Duration::ZERO)
    }

    /// Like [`borrow`](Self::borrow), but gives up with
    /// [`PoolError::InterruptedWait`] once `cancel` fires.
    ///
    /// ```
    /// use connector_pool::{FnFactory, ObjectPool, PoolConfiguration, PoolError};
    /// use connector_pool::CancellationToken;
    ///
    /// let pool = ObjectPool::new(
    ///     FnFactory::new(|| Ok(1)),
    ///     PoolConfiguration::new().with_max_objects(1).with_max_idle(1),
    /// )
    /// .unwrap();
    /// let _held = pool.borrow().unwrap();
    ///
    /// let token = CancellationToken::new();
    /// token.cancel();
    /// assert!(matches!(pool.borrow_with_cancel(&token), Err(PoolError::InterruptedWait)));
    /// ```
    pub fn borrow_with_cancel(&self, cancel: &CancellationToken) -> PoolResult<PooledEntry<T>> {
        let max_wait = self.inner.config.max_wait;
        let acquired = self.inner.acquire(max_wait, Some(cancel))?;
        self.exhausted_unless(acquired, max_wait)
    }

    /// Borrow from async code, waiting up to `max_wait` without blocking the
    /// executor between attempts.
    ///
    /// Dropping the returned future abandons the wait and leaves the pool
    /// unchanged. Factory calls still run inline on the calling task.
    pub async fn borrow_async(&self) -> PoolResult<PooledEntry<T>> {
        let max_wait = self.inner.config.max_wait;

        match tokio::time::timeout(max_wait, self.poll_borrow()).await {
            Ok(result) => result,
            Err(_) => self.exhausted_unless(None, max_wait),
        }
    }

    async fn poll_borrow(&self) -> PoolResult<PooledEntry<T>> {
        loop {
            if let Some(entry) = self.inner.acquire(Duration::ZERO, None)? {
                return Ok(entry);
            }
            tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
        }
    }

    fn exhausted_unless(
        &self,
        acquired: Option<PooledEntry<T>>,
        waited: Duration,
    ) -> PoolResult<PooledEntry<T>> {
        acquired.ok_or_else(|| {
            MetricsTracker::incr(&self.inner.metrics.exhausted_events);
            debug!(?waited, "pool exhausted");
            PoolError::PoolExhausted(waited)
        })
    }

    /// Return a borrowed entry.
    ///
    /// Broken or shut-down-time returns dispose the resource; otherwise it
    /// becomes the freshest idle entry and the oldest idle entries beyond
    /// `max_idle` are disposed.
    ///
    /// # Errors
    ///
    /// [`PoolError::IllegalState`] when the entry was borrowed from another
    /// pool. That entry still goes back to the pool it came from.
    pub fn return_object(&self, entry: PooledEntry<T>) -> PoolResult<()> {
        if !entry.belongs_to(&self.inner) {
            return Err(PoolError::illegal_state(format!(
                "entry {} was not borrowed from this pool",
                entry.id()
            )));
        }
        entry.release()
    }

    /// Pre-create up to `count` idle entries, bounded by `max_idle` and the
    /// remaining capacity. Returns how many were created.
    pub fn warm_up(&self, count: usize) -> PoolResult<usize> {
        self.inner.warm_up(count)
    }

    /// Run one eviction sweep now, returning how many entries were disposed.
    pub fn evict(&self) -> usize {
        self.inner.evict()
    }

    /// Consistent snapshot of the active and idle counts
    pub fn statistics(&self) -> PoolStatistics {
        self.inner.statistics()
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let stats = self.statistics();
        self.inner
            .metrics
            .get_metrics(stats.num_active, stats.num_idle, self.inner.config.max_objects)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
            .map_err(|e| PoolError::Metrics(e.to_string()))
    }

    /// The configuration in effect, after factory adjustment
    pub fn configuration(&self) -> &PoolConfiguration {
        &self.inner.config
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutdown(&self) -> bool {
        self.inner.state.lock().shutdown
    }

    /// Stop accepting borrows, wake all waiters and dispose idle entries.
    ///
    /// Entries still checked out are disposed when they come back.
    /// Calling this again is a no-op.
    pub fn shutdown(&self) {
        if !self.inner.shutdown() {
            return;
        }
        if let Some(mut evictor) = self.evictor.lock().take() {
            evictor.stop();
        }
    }
}

impl<T: Send + 'static> Drop for ObjectPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
