//! Handle for a borrowed resource

use crate::pool::PoolInner;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// A resource checked out of an [`ObjectPool`](crate::ObjectPool).
///
/// The entry gives exclusive access to the resource through `Deref` and
/// `DerefMut`. Dropping it returns the resource to its pool;
/// [`ObjectPool::return_object`](crate::ObjectPool::return_object) does the
/// same explicitly and reports misuse.
pub struct PooledEntry<T: Send + 'static> {
    resource: Option<T>,
    id: u64,
    created_at: Instant,
    last_returned_at: Option<Instant>,
    broken: bool,
    pool: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> PooledEntry<T> {
    pub(crate) fn new(
        resource: T,
        id: u64,
        created_at: Instant,
        last_returned_at: Option<Instant>,
        pool: Arc<PoolInner<T>>,
    ) -> Self {
        Self {
            resource: Some(resource),
            id,
            created_at,
            last_returned_at,
            broken: false,
            pool,
        }
    }

    /// Pool-unique identifier of this entry
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the underlying resource was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the entry last went back to the idle set, `None` for a fresh resource
    pub fn last_returned_at(&self) -> Option<Instant> {
        self.last_returned_at
    }

    /// Flag the resource as unusable so that returning it disposes it
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Whether [`mark_broken`](Self::mark_broken) was called
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Take the resource out of the pool for good.
    ///
    /// The pool stops tracking it and frees its capacity slot; disposing the
    /// resource becomes the caller's job.
    pub fn detach(mut self) -> T {
        let resource = self.resource.take().expect("Resource already taken");
        self.pool.forget(self.id);
        resource
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<PoolInner<T>>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }

    /// Hands the resource back to the pool, consuming the handle.
    pub(crate) fn release(mut self) -> crate::PoolResult<()> {
        match self.resource.take() {
            Some(resource) => self
                .pool
                .release(self.id, resource, self.created_at, self.broken),
            None => Ok(()),
        }
    }
}

impl<T: Send + 'static> Deref for PooledEntry<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("Resource already taken")
    }
}

impl<T: Send + 'static> DerefMut for PooledEntry<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("Resource already taken")
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for PooledEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledEntry")
            .field("id", &self.id)
            .field("resource", &self.resource)
            .field("broken", &self.broken)
            .finish()
    }
}

impl<T: Send + 'static> Drop for PooledEntry<T> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take()
            && let Err(err) = self
                .pool
                .release(self.id, resource, self.created_at, self.broken)
        {
            warn!(entry_id = self.id, error = %err, "dropped entry was rejected by its pool");
        }
    }
}
