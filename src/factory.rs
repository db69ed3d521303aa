//! Resource factory abstraction consumed by the pool

use crate::config::PoolConfiguration;
use crate::errors::{PoolResult, ResourceError};

/// Creates, checks and disposes the resources held by an
/// [`ObjectPool`](crate::ObjectPool).
///
/// The pool never talks to a backing system itself; every lifecycle step
/// of a resource goes through its factory.
///
/// # Examples
///
/// ```
/// use connector_pool::{ResourceError, ResourceFactory};
///
/// struct Connection {
///     open: bool,
/// }
///
/// struct ConnectionFactory;
///
/// impl ResourceFactory<Connection> for ConnectionFactory {
///     fn create(&self) -> Result<Connection, ResourceError> {
///         Ok(Connection { open: true })
///     }
///
///     fn test_health(&self, conn: &mut Connection) -> Result<(), ResourceError> {
///         if conn.open {
///             Ok(())
///         } else {
///             Err(ResourceError::new("connection closed"))
///         }
///     }
/// }
/// ```
pub trait ResourceFactory<T>: Send + Sync {
    /// Construct a new resource
    fn create(&self) -> Result<T, ResourceError>;

    /// Check a resource before it is handed to a borrower
    fn test_health(&self, resource: &mut T) -> Result<(), ResourceError>;

    /// Cheap check run on return; `true` makes the pool dispose the resource
    fn has_broken(&self, _resource: &T) -> bool {
        false
    }

    /// Release a resource. Errors are logged by the pool and otherwise ignored.
    fn dispose(&self, resource: T) -> Result<(), ResourceError> {
        drop(resource);
        Ok(())
    }

    /// Adjust the configuration before the pool uses it. Called once, at
    /// pool construction.
    fn validate_configuration(&self, config: PoolConfiguration) -> PoolResult<PoolConfiguration> {
        Ok(config)
    }
}

/// Factory built from a creation closure. Resources are always considered
/// healthy.
///
/// ```
/// use connector_pool::{FnFactory, ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(FnFactory::new(|| Ok(42)), PoolConfiguration::default()).unwrap();
/// let entry = pool.borrow().unwrap();
/// assert_eq!(*entry, 42);
/// ```
pub struct FnFactory<F> {
    create: F,
}

impl<F> FnFactory<F> {
    pub fn new<T>(create: F) -> Self
    where
        F: Fn() -> Result<T, ResourceError> + Send + Sync,
    {
        Self { create }
    }
}

impl<T, F> ResourceFactory<T> for FnFactory<F>
where
    F: Fn() -> Result<T, ResourceError> + Send + Sync,
{
    fn create(&self) -> Result<T, ResourceError> {
        (self.create)()
    }

    fn test_health(&self, _resource: &mut T) -> Result<(), ResourceError> {
        Ok(())
    }
}
