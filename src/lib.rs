//! # connector_pool
//!
//! Thread-safe pool for expensive, stateful resources such as connector
//! instances held open against a remote system.
//!
//! ## Features
//!
//! - Lazy creation through a pluggable [`ResourceFactory`]
//! - At most one holder per resource, returned via RAII or explicitly
//! - Health checks before reuse, freshest-first reuse order
//! - Blocking borrow with `max_wait`, cancellable and async variants
//! - `max_idle` ceiling enforced on every return
//! - Background eviction by idle time and maximum idle lifetime
//! - Statistics, metrics and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use connector_pool::{FnFactory, ObjectPool, PoolConfiguration};
//!
//! let pool = ObjectPool::new(FnFactory::new(|| Ok(vec![0u8; 16])), PoolConfiguration::default())
//!     .unwrap();
//! {
//!     let buffer = pool.borrow().unwrap();
//!     println!("Got: {} bytes", buffer.len());
//!     // Resource automatically returned when `buffer` goes out of scope
//! }
//! assert_eq!(pool.statistics().num_idle, 1);
//! ```

mod pool;
mod config;
mod entry;
mod factory;
mod metrics;
mod stats;
mod eviction;
mod errors;

pub use pool::ObjectPool;
pub use config::{PoolConfiguration, PoolSettings};
pub use entry::PooledEntry;
pub use factory::{FnFactory, ResourceFactory};
pub use metrics::PoolMetrics;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use stats::PoolStatistics;
pub use errors::{PoolError, PoolResult, ResourceError};
pub use tokio_util::sync::CancellationToken;
