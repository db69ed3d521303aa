// Demo binary for the connector pool.
// Run examples with: cargo run --example basic

use connector_pool::{FnFactory, ObjectPool, PoolConfiguration};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_logger(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

fn main() {
    init_logger("info");

    let sessions = AtomicU32::new(0);
    let factory = FnFactory::new(move || Ok(sessions.fetch_add(1, Ordering::Relaxed)));
    let config = PoolConfiguration::new()
        .with_max_objects(3)
        .with_max_idle(2)
        .with_min_idle(0)
        .with_max_wait(Duration::from_millis(100));

    let pool = match ObjectPool::new(factory, config) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("failed to create pool: {err}");
            std::process::exit(1);
        }
    };

    {
        let held: Vec<_> = (0..3).filter_map(|_| pool.borrow().ok()).collect();
        info!(sessions = ?held.iter().map(|s| **s).collect::<Vec<_>>(), "borrowed");

        if let Err(err) = pool.borrow() {
            info!(%err, "fourth borrow failed as expected");
        }
    }

    info!(stats = ?pool.statistics(), "after return");
    pool.shutdown();
    info!(stats = ?pool.statistics(), "after shutdown");
}
