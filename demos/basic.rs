//! Basic usage examples for the connector pool

use connector_pool::{ObjectPool, PoolConfiguration, PoolError, ResourceError, ResourceFactory};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Stand-in for a connection to a directory server
struct Session {
    id: u32,
    alive: bool,
}

struct SessionFactory {
    next_id: AtomicU32,
}

impl ResourceFactory<Session> for SessionFactory {
    fn create(&self) -> Result<Session, ResourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        println!("   opening session {id}");
        Ok(Session { id, alive: true })
    }

    fn test_health(&self, session: &mut Session) -> Result<(), ResourceError> {
        if session.alive {
            Ok(())
        } else {
            Err(ResourceError::new(format!("session {} dropped", session.id)))
        }
    }

    fn dispose(&self, session: Session) -> Result<(), ResourceError> {
        println!("   closing session {}", session.id);
        Ok(())
    }
}

fn main() {
    println!("=== Connector pool - Basic Examples ===\n");

    let config = PoolConfiguration::new()
        .with_max_objects(2)
        .with_max_idle(2)
        .with_min_idle(0)
        .with_max_wait(Duration::from_millis(100));

    let pool = ObjectPool::new(
        SessionFactory {
            next_id: AtomicU32::new(1),
        },
        config,
    )
    .expect("valid configuration");

    // Example 1: Borrow and return
    println!("1. Borrow and return:");
    {
        let session = pool.borrow().unwrap();
        println!("   using session {}", session.id);
    }
    println!("   stats: {:?}\n", pool.statistics());

    // Example 2: Exhaustion
    println!("2. Exhaustion:");
    let first = pool.borrow().unwrap();
    let second = pool.borrow().unwrap();
    match pool.borrow() {
        Err(PoolError::PoolExhausted(waited)) => println!("   exhausted after {waited:?}"),
        other => println!("   unexpected: {:?}", other.map(|s| s.id)),
    }
    drop(first);
    drop(second);
    println!();

    // Example 3: A session that died while idle is replaced
    println!("3. Health check on reuse:");
    {
        let mut session = pool.borrow().unwrap();
        session.alive = false;
    }
    let session = pool.borrow().unwrap();
    println!("   got healthy session {}\n", session.id);
    drop(session);

    // Example 4: Metrics and shutdown
    println!("4. Metrics and shutdown:");
    for (key, value) in pool.export_metrics() {
        println!("     {key}: {value}");
    }
    pool.shutdown();
    println!("   stats after shutdown: {:?}", pool.statistics());
}
