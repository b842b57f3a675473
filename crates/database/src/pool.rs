use crate::error::DbError;
use crate::source::{Connection, ConnectionSource};
use async_trait::async_trait;
use core_types::Row;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, trace, warn};

/// A bounded pool of database connections.
///
/// At most `max_connections` connections are borrowed at once. Further
/// acquisitions wait in arrival order until a connection is released, or fail
/// with [`DbError::ConnectionNotFound`] once the pool is shut down. Cloning a
/// `Pool` yields another handle to the same connections.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<Shared>,
}

struct Shared {
    source: Box<dyn ConnectionSource>,
    // tokio's semaphore is fair, which gives waiters first-come-first-served order.
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<Box<dyn Connection>>>,
    closed: AtomicBool,
    max_connections: usize,
}

impl Shared {
    fn idle(&self) -> MutexGuard<'_, VecDeque<Box<dyn Connection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Puts a connection back on the idle list. Hands it back, to be closed, if
    /// the pool is closed or the connection is broken.
    ///
    /// The closed flag is checked under the idle lock; `shutdown` sets the flag
    /// before draining, so no connection can be parked after the drain.
    fn park(&self, conn: Box<dyn Connection>) -> Option<Box<dyn Connection>> {
        if conn.is_closed() {
            return Some(conn);
        }
        let mut idle = self.idle();
        if self.is_closed() {
            return Some(conn);
        }
        idle.push_back(conn);
        None
    }
}

impl Pool {
    /// Creates a pool over `source`. No connection is opened until the first acquisition.
    pub fn new(source: impl ConnectionSource, max_connections: usize) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            shared: Arc::new(Shared {
                source: Box::new(source),
                permits: Arc::new(Semaphore::new(max_connections)),
                idle: Mutex::new(VecDeque::with_capacity(max_connections)),
                closed: AtomicBool::new(false),
                max_connections,
            }),
        }
    }

    /// Borrows a connection, reusing an idle one or opening a new one.
    ///
    /// Suspends while all connections are borrowed.
    pub async fn acquire(&self) -> Result<PooledConnection, DbError> {
        if self.is_closed() {
            return Err(DbError::ConnectionNotFound);
        }

        let permit = self
            .shared
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DbError::ConnectionNotFound)?;

        let conn = loop {
            let reused = self.shared.idle().pop_back();
            match reused {
                Some(conn) if conn.is_closed() => {
                    debug!("discarding a dead idle connection");
                    close_quietly(conn).await;
                }
                Some(conn) => break conn,
                None => {
                    debug!(max = self.shared.max_connections, "opening a new database connection");
                    break self.shared.source.open().await?;
                }
            }
        };

        // Shutdown may have run while we were opening.
        if self.is_closed() {
            close_quietly(conn).await;
            return Err(DbError::ConnectionNotFound);
        }

        trace!(in_use = self.in_use(), "connection acquired");
        Ok(PooledConnection {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
            _permit: permit,
        })
    }

    /// Returns a borrowed connection. Equivalent to [`PooledConnection::release`].
    pub async fn release(&self, conn: PooledConnection) {
        conn.release().await;
    }

    /// Closes the pool.
    ///
    /// New and pending acquisitions fail, idle connections are closed now and
    /// borrowed connections are closed when they come back. Calling it again has
    /// no effect.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.permits.close();

        let drained: Vec<_> = self.shared.idle().drain(..).collect();
        info!(idle = drained.len(), in_use = self.in_use(), "shutting down connection pool");
        for conn in drained {
            close_quietly(conn).await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn max_connections(&self) -> usize {
        self.shared.max_connections
    }

    /// Number of opened connections currently waiting to be reused.
    pub fn idle_count(&self) -> usize {
        self.shared.idle().len()
    }

    /// Number of connections currently borrowed.
    pub fn in_use(&self) -> usize {
        self.shared
            .max_connections
            .saturating_sub(self.shared.permits.available_permits())
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("max_connections", &self.max_connections())
            .field("in_use", &self.in_use())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A connection borrowed from a [`Pool`].
///
/// Release it with [`PooledConnection::release`]; dropping it has the same effect,
/// except that closing after shutdown is then done on a spawned task.
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    shared: Arc<Shared>,
    // Held for as long as the connection is borrowed; dropping it admits the next waiter.
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            match self.shared.park(conn) {
                None => trace!("connection returned to the pool"),
                Some(conn) => {
                    debug!(broken = conn.is_closed(), "closing released connection");
                    close_quietly(conn).await;
                }
            }
        }
    }
}

#[async_trait]
impl Connection for PooledConnection {
    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        match self.conn.as_mut() {
            Some(conn) => conn.execute(sql).await,
            None => Err(DbError::ConnectionNotFound),
        }
    }

    fn is_closed(&self) -> bool {
        self.conn.as_ref().is_none_or(|conn| conn.is_closed())
    }

    async fn close(mut self: Box<Self>) -> Result<(), DbError> {
        match self.conn.take() {
            Some(conn) => conn.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Some(conn) = self.shared.park(conn) {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(close_quietly(conn));
                }
                // Without a runtime the connection is dropped, which closes the socket.
                Err(_) => drop(conn),
            }
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("open", &self.conn.is_some())
            .finish()
    }
}

async fn close_quietly(conn: Box<dyn Connection>) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "failed to close database connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[derive(Clone, Default)]
    struct Counters {
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        // Connections with a lower id are dead, as after a server restart.
        dead_below: Arc<AtomicUsize>,
    }

    struct MockSource {
        counters: Counters,
        fail: bool,
    }

    struct MockConnection {
        id: usize,
        closed: Arc<AtomicUsize>,
        dead_below: Arc<AtomicUsize>,
        broken: bool,
    }

    #[async_trait]
    impl Connection for MockConnection {
        async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
            if sql == "RESET" {
                self.broken = true;
                return Err(DbError::Database("connection reset by peer".to_string()));
            }
            Ok(vec![Row::new().with("connection", self.id as i64)])
        }

        fn is_closed(&self) -> bool {
            self.broken || self.id < self.dead_below.load(Ordering::SeqCst)
        }

        async fn close(self: Box<Self>) -> Result<(), DbError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl ConnectionSource for MockSource {
        async fn open(&self) -> Result<Box<dyn Connection>, DbError> {
            if self.fail {
                return Err(DbError::ConnectFailed("connection refused".to_string()));
            }
            let id = self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockConnection {
                id,
                closed: Arc::clone(&self.counters.closed),
                dead_below: Arc::clone(&self.counters.dead_below),
                broken: false,
            }))
        }
    }

    fn pool(max: usize) -> (Pool, Counters) {
        let counters = Counters::default();
        let source = MockSource {
            counters: counters.clone(),
            fail: false,
        };
        (Pool::new(source, max), counters)
    }

    #[tokio::test]
    async fn test_released_connection_is_reused() {
        let (pool, counters) = pool(2);

        let mut conn = pool.acquire().await.unwrap();
        let rows = conn.execute("SELECT 1").await.unwrap();
        assert_eq!(rows[0].get::<i64>("connection"), Some(0));
        pool.release(conn).await;

        let mut again = pool.acquire().await.unwrap();
        let rows = again.execute("SELECT 1").await.unwrap();
        assert_eq!(rows[0].get::<i64>("connection"), Some(0));
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_waits_while_exhausted() {
        let (pool, _) = pool(1);

        let first = pool.acquire().await.unwrap();
        assert_eq!(pool.in_use(), 1);
        assert!(timeout(Duration::from_millis(50), pool.acquire()).await.is_err());

        first.release().await;
        let second = timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(matches!(second, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn test_waiters_are_served_in_arrival_order() {
        let (pool, _) = pool(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let held = pool.acquire().await.unwrap();

        let mut tasks = Vec::new();
        for label in ["first", "second", "third"] {
            let pool = pool.clone();
            let order = Arc::clone(&order);
            tasks.push(tokio::spawn(async move {
                let conn = pool.acquire().await.unwrap();
                order.lock().unwrap().push(label);
                conn.release().await;
            }));
            // Let the task register as a waiter before spawning the next one.
            sleep(Duration::from_millis(10)).await;
        }

        held.release().await;
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_shutdown_fails_pending_waiters() {
        let (pool, _) = pool(1);
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        sleep(Duration::from_millis(10)).await;

        pool.shutdown().await;
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(DbError::ConnectionNotFound)));
        held.release().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_closes_idle_connections() {
        let (pool, counters) = pool(3);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        a.release().await;
        b.release().await;
        assert_eq!(pool.idle_count(), 2);

        pool.shutdown().await;
        pool.shutdown().await;

        assert!(pool.is_closed());
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
        assert!(matches!(pool.acquire().await, Err(DbError::ConnectionNotFound)));
    }

    #[tokio::test]
    async fn test_borrowed_connection_is_closed_when_released_after_shutdown() {
        let (pool, counters) = pool(2);
        let conn = pool.acquire().await.unwrap();

        pool.shutdown().await;
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);

        conn.release().await;
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_connection_returns_to_the_pool() {
        let (pool, _) = pool(1);
        {
            let _conn = pool.acquire().await.unwrap();
            assert_eq!(pool.in_use(), 1);
        }
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_propagates_and_frees_the_slot() {
        let counters = Counters::default();
        let pool = Pool::new(MockSource { counters, fail: true }, 1);

        let result = pool.acquire().await;
        assert!(matches!(result, Err(DbError::ConnectFailed(_))));
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn test_broken_connection_is_closed_instead_of_reused() {
        let (pool, counters) = pool(4);

        for _ in 0..3 {
            let mut conn = pool.acquire().await.unwrap();
            assert!(matches!(conn.execute("RESET").await, Err(DbError::Database(_))));
            assert!(conn.is_closed());
            conn.release().await;
            assert_eq!(pool.idle_count(), 0);
        }

        assert_eq!(counters.opened.load(Ordering::SeqCst), 3);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 3);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn test_dropped_broken_connection_is_not_parked() {
        let (pool, _) = pool(1);
        {
            let mut conn = pool.acquire().await.unwrap();
            let _ = conn.execute("RESET").await;
        }
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn test_dead_idle_connections_are_skipped() {
        let (pool, counters) = pool(2);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        a.release().await;
        b.release().await;
        assert_eq!(pool.idle_count(), 2);

        // Both idle connections die while parked.
        counters.dead_below.store(2, Ordering::SeqCst);

        let mut conn = pool.acquire().await.unwrap();
        let rows = conn.execute("SELECT 1").await.unwrap();
        assert_eq!(rows[0].get::<i64>("connection"), Some(2));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
        assert_eq!(pool.idle_count(), 0);
    }
}
