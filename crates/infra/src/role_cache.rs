//! In-memory snapshot of the role catalog, refreshed in the background.
//!
//! `Uninitialized -> Starting -> Started -> Stopped`. [`RoleCache::start`]
//! performs one refresh inline and fails if it fails, so a service never
//! boots with an empty catalog. After that a single tokio task refreshes on a
//! fixed interval until the returned [`RoleCacheHandle`] is shut down or
//! dropped. Shutdown is only observed between ticks; a refresh in flight runs
//! to completion.
//!
//! Each refresh fetches outside the snapshot lock and then swaps the whole
//! list under the write lock, so readers see either the old or the new
//! snapshot and never wait on the database. Refreshes themselves are
//! serialized: a fetch that started earlier can never overwrite a later one.
//!
//! A `start` that is cancelled before its first refresh completes leaves the
//! cache `Uninitialized`, so it can be started again.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use payd_auth::Role;
use payd_core::{ErrorKind, RoleId};

use crate::store::{RoleStore, StoreError};

/// Read access to the current role catalog.
pub trait RoleCatalog: Send + Sync {
    /// Independent copy of the current snapshot, in catalog order.
    fn roles(&self) -> Vec<Role>;

    fn contains(&self, id: RoleId) -> bool;
}

impl RoleCatalog for Vec<Role> {
    fn roles(&self) -> Vec<Role> {
        self.clone()
    }

    fn contains(&self, id: RoleId) -> bool {
        self.iter().any(|r| r.id == id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Starting,
    Started,
    Stopped,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleCacheError {
    #[error("initial role refresh failed: {0}")]
    InitialRefresh(StoreError),

    #[error("role cache cannot be started from state {0:?}")]
    InvalidState(Lifecycle),

    #[error("refresh interval must be greater than zero")]
    ZeroInterval,
}

impl RoleCacheError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

pub struct RoleCache<S> {
    store: S,
    snapshot: RwLock<Vec<Role>>,
    refreshing: AsyncMutex<()>,
    interval: Duration,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl<S> core::fmt::Debug for RoleCache<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleCache")
            .field("interval", &self.interval)
            .field("lifecycle", &*lock(&self.lifecycle))
            .finish_non_exhaustive()
    }
}

impl<S> RoleCache<S>
where
    S: RoleStore + 'static,
{
    pub fn new(store: S, interval: Duration) -> Result<Self, RoleCacheError> {
        if interval.is_zero() {
            return Err(RoleCacheError::ZeroInterval);
        }
        Ok(Self {
            store,
            snapshot: RwLock::new(Vec::new()),
            refreshing: AsyncMutex::new(()),
            interval,
            lifecycle: Arc::new(Mutex::new(Lifecycle::Uninitialized)),
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *lock(&self.lifecycle)
    }

    /// Fetch the catalog and replace the snapshot.
    ///
    /// On error the previous snapshot is kept and the error is returned to
    /// the caller to log.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let _serialized = self.refreshing.lock().await;
        let roles = self.store.list_all_roles().await?;
        let count = roles.len();
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = roles;
        debug!(roles = count, "role snapshot replaced");
        Ok(())
    }

    /// Load the catalog once and spawn the refresh loop.
    pub async fn start(self: &Arc<Self>) -> Result<RoleCacheHandle, RoleCacheError> {
        {
            let mut state = lock(&self.lifecycle);
            if *state != Lifecycle::Uninitialized {
                return Err(RoleCacheError::InvalidState(*state));
            }
            *state = Lifecycle::Starting;
        }

        // Reverts to `Uninitialized` on error or if this future is dropped.
        let starting = StartingGuard {
            lifecycle: &self.lifecycle,
            armed: true,
        };
        self.refresh().await.map_err(RoleCacheError::InitialRefresh)?;
        starting.started();

        let shutdown = Arc::new(Notify::new());
        let join = tokio::spawn(refresh_loop(Arc::clone(self), Arc::clone(&shutdown)));
        info!(interval_ms = self.interval.as_millis() as u64, "role cache started");

        Ok(RoleCacheHandle {
            shutdown,
            join: Some(join),
            lifecycle: Arc::clone(&self.lifecycle),
        })
    }
}

impl<S> RoleCatalog for RoleCache<S>
where
    S: RoleStore,
{
    fn roles(&self) -> Vec<Role> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn contains(&self, id: RoleId) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|r| r.id == id)
    }
}

async fn refresh_loop<S>(cache: Arc<RoleCache<S>>, shutdown: Arc<Notify>)
where
    S: RoleStore + 'static,
{
    // The first tick fires one interval after start; `start` already loaded.
    let mut ticker = tokio::time::interval_at(Instant::now() + cache.interval, cache.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => {
                debug!("role cache received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = cache.refresh().await {
                    warn!(error = %err, "role refresh failed; keeping previous snapshot");
                }
            }
        }
    }

    info!("role cache refresh loop stopped");
}

/// Controls the refresh loop. Dropping the handle also stops the loop.
#[derive(Debug)]
pub struct RoleCacheHandle {
    shutdown: Arc<Notify>,
    join: Option<JoinHandle<()>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl RoleCacheHandle {
    /// Signal the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                warn!(error = %err, "role cache refresh task ended abnormally");
            }
        }
        *lock(&self.lifecycle) = Lifecycle::Stopped;
    }
}

impl Drop for RoleCacheHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.shutdown.notify_one();
            *lock(&self.lifecycle) = Lifecycle::Stopped;
        }
    }
}

struct StartingGuard<'a> {
    lifecycle: &'a Mutex<Lifecycle>,
    armed: bool,
}

impl StartingGuard<'_> {
    fn started(mut self) {
        self.armed = false;
        *lock(self.lifecycle) = Lifecycle::Started;
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *lock(self.lifecycle) = Lifecycle::Uninitialized;
        }
    }
}

fn lock(m: &Mutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use proptest::prelude::*;

    use crate::store::InMemoryStore;

    /// First read takes `first_delay`; later reads answer at once.
    struct SlowFirstRead {
        first_delay: Duration,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl RoleStore for SlowFirstRead {
        async fn list_all_roles(&self) -> Result<Vec<Role>, StoreError> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(self.first_delay).await;
            }
            Ok(catalog())
        }
    }

    /// First read blocks until released and returns the old catalog; later
    /// reads return the new one immediately.
    struct GatedStore {
        release: Notify,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl RoleStore for GatedStore {
        async fn list_all_roles(&self) -> Result<Vec<Role>, StoreError> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                self.release.notified().await;
                Ok(vec![Role::new(1, "Old")])
            } else {
                Ok(vec![Role::new(2, "New")])
            }
        }
    }

    const TICK: Duration = Duration::from_millis(20);

    fn catalog() -> Vec<Role> {
        vec![Role::new(1, "Cashier"), Role::new(2, "Cook"), Role::new(3, "Driver")]
    }

    fn cache_over(store: Arc<InMemoryStore>) -> Arc<RoleCache<Arc<InMemoryStore>>> {
        Arc::new(RoleCache::new(store, TICK).unwrap())
    }

    async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cond()
    }

    proptest! {
        #[test]
        fn snapshot_is_store_order_and_an_independent_copy(
            entries in prop::collection::vec((any::<i32>(), "[a-z]{1,8}"), 0..16)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let rows: Vec<Role> = entries.iter().map(|(id, name)| Role::new(*id, name.clone())).collect();
                let store = Arc::new(InMemoryStore::with_roles(rows.clone()));
                let cache = cache_over(store);
                let handle = cache.start().await.unwrap();

                let mut first = cache.roles();
                prop_assert_eq!(&first, &rows);

                first.push(Role::new(-1, "intruder"));
                first.reverse();
                prop_assert_eq!(cache.roles(), rows);

                handle.shutdown().await;
                Ok(())
            })?;
        }
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_snapshot() {
        let store = Arc::new(InMemoryStore::with_roles(catalog()));
        let cache = cache_over(Arc::clone(&store));
        cache.refresh().await.unwrap();

        store.set_roles(vec![Role::new(9, "Ghost")]);
        store.set_fail_roles(true);
        assert!(cache.refresh().await.is_err());

        assert_eq!(cache.roles(), catalog());
        assert!(cache.contains(RoleId::new(2)));
        assert!(!cache.contains(RoleId::new(9)));
    }

    #[tokio::test]
    async fn failed_start_leaves_cache_uninitialized() {
        let store = Arc::new(InMemoryStore::with_roles(catalog()));
        store.set_fail_roles(true);
        let cache = cache_over(Arc::clone(&store));

        let err = cache.start().await.unwrap_err();
        assert!(matches!(err, RoleCacheError::InitialRefresh(_)));
        assert_eq!(cache.lifecycle(), Lifecycle::Uninitialized);
        assert!(cache.roles().is_empty());

        store.set_fail_roles(false);
        let handle = cache.start().await.unwrap();
        assert_eq!(cache.lifecycle(), Lifecycle::Started);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn cancelled_start_can_be_retried() {
        let store = SlowFirstRead {
            first_delay: Duration::from_millis(200),
            reads: AtomicUsize::new(0),
        };
        let cache = Arc::new(RoleCache::new(store, TICK).unwrap());

        let timed_out = tokio::time::timeout(Duration::from_millis(20), cache.start()).await;
        assert!(timed_out.is_err());
        assert_eq!(cache.lifecycle(), Lifecycle::Uninitialized);

        let handle = cache.start().await.unwrap();
        assert_eq!(cache.lifecycle(), Lifecycle::Started);
        assert_eq!(cache.roles(), catalog());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn overlapping_refreshes_apply_in_call_order() {
        let cache = Arc::new(
            RoleCache::new(
                GatedStore {
                    release: Notify::new(),
                    reads: AtomicUsize::new(0),
                },
                TICK,
            )
            .unwrap(),
        );

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.refresh().await }
        });
        assert!(eventually(|| cache.store.reads.load(Ordering::SeqCst) == 1).await);

        let second = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The second refresh waits for the first instead of fetching.
        assert_eq!(cache.store.reads.load(Ordering::SeqCst), 1);

        cache.store.release.notify_one();
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(cache.roles(), vec![Role::new(2, "New")]);
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let cache = cache_over(Arc::new(InMemoryStore::with_roles(catalog())));
        let handle = cache.start().await.unwrap();
        assert_eq!(
            cache.start().await.unwrap_err(),
            RoleCacheError::InvalidState(Lifecycle::Started)
        );
        handle.shutdown().await;
        assert_eq!(
            cache.start().await.unwrap_err(),
            RoleCacheError::InvalidState(Lifecycle::Stopped)
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = RoleCache::new(InMemoryStore::new(), Duration::ZERO).unwrap_err();
        assert_eq!(err, RoleCacheError::ZeroInterval);
    }

    #[tokio::test]
    async fn loop_picks_up_catalog_changes() {
        let store = Arc::new(InMemoryStore::with_roles(catalog()));
        let cache = cache_over(Arc::clone(&store));
        let handle = cache.start().await.unwrap();

        store.set_roles(vec![Role::new(4, "Manager")]);
        assert!(eventually(|| cache.contains(RoleId::new(4))).await);
        assert_eq!(cache.roles(), vec![Role::new(4, "Manager")]);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn loop_survives_refresh_failures() {
        let store = Arc::new(InMemoryStore::with_roles(catalog()));
        let cache = cache_over(Arc::clone(&store));
        let handle = cache.start().await.unwrap();

        store.set_fail_roles(true);
        let reads_at_failure = store.role_reads();
        assert!(eventually(|| store.role_reads() >= reads_at_failure + 2).await);
        assert_eq!(cache.roles(), catalog());

        store.set_roles(vec![Role::new(5, "Porter")]);
        store.set_fail_roles(false);
        assert!(eventually(|| cache.contains(RoleId::new(5))).await);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let store = Arc::new(InMemoryStore::with_roles(catalog()));
        let cache = cache_over(Arc::clone(&store));
        let handle = cache.start().await.unwrap();

        handle.shutdown().await;
        assert_eq!(cache.lifecycle(), Lifecycle::Stopped);

        let reads = store.role_reads();
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(store.role_reads(), reads);
        assert_eq!(cache.roles(), catalog());
    }
}
