pub mod lifecycle;
mod sse;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::{AppConfig, EngineSettings},
    dao::{booking_store::BookingStore, storage::StorageError, tables::Tables},
    error::ServiceError,
    services::{
        classification::{BandLookup, InstructorBands},
        pricing::{PricingPolicy, TieredPricing},
    },
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const SLOT_EVENTS_CAPACITY: usize = 64;

/// Central application state holding the store handle, collaborators and per-slot gates.
pub struct AppState {
    store: RwLock<Option<Arc<dyn BookingStore>>>,
    slot_events: SseHub,
    degraded: watch::Sender<bool>,
    slot_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    config: Arc<AppConfig>,
    pricing: Arc<dyn PricingPolicy>,
    bands: Arc<dyn BandLookup>,
    transaction_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let pricing = Arc::new(TieredPricing::new(config.price_tiers().to_vec()));
        Self::with_collaborators(config, pricing, Arc::new(InstructorBands))
    }

    /// Construct the state with explicit pricing and band lookup collaborators.
    pub fn with_collaborators(
        config: AppConfig,
        pricing: Arc<dyn PricingPolicy>,
        bands: Arc<dyn BandLookup>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let transaction_timeout = Some(config.transaction_timeout()).filter(|d| !d.is_zero());
        Arc::new(Self {
            store: RwLock::new(None),
            slot_events: SseHub::new(SLOT_EVENTS_CAPACITY),
            degraded: degraded_tx,
            slot_gates: DashMap::new(),
            config: Arc::new(config),
            pricing,
            bands,
            transaction_timeout,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn BookingStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current store or fail with [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn BookingStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn BookingStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Broadcast hub used for the slot SSE stream.
    pub fn slot_events(&self) -> &SseHub {
        &self.slot_events
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    pub fn engine(&self) -> EngineSettings {
        self.config.engine()
    }

    pub fn pricing(&self) -> Arc<dyn PricingPolicy> {
        self.pricing.clone()
    }

    pub fn bands(&self) -> Arc<dyn BandLookup> {
        self.bands.clone()
    }

    fn slot_gate(&self, slot_id: Uuid) -> Arc<Mutex<()>> {
        self.slot_gates
            .entry(slot_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the gate of `slot_id` once no caller holds or waits on it.
    fn release_gate(&self, slot_id: Uuid) {
        self.slot_gates
            .remove_if(&slot_id, |_, gate| Arc::strong_count(gate) == 1);
    }

    /// Number of slot gates currently tracked.
    pub fn slot_gate_count(&self) -> usize {
        self.slot_gates.len()
    }

    /// Read a copy of the committed tables. Not ordered with in-flight writes.
    pub async fn read_tables(&self) -> Result<Tables, ServiceError> {
        let store = self.require_store().await?;
        Ok(store.snapshot().await?)
    }

    /// Run `work` against a transaction, committing only when it succeeds.
    ///
    /// When `slot` is given, concurrent calls for the same slot are queued on
    /// its gate before the transaction is opened. A timeout or an error from
    /// `work` drops the transaction, discarding every change it made. The
    /// timeout stops at the commit: once issued, a commit runs to completion
    /// on its own task, even when the caller goes away.
    pub async fn transact<T, F>(&self, slot: Option<Uuid>, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Tables) -> Result<T, ServiceError> + Send,
        T: Send,
    {
        let store = self.require_store().await?;
        let gate = slot.map(|slot_id| self.slot_gate(slot_id));

        let unit = async move {
            let guard = match gate {
                Some(gate) => Some(gate.lock_owned().await),
                None => None,
            };
            let mut tx = store.begin().await?;
            let value = work(tx.tables_mut())?;
            Ok::<_, ServiceError>((guard, tx, value))
        };

        let prepared = match self.transaction_timeout {
            Some(limit) => match timeout(limit, unit).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(slot_id = ?slot, "transaction timed out; rolled back");
                    Err(ServiceError::Timeout)
                }
            },
            None => unit.await,
        };

        let result = match prepared {
            Ok((guard, tx, value)) => {
                let commit = tokio::spawn(async move {
                    let committed = tx.commit().await;
                    drop(guard);
                    committed
                });
                match commit.await {
                    Ok(committed) => committed.map(|()| value).map_err(ServiceError::from),
                    Err(err) => {
                        Err(StorageError::unavailable("commit task failed".into(), err).into())
                    }
                }
            }
            Err(err) => Err(err),
        };

        if let Some(slot_id) = slot {
            self.release_gate(slot_id);
        }
        result.inspect_err(|err| debug!(slot_id = ?slot, error = %err, "transaction aborted"))
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::dao::{
        booking_store::{StoreTransaction, memory::MemoryBookingStore},
        models::ClubEntity,
        storage::StorageResult,
    };

    /// Memory store with artificial latency on `begin` and `commit`.
    struct SlowStore {
        inner: MemoryBookingStore,
        begin_delay: Duration,
        commit_delay: Duration,
    }

    struct SlowTransaction {
        inner: Box<dyn StoreTransaction>,
        delay: Duration,
    }

    impl StoreTransaction for SlowTransaction {
        fn tables(&self) -> &Tables {
            self.inner.tables()
        }

        fn tables_mut(&mut self) -> &mut Tables {
            self.inner.tables_mut()
        }

        fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
            let SlowTransaction { inner, delay } = *self;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                inner.commit().await
            })
        }
    }

    impl BookingStore for SlowStore {
        fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>> {
            let begin = self.inner.begin();
            let (begin_delay, delay) = (self.begin_delay, self.commit_delay);
            Box::pin(async move {
                tokio::time::sleep(begin_delay).await;
                let inner = begin.await?;
                Ok(Box::new(SlowTransaction { inner, delay }) as Box<dyn StoreTransaction>)
            })
        }

        fn snapshot(&self) -> BoxFuture<'static, StorageResult<Tables>> {
            self.inner.snapshot()
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    fn add_club(tables: &mut Tables) -> Result<Uuid, ServiceError> {
        let id = Uuid::new_v4();
        tables.clubs.insert(
            id,
            ClubEntity {
                id,
                name: "Harbour".into(),
                utc_offset_minutes: 0,
            },
        );
        Ok(id)
    }

    #[tokio::test]
    async fn issued_commit_outlives_the_timeout() {
        let config = AppConfig::default().with_transaction_timeout(Duration::from_millis(20));
        let state = AppState::new(config);
        let store = SlowStore {
            inner: MemoryBookingStore::new(),
            begin_delay: Duration::ZERO,
            commit_delay: Duration::from_millis(100),
        };
        state.set_store(Arc::new(store)).await;

        let club = state.transact(None, add_club).await.unwrap();
        let tables = state.read_tables().await.unwrap();
        assert!(tables.clubs.contains_key(&club));
    }

    #[tokio::test]
    async fn slow_begin_times_out_without_changes() {
        let config = AppConfig::default().with_transaction_timeout(Duration::from_millis(20));
        let state = AppState::new(config);
        let store = SlowStore {
            inner: MemoryBookingStore::new(),
            begin_delay: Duration::from_millis(200),
            commit_delay: Duration::ZERO,
        };
        state.set_store(Arc::new(store)).await;

        let result = state.transact(Some(Uuid::new_v4()), add_club).await;
        assert!(matches!(result, Err(ServiceError::Timeout)));
        assert!(state.read_tables().await.unwrap().clubs.is_empty());
        assert_eq!(state.slot_gate_count(), 0);
    }

    #[tokio::test]
    async fn slot_gates_are_dropped_once_idle() {
        let state = AppState::new(AppConfig::default());
        state.set_store(Arc::new(MemoryBookingStore::new())).await;

        for _ in 0..3 {
            state.transact(Some(Uuid::new_v4()), add_club).await.unwrap();
        }
        let failed = state
            .transact(Some(Uuid::new_v4()), |_| {
                Err::<(), _>(ServiceError::InvalidInput("rejected".into()))
            })
            .await;
        assert!(failed.is_err());
        assert_eq!(state.slot_gate_count(), 0);
    }
}
