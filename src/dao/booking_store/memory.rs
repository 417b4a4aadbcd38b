use std::sync::Arc;

use futures::future::{self, BoxFuture};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::dao::{
    booking_store::{BookingStore, StoreTransaction},
    storage::StorageResult,
    tables::Tables,
};

/// Process-local store. `begin` holds the table lock until commit or drop,
/// which gives serializable isolation for every transaction.
#[derive(Clone, Default)]
pub struct MemoryBookingStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `tables`.
    pub fn seeded(tables: Tables) -> Self {
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl StoreTransaction for MemoryTransaction {
    fn tables(&self) -> &Tables {
        &self.working
    }

    fn tables_mut(&mut self) -> &mut Tables {
        &mut self.working
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        drop(guard);
        Box::pin(future::ready(Ok(())))
    }
}

impl BookingStore for MemoryBookingStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(MemoryTransaction { guard, working }) as Box<dyn StoreTransaction>)
        })
    }

    fn snapshot(&self) -> BoxFuture<'static, StorageResult<Tables>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.lock().await.clone()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }
}
