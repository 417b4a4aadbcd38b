#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use futures::future::BoxFuture;

use crate::dao::{storage::StorageResult, tables::Tables};

/// Abstraction over a transactional store holding the booking tables.
pub trait BookingStore: Send + Sync {
    /// Open a transaction. Writes are serialized until the transaction is
    /// committed or dropped; dropping without commit discards every change.
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>>;
    /// Read a copy of the committed tables for display purposes.
    fn snapshot(&self) -> BoxFuture<'static, StorageResult<Tables>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Working copy of the tables bound to an open transaction.
pub trait StoreTransaction: Send {
    fn tables(&self) -> &Tables;
    fn tables_mut(&mut self) -> &mut Tables;
    /// Atomically publish the working copy.
    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>>;
}
