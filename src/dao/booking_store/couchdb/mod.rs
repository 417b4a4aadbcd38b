mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchBookingStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::RevisionConflict { ref doc_id } => {
                StorageError::conflict(format!("document `{doc_id}` changed concurrently"))
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
