/// Transactional booking storage backends.
pub mod booking_store;
/// Persisted entity definitions.
pub mod models;
/// Storage abstraction layer errors.
pub mod storage;
/// In-memory table set mutated inside a transaction.
pub mod tables;
