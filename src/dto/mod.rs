pub mod booking;
pub mod common;
pub mod health;
pub mod slot;
pub mod sse;
pub mod user;
pub mod validation;
