//! SQLite backend for the Caseload record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Row-level ownership policy is applied
//! in SQL for restricted access; privileged access skips it.

mod encode;
mod policy;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
