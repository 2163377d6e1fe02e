//! Persistence orchestration for Caseload.
//!
//! Sits between callers and a [`caseload_core::store::RecordStore`]:
//!
//! - [`router`] runs each store call under the restricted credential and
//!   falls back to the privileged one when row-level policy refuses it.
//! - [`principal`] resolves the acting principal and keeps its credential
//!   fresh.
//! - [`provision`] resolves parent records, creating placeholders when a
//!   dependent write references a row that does not exist yet.
//! - [`ops`] exposes the composite operations as methods on [`Practice`].
//! - [`cache`] keeps in-memory client and session lists in step with the
//!   store.

#![allow(async_fn_in_trait)]

pub mod cache;
pub mod error;
pub mod ops;
pub mod principal;
pub mod provision;
pub mod router;

pub use error::{Error, Result};
pub use ops::{Practice, PracticeConfig};
