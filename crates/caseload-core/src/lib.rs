//! Domain records, access credentials and the [`store::RecordStore`] seam
//! shared by every caseload crate.
//!
//! No HTTP or database code lives here.

// Trait methods spell out `Send` on their returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod client;
pub mod error;
pub mod goal;
pub mod note;
pub mod principal;
pub mod session;
pub mod store;
pub mod therapist;

pub use error::{Error, Result};
