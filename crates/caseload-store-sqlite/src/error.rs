//! Error type for `caseload-store-sqlite`.

use caseload_core::access::{FailureKind, StoreFailure};
use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] caseload_core::Error),

  #[error("database error: {0}")]
  Database(#[source] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("row-level policy denied {action} on {entity} {id}")]
  PolicyDenied {
    action: &'static str,
    entity: &'static str,
    id:     uuid::Uuid,
  },

  #[error("duplicate key: {0}")]
  Duplicate(String),

  #[error("referenced row does not exist: {0}")]
  MissingReference(String),

  #[error("credential for principal {0} has expired")]
  CredentialExpired(uuid::Uuid),

  #[error("service key rejected")]
  InvalidServiceKey,
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, msg)) = &e {
      let msg = msg.clone().unwrap_or_else(|| failure.to_string());
      match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
          return Error::Duplicate(msg);
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Error::MissingReference(msg),
        _ => {}
      }
    }
    Error::Database(e)
  }
}

impl StoreFailure for Error {
  fn failure_kind(&self) -> FailureKind {
    match self {
      Error::PolicyDenied { .. } => FailureKind::PolicyDenied,
      Error::Duplicate(_) => FailureKind::Duplicate,
      Error::CredentialExpired(_) => FailureKind::CredentialExpired,
      Error::MissingReference(_) => FailureKind::NotFound,
      _ => FailureKind::Other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
