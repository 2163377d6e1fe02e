//! Error type for `caseload-orchestrator`.

use caseload_core::access::{FailureKind, StoreFailure};
use thiserror::Error;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("authentication required")]
  AuthenticationRequired,

  #[error("credential expired")]
  CredentialExpired,

  #[error("validation failed: {0}")]
  Validation(String),

  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: Uuid },

  #[error("privileged store access is not configured")]
  StoreUnavailable,

  #[error("denied by row-level policy: {0}")]
  PolicyDenied(#[source] BoxError),

  #[error("conflict: {0}")]
  Conflict(#[source] BoxError),

  #[error("referenced row is missing: {0}")]
  MissingReference(#[source] BoxError),

  #[error("could not provision {entity} after {attempts} attempts")]
  ProvisioningExhausted { entity: &'static str, attempts: u32 },

  #[error("auth provider error: {0}")]
  Auth(#[source] BoxError),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl Error {
  /// Classify a backend error by its [`FailureKind`].
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + StoreFailure + Send + Sync + 'static,
  {
    match e.failure_kind() {
      FailureKind::PolicyDenied => Self::PolicyDenied(Box::new(e)),
      FailureKind::Duplicate => Self::Conflict(Box::new(e)),
      FailureKind::CredentialExpired => Self::CredentialExpired,
      FailureKind::NotFound => Self::MissingReference(Box::new(e)),
      FailureKind::Other => Self::Store(Box::new(e)),
    }
  }

  pub fn is_conflict(&self) -> bool { matches!(self, Self::Conflict(_)) }

  pub(crate) fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
