//! [`AccessRouter`]: restricted-first store access with privileged fallback.

use std::future::Future;

use caseload_core::{
  access::{Access, FailureKind, ServiceKey, StoreFailure},
  principal::PrincipalContext,
};
use tracing::debug;

use crate::{Error, Result};

/// Which credential a call should start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialHint {
  /// Try the principal's own credential, fall back on a policy denial.
  Restricted,
  /// Go straight to the service key.
  Privileged,
}

/// Runs store operations under the right credential tier.
///
/// The router knows nothing about the operation it runs: the closure is
/// called once with the restricted access and, if row-level policy refuses
/// it, once more with the privileged access.
#[derive(Debug, Clone, Default)]
pub struct AccessRouter {
  service_key: Option<ServiceKey>,
}

impl AccessRouter {
  pub fn new(service_key: Option<ServiceKey>) -> Self { Self { service_key } }

  /// The privileged access, or [`Error::StoreUnavailable`] if no service key
  /// is configured.
  pub fn privileged(&self) -> Result<Access> {
    self
      .service_key
      .clone()
      .map(Access::Privileged)
      .ok_or(Error::StoreUnavailable)
  }

  pub async fn execute<T, E, F, Fut>(
    &self,
    ctx: &PrincipalContext,
    hint: CredentialHint,
    op: F,
  ) -> Result<T>
  where
    F: Fn(Access) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + StoreFailure + Send + Sync + 'static,
  {
    if hint == CredentialHint::Restricted {
      match op(ctx.restricted()).await {
        Ok(value) => return Ok(value),
        Err(e) if e.failure_kind() == FailureKind::PolicyDenied => {
          debug!(
            principal_id = %ctx.principal_id(),
            error = %e,
            "restricted access denied, retrying with service key"
          );
        }
        Err(e) => return Err(Error::from_store(e)),
      }
    }

    let access = self.privileged()?;
    op(access).await.map_err(Error::from_store)
  }
}
