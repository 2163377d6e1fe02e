//! The authenticated principal and the auth-provider seam.
//!
//! A [`PrincipalContext`] is passed explicitly through every orchestrated
//! call; nothing in the workspace reads an ambient "current session".

use std::future::Future;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{Access, Credential};

/// The identity on whose behalf an operation runs, plus its live credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalContext {
  pub credential: Credential,
  pub email:      Option<String>,
}

impl PrincipalContext {
  /// Build a context with a freshly issued credential.
  pub fn issue(principal_id: Uuid, email: Option<String>, ttl: Duration) -> Self {
    Self {
      credential: Credential::issue(principal_id, ttl),
      email,
    }
  }

  pub fn principal_id(&self) -> Uuid { self.credential.principal_id }

  /// The restricted access for this principal.
  pub fn restricted(&self) -> Access { Access::Restricted(self.credential.clone()) }
}

/// External identity provider. Supplies the current principal and refreshes
/// credentials that are about to expire.
pub trait AuthProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The currently signed-in principal, if any.
  fn get_session(
    &self,
  ) -> impl Future<Output = Result<Option<PrincipalContext>, Self::Error>> + Send + '_;

  /// Exchange `current` for a context with a new credential. Returns `None`
  /// if the session can no longer be refreshed (signed out, revoked).
  fn refresh_session(
    &self,
    current: PrincipalContext,
  ) -> impl Future<Output = Result<Option<PrincipalContext>, Self::Error>> + Send + '_;
}
