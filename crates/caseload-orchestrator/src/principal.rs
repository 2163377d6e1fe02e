//! Resolves the acting principal and keeps its credential fresh.

use std::sync::Arc;

use caseload_core::principal::{AuthProvider, PrincipalContext};
use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::{Error, Result};

pub struct PrincipalResolver<A> {
  auth:           Arc<A>,
  refresh_margin: Duration,
}

impl<A: AuthProvider> PrincipalResolver<A> {
  pub fn new(auth: Arc<A>, refresh_margin: Duration) -> Self { Self { auth, refresh_margin } }

  /// The signed-in principal, refreshed if its credential is close to
  /// expiry.
  pub async fn current(&self) -> Result<PrincipalContext> {
    let ctx = self
      .auth
      .get_session()
      .await
      .map_err(|e| Error::Auth(Box::new(e)))?
      .ok_or(Error::AuthenticationRequired)?;
    self.fresh(ctx).await
  }

  /// Return `ctx` unchanged while its credential has more than the refresh
  /// margin left; otherwise exchange it for a new one.
  ///
  /// A provider error is tolerated while the old credential is still valid.
  /// Otherwise a credential that cannot be refreshed, or a refresh that
  /// yields a different principal, is [`Error::AuthenticationRequired`].
  pub async fn fresh(&self, ctx: PrincipalContext) -> Result<PrincipalContext> {
    let now = Utc::now();
    if !ctx.credential.expires_within(self.refresh_margin, now) {
      return Ok(ctx);
    }

    let principal_id = ctx.principal_id();
    let expired = ctx.credential.is_expired_at(now);

    match self.auth.refresh_session(ctx.clone()).await {
      Ok(Some(next)) if next.principal_id() == principal_id => {
        debug!(%principal_id, expires_at = %next.credential.expires_at, "credential refreshed");
        Ok(next)
      }
      Ok(Some(next)) => {
        warn!(
          %principal_id,
          returned = %next.principal_id(),
          "refresh returned a different principal"
        );
        Err(Error::AuthenticationRequired)
      }
      Ok(None) => Err(Error::AuthenticationRequired),
      Err(e) if !expired => {
        warn!(%principal_id, error = %e, "credential refresh failed, using current credential");
        Ok(ctx)
      }
      Err(e) => {
        warn!(%principal_id, error = %e, "credential expired and could not be refreshed");
        Err(Error::AuthenticationRequired)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    io,
    sync::atomic::{AtomicUsize, Ordering},
  };

  use caseload_core::access::Credential;
  use uuid::Uuid;

  use super::*;

  enum Behaviour {
    Renew,
    Refuse,
    Fail,
    SwapPrincipal,
  }

  struct FakeAuth {
    behaviour: Behaviour,
    refreshes: AtomicUsize,
  }

  impl FakeAuth {
    fn new(behaviour: Behaviour) -> Arc<Self> {
      Arc::new(Self { behaviour, refreshes: AtomicUsize::new(0) })
    }
  }

  impl AuthProvider for FakeAuth {
    type Error = io::Error;

    async fn get_session(&self) -> Result<Option<PrincipalContext>, io::Error> { Ok(None) }

    async fn refresh_session(
      &self,
      current: PrincipalContext,
    ) -> Result<Option<PrincipalContext>, io::Error> {
      self.refreshes.fetch_add(1, Ordering::SeqCst);
      match self.behaviour {
        Behaviour::Renew => Ok(Some(PrincipalContext::issue(
          current.principal_id(),
          current.email,
          Duration::hours(1),
        ))),
        Behaviour::Refuse => Ok(None),
        Behaviour::Fail => Err(io::Error::other("provider down")),
        Behaviour::SwapPrincipal => {
          Ok(Some(PrincipalContext::issue(Uuid::new_v4(), None, Duration::hours(1))))
        }
      }
    }
  }

  fn ctx_expiring_in(secs: i64) -> PrincipalContext {
    PrincipalContext {
      credential: Credential {
        principal_id: Uuid::new_v4(),
        token:        "old".into(),
        expires_at:   Utc::now() + Duration::seconds(secs),
      },
      email:      Some("dr@example.com".into()),
    }
  }

  fn resolver(auth: &Arc<FakeAuth>) -> PrincipalResolver<FakeAuth> {
    PrincipalResolver::new(auth.clone(), Duration::minutes(5))
  }

  #[tokio::test]
  async fn long_lived_credential_is_kept() {
    let auth = FakeAuth::new(Behaviour::Renew);
    let ctx = ctx_expiring_in(3600);
    let out = resolver(&auth).fresh(ctx.clone()).await.unwrap();
    assert_eq!(out, ctx);
    assert_eq!(auth.refreshes.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn near_expiry_is_refreshed() {
    let auth = FakeAuth::new(Behaviour::Renew);
    let ctx = ctx_expiring_in(60);
    let out = resolver(&auth).fresh(ctx.clone()).await.unwrap();
    assert_eq!(out.principal_id(), ctx.principal_id());
    assert_ne!(out.credential.token, "old");
    assert_eq!(out.email, ctx.email);
  }

  #[tokio::test]
  async fn refusal_requires_authentication() {
    let auth = FakeAuth::new(Behaviour::Refuse);
    let err = resolver(&auth).fresh(ctx_expiring_in(60)).await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationRequired));
  }

  #[tokio::test]
  async fn provider_failure_keeps_valid_credential() {
    let auth = FakeAuth::new(Behaviour::Fail);
    let ctx = ctx_expiring_in(60);
    let out = resolver(&auth).fresh(ctx.clone()).await.unwrap();
    assert_eq!(out, ctx);
  }

  #[tokio::test]
  async fn provider_failure_with_expired_credential_is_an_error() {
    let auth = FakeAuth::new(Behaviour::Fail);
    let err = resolver(&auth).fresh(ctx_expiring_in(-1)).await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationRequired));
  }

  #[tokio::test]
  async fn principal_swap_is_rejected() {
    let auth = FakeAuth::new(Behaviour::SwapPrincipal);
    let err = resolver(&auth).fresh(ctx_expiring_in(60)).await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationRequired));
  }

  #[tokio::test]
  async fn no_session_requires_authentication() {
    let auth = FakeAuth::new(Behaviour::Renew);
    let err = resolver(&auth).current().await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationRequired));
  }
}
