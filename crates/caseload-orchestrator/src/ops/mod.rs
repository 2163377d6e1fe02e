//! Orchestrated operations.
//!
//! [`Practice`] sequences store calls through the principal resolver, the
//! provisioner and the access router. Every operation takes the caller's
//! [`PrincipalContext`] explicitly and refreshes it before touching the
//! store. Ownership fields in caller input are never trusted; they are
//! re-derived from the context.
//!
//! Steps within an operation run strictly in order and are not atomic as a
//! whole: a failure part-way leaves earlier writes in place.

mod clients;
mod notes;
mod progress;
mod sessions;

use std::sync::Arc;

use caseload_core::{
  access::ServiceKey,
  client::Client,
  principal::{AuthProvider, PrincipalContext},
  session::Session,
  store::RecordStore,
  therapist::Therapist,
};
use chrono::Duration;
use uuid::Uuid;

pub use clients::{CreateClientInput, DeleteOutcome};
pub use notes::CreateSessionNoteInput;
pub use progress::{CreateTreatmentGoalInput, RecordProgressMetricInput};
pub use sessions::{CreateSessionInput, DEFAULT_SESSION_MINUTES};

use crate::{
  Error, Result,
  principal::PrincipalResolver,
  provision::EntityProvisioner,
  router::{AccessRouter, CredentialHint},
};

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PracticeConfig {
  /// Service key for privileged access. Without it, operations that need
  /// the privileged path fail with [`Error::StoreUnavailable`].
  pub service_key:    Option<ServiceKey>,
  /// Credentials expiring within this margin are refreshed before use.
  pub refresh_margin: Duration,
}

impl Default for PracticeConfig {
  fn default() -> Self {
    Self {
      service_key:    None,
      refresh_margin: Duration::minutes(5),
    }
  }
}

// ─── Practice ────────────────────────────────────────────────────────────────

/// The composite operations of a therapy practice over one record store.
pub struct Practice<S, A> {
  store:       Arc<S>,
  principal:   PrincipalResolver<A>,
  router:      AccessRouter,
  provisioner: EntityProvisioner<S>,
}

impl<S: RecordStore, A: AuthProvider> Practice<S, A> {
  pub fn new(store: Arc<S>, auth: Arc<A>, config: PracticeConfig) -> Self {
    let router = AccessRouter::new(config.service_key);
    Self {
      principal: PrincipalResolver::new(auth, config.refresh_margin),
      provisioner: EntityProvisioner::new(store.clone(), router.clone()),
      router,
      store,
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// The signed-in principal according to the auth provider.
  pub async fn current_principal(&self) -> Result<PrincipalContext> {
    self.principal.current().await
  }

  /// `ctx` with a credential good for at least the refresh margin.
  pub async fn refresh_principal(&self, ctx: &PrincipalContext) -> Result<PrincipalContext> {
    self.principal.fresh(ctx.clone()).await
  }

  /// `client_id` as seen through the caller's restricted access.
  ///
  /// Mutations of existing rows go through here first: the router escalates
  /// a policy denial to the service key, which must never happen for a row
  /// the caller does not own.
  async fn visible_client(&self, ctx: &PrincipalContext, client_id: Uuid) -> Result<Client> {
    let store = &*self.store;
    self
      .router
      .execute(ctx, CredentialHint::Restricted, move |access| {
        store.get_client(access, client_id)
      })
      .await?
      .ok_or(Error::NotFound { entity: "client", id: client_id })
  }

  async fn visible_session(&self, ctx: &PrincipalContext, session_id: Uuid) -> Result<Session> {
    let store = &*self.store;
    self
      .router
      .execute(ctx, CredentialHint::Restricted, move |access| {
        store.get_session(access, session_id)
      })
      .await?
      .ok_or(Error::NotFound { entity: "session", id: session_id })
  }

  /// The caller's therapist record, created on first use.
  pub async fn ensure_therapist(&self, ctx: &PrincipalContext) -> Result<Therapist> {
    let ctx = self.refresh_principal(ctx).await?;
    self.provisioner.ensure_therapist(&ctx).await
  }
}

// ─── Validation helpers ──────────────────────────────────────────────────────

fn require_text(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(format!("{field} is required")));
  }
  Ok(())
}

fn require_id<T: Copy>(field: &str, value: Option<T>) -> Result<T> {
  value.ok_or_else(|| Error::validation(format!("{field} is required")))
}

/// Trim optional text, treating blank as absent.
fn clean(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}
