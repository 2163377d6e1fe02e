//! [`EntityProvisioner`]: get-or-create resolution of parent records.
//!
//! The parent chain is Therapist → Client → Session. Each `ensure_*` method
//! resolves one level, creating a placeholder when the referenced row does
//! not exist. Every level makes at most one insert, and lookups are retried
//! at most [`MAX_PROVISION_ATTEMPTS`] times.

use std::sync::Arc;

use caseload_core::{
  client::{Client, NewClient},
  principal::PrincipalContext,
  session::{NewSession, Session},
  store::RecordStore,
  therapist::{NewTherapist, Therapist},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  router::{AccessRouter, CredentialHint},
};

/// Lookups per level before provisioning gives up.
pub const MAX_PROVISION_ATTEMPTS: u32 = 2;

pub struct EntityProvisioner<S> {
  store:  Arc<S>,
  router: AccessRouter,
}

impl<S: RecordStore> EntityProvisioner<S> {
  pub fn new(store: Arc<S>, router: AccessRouter) -> Self { Self { store, router } }

  /// The therapist owned by the context's principal, created on first use.
  ///
  /// The principal id always comes from `ctx`. Two concurrent calls for a
  /// new principal both attempt the insert; the loser sees a duplicate-key
  /// conflict and re-reads the winner's row.
  pub async fn ensure_therapist(&self, ctx: &PrincipalContext) -> Result<Therapist> {
    let store = &*self.store;
    let principal_id = ctx.principal_id();
    let mut provisioned = false;

    for attempt in 1..=MAX_PROVISION_ATTEMPTS {
      let found = self
        .router
        .execute(ctx, CredentialHint::Restricted, move |access| {
          store.find_therapist_by_principal(access, principal_id)
        })
        .await?;
      if let Some(therapist) = found {
        return Ok(therapist);
      }
      if provisioned {
        break;
      }

      let new = NewTherapist::for_principal(ctx);
      let inserted = self
        .router
        .execute(ctx, CredentialHint::Privileged, move |access| {
          store.insert_therapist(access, new.clone())
        })
        .await;

      match inserted {
        Ok(therapist) => {
          info!(
            %principal_id,
            therapist_id = %therapist.therapist_id,
            "provisioned therapist"
          );
          return Ok(therapist);
        }
        Err(e) if e.is_conflict() => {
          debug!(%principal_id, attempt, "therapist insert raced another caller, re-reading");
          provisioned = true;
        }
        Err(e) => return Err(e),
      }
    }

    Err(Error::ProvisioningExhausted {
      entity:   "therapist",
      attempts: MAX_PROVISION_ATTEMPTS,
    })
  }

  /// The client `client_id` under `therapist`, or a placeholder client
  /// carrying that id if none is visible.
  ///
  /// A visible client attached to a different therapist is not reused. If
  /// the placeholder insert collides with a row the principal cannot see,
  /// the lookup runs once more before giving up.
  pub async fn ensure_client(
    &self,
    ctx: &PrincipalContext,
    client_id: Option<Uuid>,
    therapist: &Therapist,
  ) -> Result<Client> {
    let store = &*self.store;
    let therapist_id = therapist.therapist_id;
    let mut provisioned = false;

    for attempt in 1..=MAX_PROVISION_ATTEMPTS {
      if let Some(id) = client_id {
        let found = self
          .router
          .execute(ctx, CredentialHint::Restricted, move |access| {
            store.get_client(access, id)
          })
          .await?;
        match found {
          Some(client) if client.therapist_id == therapist_id => return Ok(client),
          Some(client) => warn!(
            client_id = %id,
            owner = %client.therapist_id,
            %therapist_id,
            "client belongs to another therapist, not reusing it"
          ),
          None => debug!(client_id = %id, "client not found"),
        }
      }
      if provisioned {
        break;
      }

      let placeholder = NewClient::placeholder(client_id, therapist_id);
      let inserted = self
        .router
        .execute(ctx, CredentialHint::Restricted, move |access| {
          store.insert_client(access, placeholder.clone())
        })
        .await;

      match inserted {
        Ok(client) => {
          info!(
            client_id = %client.client_id,
            %therapist_id,
            "provisioned placeholder client"
          );
          return Ok(client);
        }
        Err(e) if e.is_conflict() => {
          debug!(?client_id, attempt, "placeholder client id already taken, re-reading");
          provisioned = true;
        }
        Err(e) => return Err(e),
      }
    }

    Err(Error::ProvisioningExhausted {
      entity:   "client",
      attempts: MAX_PROVISION_ATTEMPTS,
    })
  }

  /// The session `session_id` if it exists and belongs to `client` and
  /// `therapist`; otherwise a freshly synthesized session for them.
  pub async fn ensure_session(
    &self,
    ctx: &PrincipalContext,
    session_id: Option<Uuid>,
    client: &Client,
    therapist: &Therapist,
  ) -> Result<Session> {
    let store = &*self.store;
    let client_id = client.client_id;
    let therapist_id = therapist.therapist_id;

    if let Some(id) = session_id {
      let found = self
        .router
        .execute(ctx, CredentialHint::Restricted, move |access| {
          store.get_session(access, id)
        })
        .await?;
      match found {
        Some(session) if session.belongs_to(client_id, therapist_id) => return Ok(session),
        Some(session) => warn!(
          session_id = %id,
          session_client = %session.client_id,
          %client_id,
          "session belongs to a different client, synthesizing a new one"
        ),
        None => debug!(session_id = %id, "session not found, synthesizing a new one"),
      }
    }

    let new = NewSession::synthesized(client_id, therapist_id);
    let session = self
      .router
      .execute(ctx, CredentialHint::Privileged, move |access| {
        store.insert_session(access, new.clone())
      })
      .await?;
    info!(session_id = %session.session_id, %client_id, "synthesized session");
    Ok(session)
  }
}
