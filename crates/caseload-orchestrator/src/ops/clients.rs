//! Client operations.

use caseload_core::{
  client::{Client, ClientPatch, ClientStatus, NewClient, ProfileDetails},
  principal::{AuthProvider, PrincipalContext},
  store::RecordStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Practice, clean, require_text};
use crate::{Error, Result, router::CredentialHint};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateClientInput {
  /// Missing and blank names are both rejected by validation.
  #[serde(default)]
  pub first_name:   String,
  #[serde(default)]
  pub last_name:    String,
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default)]
  pub phone:        Option<String>,
  #[serde(default)]
  pub status:       Option<ClientStatus>,
  /// Ignored: the therapist is always the caller's own.
  #[serde(default)]
  pub therapist_id: Option<Uuid>,
  /// Written after the client; a failure here does not undo the client.
  #[serde(default)]
  pub profile:      Option<ProfileDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
  pub success: bool,
}

impl<S: RecordStore, A: AuthProvider> Practice<S, A> {
  pub async fn create_client(
    &self,
    ctx: &PrincipalContext,
    input: CreateClientInput,
  ) -> Result<Client> {
    let ctx = self.refresh_principal(ctx).await?;
    require_text("first_name", &input.first_name)?;
    require_text("last_name", &input.last_name)?;

    let therapist = self.provisioner.ensure_therapist(&ctx).await?;
    if let Some(claimed) = input.therapist_id.filter(|id| *id != therapist.therapist_id) {
      warn!(
        %claimed,
        resolved = %therapist.therapist_id,
        "ignoring caller-supplied therapist id"
      );
    }

    let new = NewClient {
      client_id:    None,
      therapist_id: therapist.therapist_id,
      first_name:   input.first_name.trim().to_owned(),
      last_name:    input.last_name.trim().to_owned(),
      email:        clean(input.email),
      phone:        clean(input.phone),
      status:       input.status.unwrap_or_default(),
    };
    let store = &**self.store();
    let client = self
      .router
      .execute(&ctx, CredentialHint::Privileged, move |access| {
        store.insert_client(access, new.clone())
      })
      .await?;
    info!(client_id = %client.client_id, therapist_id = %client.therapist_id, "client created");

    if let Some(details) = input.profile {
      let client_id = client.client_id;
      let written = self
        .router
        .execute(&ctx, CredentialHint::Restricted, move |access| {
          store.upsert_client_profile(access, client_id, details.clone())
        })
        .await;
      if let Err(e) = written {
        warn!(%client_id, error = %e, "client created but profile write failed");
      }
    }

    Ok(client)
  }

  pub async fn update_client(
    &self,
    ctx: &PrincipalContext,
    client_id: Uuid,
    patch: ClientPatch,
  ) -> Result<Client> {
    if patch.is_empty() {
      return self.get_client_by_id(ctx, client_id).await;
    }
    let ctx = self.refresh_principal(ctx).await?;
    if let Some(first) = &patch.first_name {
      require_text("first_name", first)?;
    }
    if let Some(last) = &patch.last_name {
      require_text("last_name", last)?;
    }

    // A foreign row would be refused by policy and then written through the
    // privileged fallback, so the caller must see the client first.
    self.visible_client(&ctx, client_id).await?;

    let store = &**self.store();
    self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.update_client(access, client_id, patch.clone())
      })
      .await?
      .ok_or(Error::NotFound { entity: "client", id: client_id })
  }

  pub async fn get_client_by_id(&self, ctx: &PrincipalContext, client_id: Uuid) -> Result<Client> {
    let ctx = self.refresh_principal(ctx).await?;
    self.visible_client(&ctx, client_id).await
  }

  /// Every client visible to the caller, oldest first.
  pub async fn list_clients(&self, ctx: &PrincipalContext) -> Result<Vec<Client>> {
    let ctx = self.refresh_principal(ctx).await?;
    let store = &**self.store();
    self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.list_clients(access, None)
      })
      .await
  }

  /// Delete a client and, first, its profile.
  ///
  /// The profile goes through the privileged path and a failure there is
  /// only logged. A client the caller cannot see reports
  /// `success: false`.
  pub async fn delete_client(
    &self,
    ctx: &PrincipalContext,
    client_id: Uuid,
  ) -> Result<DeleteOutcome> {
    let ctx = self.refresh_principal(ctx).await?;
    let store = &**self.store();

    let existing = self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.get_client(access, client_id)
      })
      .await?;
    if existing.is_none() {
      debug!(%client_id, "delete requested for a client that is not visible");
      return Ok(DeleteOutcome { success: false });
    }

    let profile = self
      .router
      .execute(&ctx, CredentialHint::Privileged, move |access| {
        store.delete_client_profile(access, client_id)
      })
      .await;
    if let Err(e) = profile {
      warn!(%client_id, error = %e, "profile delete failed, deleting client anyway");
    }

    let deleted = self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.delete_client(access, client_id)
      })
      .await?;
    info!(%client_id, deleted, "client delete finished");
    Ok(DeleteOutcome { success: deleted })
  }
}
