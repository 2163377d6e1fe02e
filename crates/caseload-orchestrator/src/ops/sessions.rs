//! Session operations.

use caseload_core::{
  principal::{AuthProvider, PrincipalContext},
  session::{NewSession, Session, SessionStatus, SessionType},
  store::RecordStore,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{Practice, clean, require_id};
use crate::{Error, Result, router::CredentialHint};

/// Length of a session when the caller does not give one.
pub const DEFAULT_SESSION_MINUTES: u32 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionInput {
  pub client_id:        Option<Uuid>,
  /// Ignored: the therapist is always the caller's own.
  #[serde(default)]
  pub therapist_id:     Option<Uuid>,
  pub session_date:     DateTime<Utc>,
  #[serde(default)]
  pub duration_minutes: Option<u32>,
  #[serde(default)]
  pub session_type:     SessionType,
  #[serde(default)]
  pub status:           Option<SessionStatus>,
  #[serde(default)]
  pub notes:            Option<String>,
}

impl<S: RecordStore, A: AuthProvider> Practice<S, A> {
  /// Schedule a session. The therapist is resolved from the caller and the
  /// client is provisioned as a placeholder if it does not exist yet.
  pub async fn create_session(
    &self,
    ctx: &PrincipalContext,
    input: CreateSessionInput,
  ) -> Result<Session> {
    let ctx = self.refresh_principal(ctx).await?;
    let client_id = require_id("client_id", input.client_id)?;
    if input.duration_minutes == Some(0) {
      return Err(Error::validation("duration_minutes must be positive"));
    }

    let therapist = self.provisioner.ensure_therapist(&ctx).await?;
    let client = self
      .provisioner
      .ensure_client(&ctx, Some(client_id), &therapist)
      .await?;

    let new = NewSession {
      client_id:        client.client_id,
      therapist_id:     therapist.therapist_id,
      session_date:     input.session_date,
      duration_minutes: input.duration_minutes.unwrap_or(DEFAULT_SESSION_MINUTES),
      session_type:     input.session_type,
      status:           input.status.unwrap_or_default(),
      notes:            clean(input.notes),
    };
    let store = &**self.store();
    let session = self
      .router
      .execute(&ctx, CredentialHint::Privileged, move |access| {
        store.insert_session(access, new.clone())
      })
      .await?;
    info!(
      session_id = %session.session_id,
      client_id = %session.client_id,
      "session created"
    );
    Ok(session)
  }

  pub async fn update_session_status(
    &self,
    ctx: &PrincipalContext,
    session_id: Uuid,
    status: SessionStatus,
  ) -> Result<Session> {
    let ctx = self.refresh_principal(ctx).await?;
    self.visible_session(&ctx, session_id).await?;

    let store = &**self.store();
    self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.update_session_status(access, session_id, status)
      })
      .await?
      .ok_or(Error::NotFound { entity: "session", id: session_id })
  }

  /// Visible sessions, optionally for one client, newest first.
  pub async fn list_sessions(
    &self,
    ctx: &PrincipalContext,
    client_id: Option<Uuid>,
  ) -> Result<Vec<Session>> {
    let ctx = self.refresh_principal(ctx).await?;
    let store = &**self.store();
    self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.list_sessions(access, client_id)
      })
      .await
  }
}
