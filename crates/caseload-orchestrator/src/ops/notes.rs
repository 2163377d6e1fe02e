//! Session-note operations.

use caseload_core::{
  note::{NewSessionNote, NoteContent, SessionNote, StructuredContent},
  principal::{AuthProvider, PrincipalContext},
  store::RecordStore,
};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Practice, clean, require_id, require_text};
use crate::{Error, Result, router::CredentialHint};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionNoteInput {
  pub client_id:    Option<Uuid>,
  /// Required, but replaced by the caller's own therapist id.
  pub therapist_id: Option<Uuid>,
  /// May be absent, unknown, or belong to another client; a session is
  /// synthesized in each of those cases.
  #[serde(default)]
  pub session_id:   Option<Uuid>,
  #[serde(default)]
  pub title:        String,
  pub content:      Option<NoteContent>,
  #[serde(default)]
  pub therapy_type: Option<String>,
  #[serde(default)]
  pub tags:         Vec<String>,
}

impl<S: RecordStore, A: AuthProvider> Practice<S, A> {
  /// Save a session note, provisioning every parent it references.
  ///
  /// Only the final note insert can fail the operation once validation has
  /// passed and the parents are resolved.
  pub async fn create_session_note(
    &self,
    ctx: &PrincipalContext,
    input: CreateSessionNoteInput,
  ) -> Result<SessionNote> {
    let ctx = self.refresh_principal(ctx).await?;

    let client_id = require_id("client_id", input.client_id)?;
    let claimed_therapist = require_id("therapist_id", input.therapist_id)?;
    require_text("title", &input.title)?;
    let content = match input.content {
      Some(c) if !c.is_blank() => c,
      _ => return Err(Error::validation("content is required")),
    };

    let therapist = self.provisioner.ensure_therapist(&ctx).await?;
    if claimed_therapist != therapist.therapist_id {
      debug!(
        claimed = %claimed_therapist,
        resolved = %therapist.therapist_id,
        "rewriting note therapist to the caller's own"
      );
    }
    let client = self
      .provisioner
      .ensure_client(&ctx, Some(client_id), &therapist)
      .await?;
    let session = self
      .provisioner
      .ensure_session(&ctx, input.session_id, &client, &therapist)
      .await?;

    let new = NewSessionNote {
      session_id:   session.session_id,
      client_id:    client.client_id,
      therapist_id: therapist.therapist_id,
      title:        input.title.trim().to_owned(),
      content:      normalize_content(content),
      therapy_type: clean(input.therapy_type),
      tags:         clean_tags(input.tags),
    };
    let store = &**self.store();
    let note = self
      .router
      .execute(&ctx, CredentialHint::Privileged, move |access| {
        store.insert_session_note(access, new.clone())
      })
      .await?;
    info!(
      note_id = %note.note_id,
      session_id = %note.session_id,
      client_id = %note.client_id,
      "session note created"
    );
    Ok(note)
  }

  /// Visible notes, optionally for one client, newest first.
  pub async fn list_session_notes(
    &self,
    ctx: &PrincipalContext,
    client_id: Option<Uuid>,
  ) -> Result<Vec<SessionNote>> {
    let ctx = self.refresh_principal(ctx).await?;
    let store = &**self.store();
    self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.list_session_notes(access, client_id)
      })
      .await
  }
}

/// Serialised content that fails to parse is replaced by the empty document.
fn normalize_content(content: NoteContent) -> StructuredContent {
  match content.into_structured() {
    Ok(structured) => structured,
    Err(e) => {
      warn!(error = %e, "note content did not parse, storing an empty document");
      StructuredContent::default()
    }
  }
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
  let mut out: Vec<String> = Vec::with_capacity(tags.len());
  for tag in tags {
    let tag = tag.trim();
    if !tag.is_empty() && !out.iter().any(|t| t == tag) {
      out.push(tag.to_owned());
    }
  }
  out
}
