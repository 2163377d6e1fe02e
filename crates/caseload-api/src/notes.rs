//! Handlers for `/session-notes` endpoints.
//!
//! `POST` accepts `content` either as a structured object or as a string;
//! a string that looks like serialised JSON but does not parse is stored as
//! an empty document.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use caseload_core::{note::SessionNote, store::RecordStore};
use caseload_orchestrator::ops::CreateSessionNoteInput;

use crate::{AppState, auth::Authenticated, error::ApiError, sessions::ListParams};

/// `GET /session-notes[?client_id=<uuid>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<SessionNote>>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.list_session_notes(&ctx, params.client_id).await?))
}

/// `POST /session-notes`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Json(body): Json<CreateSessionNoteInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  let note = state.practice.create_session_note(&ctx, body).await?;
  Ok((StatusCode::CREATED, Json(note)))
}
