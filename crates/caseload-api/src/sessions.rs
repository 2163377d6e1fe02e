//! Handlers for `/sessions` endpoints.
//!
//! | Method | Path                   | Notes |
//! |--------|------------------------|-------|
//! | `GET`  | `/sessions`            | Optional `?client_id=<uuid>`, newest first |
//! | `POST` | `/sessions`            | Unknown `client_id` is provisioned as a placeholder |
//! | `PUT`  | `/sessions/:id/status` | Body: `{"status":"completed"}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use caseload_core::{
  session::{Session, SessionStatus},
  store::RecordStore,
};
use caseload_orchestrator::ops::CreateSessionInput;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub client_id: Option<Uuid>,
}

/// `GET /sessions[?client_id=<uuid>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Session>>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.list_sessions(&ctx, params.client_id).await?))
}

/// `POST /sessions`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Json(body): Json<CreateSessionInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  let session = state.practice.create_session(&ctx, body).await?;
  Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: SessionStatus,
}

/// `PUT /sessions/:id/status`
pub async fn set_status<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Session>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.update_session_status(&ctx, id, body.status).await?))
}
