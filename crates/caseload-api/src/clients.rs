//! Handlers for `/therapist` and `/clients` endpoints.
//!
//! | Method   | Path            | Notes |
//! |----------|-----------------|-------|
//! | `GET`    | `/therapist`    | Provisions the caller's therapist on first use |
//! | `GET`    | `/clients`      | Clients visible to the caller |
//! | `POST`   | `/clients`      | Body: `{"first_name":…,"last_name":…}`; `therapist_id` is ignored |
//! | `GET`    | `/clients/:id`  | 404 if not visible |
//! | `PATCH`  | `/clients/:id`  | Partial update |
//! | `DELETE` | `/clients/:id`  | `{"success":false}` if not visible |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use caseload_core::{
  client::{Client, ClientPatch},
  store::RecordStore,
  therapist::Therapist,
};
use caseload_orchestrator::ops::{CreateClientInput, DeleteOutcome};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /therapist`
pub async fn therapist<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
) -> Result<Json<Therapist>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.ensure_therapist(&ctx).await?))
}

// ─── Collection ──────────────────────────────────────────────────────────────

/// `GET /clients`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
) -> Result<Json<Vec<Client>>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.list_clients(&ctx).await?))
}

/// `POST /clients`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Json(body): Json<CreateClientInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  let client = state.practice.create_client(&ctx, body).await?;
  Ok((StatusCode::CREATED, Json(client)))
}

// ─── Single client ───────────────────────────────────────────────────────────

/// `GET /clients/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Client>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.get_client_by_id(&ctx, id).await?))
}

/// `PATCH /clients/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<Uuid>,
  Json(patch): Json<ClientPatch>,
) -> Result<Json<Client>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.update_client(&ctx, id, patch).await?))
}

/// `DELETE /clients/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<DeleteOutcome>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.delete_client(&ctx, id).await?))
}
