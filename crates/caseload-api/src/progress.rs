//! Handlers for a client's treatment goals and progress metrics.
//!
//! The client comes from the path; a `client_id` in the body is not read.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use caseload_core::{
  goal::{GoalStatus, ProgressMetric, TreatmentGoal},
  store::RecordStore,
};
use caseload_orchestrator::ops::{CreateTreatmentGoalInput, RecordProgressMetricInput};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Goals ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GoalBody {
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub target_date: Option<NaiveDate>,
  #[serde(default)]
  pub status:      Option<GoalStatus>,
}

/// `GET /clients/:id/goals`
pub async fn list_goals<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<TreatmentGoal>>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.list_treatment_goals(&ctx, client_id).await?))
}

/// `POST /clients/:id/goals`
pub async fn create_goal<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(client_id): Path<Uuid>,
  Json(body): Json<GoalBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  let input = CreateTreatmentGoalInput {
    client_id,
    title: body.title,
    description: body.description,
    target_date: body.target_date,
    status: body.status,
  };
  let goal = state.practice.create_treatment_goal(&ctx, input).await?;
  Ok((StatusCode::CREATED, Json(goal)))
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MetricBody {
  #[serde(default)]
  pub goal_id:     Option<Uuid>,
  pub metric_name: String,
  pub value:       f64,
  #[serde(default)]
  pub notes:       Option<String>,
  #[serde(default)]
  pub recorded_at: Option<DateTime<Utc>>,
}

/// `GET /clients/:id/metrics`, oldest first.
pub async fn list_metrics<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<ProgressMetric>>, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  Ok(Json(state.practice.list_progress_metrics(&ctx, client_id).await?))
}

/// `POST /clients/:id/metrics`
pub async fn record_metric<S>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Path(client_id): Path<Uuid>,
  Json(body): Json<MetricBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + Clone + 'static,
{
  let input = RecordProgressMetricInput {
    client_id,
    goal_id: body.goal_id,
    metric_name: body.metric_name,
    value: body.value,
    notes: body.notes,
    recorded_at: body.recorded_at,
  };
  let metric = state.practice.record_progress_metric(&ctx, input).await?;
  Ok((StatusCode::CREATED, Json(metric)))
}
