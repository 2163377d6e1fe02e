//! Treatment goals and progress metrics.
//!
//! Unlike notes, these never provision their client: it must already be
//! visible to the caller.

use caseload_core::{
  goal::{GoalStatus, NewProgressMetric, NewTreatmentGoal, ProgressMetric, TreatmentGoal},
  principal::{AuthProvider, PrincipalContext},
  store::RecordStore,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{Practice, clean, require_text};
use crate::{Error, Result, router::CredentialHint};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTreatmentGoalInput {
  pub client_id:   Uuid,
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub target_date: Option<NaiveDate>,
  #[serde(default)]
  pub status:      Option<GoalStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordProgressMetricInput {
  pub client_id:   Uuid,
  #[serde(default)]
  pub goal_id:     Option<Uuid>,
  pub metric_name: String,
  pub value:       f64,
  #[serde(default)]
  pub notes:       Option<String>,
  #[serde(default)]
  pub recorded_at: Option<DateTime<Utc>>,
}

impl<S: RecordStore, A: AuthProvider> Practice<S, A> {
  pub async fn create_treatment_goal(
    &self,
    ctx: &PrincipalContext,
    input: CreateTreatmentGoalInput,
  ) -> Result<TreatmentGoal> {
    let ctx = self.refresh_principal(ctx).await?;
    require_text("title", &input.title)?;
    let client = self.visible_client(&ctx, input.client_id).await?;

    let new = NewTreatmentGoal {
      client_id:   client.client_id,
      title:       input.title.trim().to_owned(),
      description: clean(input.description),
      target_date: input.target_date,
      status:      input.status.unwrap_or_default(),
    };
    let store = &**self.store();
    let goal = self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.insert_treatment_goal(access, new.clone())
      })
      .await?;
    info!(goal_id = %goal.goal_id, client_id = %goal.client_id, "treatment goal created");
    Ok(goal)
  }

  pub async fn list_treatment_goals(
    &self,
    ctx: &PrincipalContext,
    client_id: Uuid,
  ) -> Result<Vec<TreatmentGoal>> {
    let ctx = self.refresh_principal(ctx).await?;
    let store = &**self.store();
    self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.list_treatment_goals(access, client_id)
      })
      .await
  }

  /// Record a measurement. A referenced goal must belong to the same
  /// client.
  pub async fn record_progress_metric(
    &self,
    ctx: &PrincipalContext,
    input: RecordProgressMetricInput,
  ) -> Result<ProgressMetric> {
    let ctx = self.refresh_principal(ctx).await?;
    require_text("metric_name", &input.metric_name)?;
    if !input.value.is_finite() {
      return Err(Error::validation("value must be a finite number"));
    }
    let client = self.visible_client(&ctx, input.client_id).await?;
    let store = &**self.store();

    if let Some(goal_id) = input.goal_id {
      let goal = self
        .router
        .execute(&ctx, CredentialHint::Restricted, move |access| {
          store.get_treatment_goal(access, goal_id)
        })
        .await?
        .ok_or(Error::NotFound { entity: "treatment goal", id: goal_id })?;
      if goal.client_id != client.client_id {
        return Err(Error::validation(format!(
          "treatment goal {goal_id} belongs to a different client"
        )));
      }
    }

    let new = NewProgressMetric {
      client_id:   client.client_id,
      goal_id:     input.goal_id,
      metric_name: input.metric_name.trim().to_owned(),
      value:       input.value,
      notes:       clean(input.notes),
      recorded_at: input.recorded_at,
    };
    let metric = self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.insert_progress_metric(access, new.clone())
      })
      .await?;
    info!(
      metric_id = %metric.metric_id,
      client_id = %metric.client_id,
      metric = %metric.metric_name,
      "progress metric recorded"
    );
    Ok(metric)
  }

  /// Metrics for one client, oldest first.
  pub async fn list_progress_metrics(
    &self,
    ctx: &PrincipalContext,
    client_id: Uuid,
  ) -> Result<Vec<ProgressMetric>> {
    let ctx = self.refresh_principal(ctx).await?;
    let store = &**self.store();
    self
      .router
      .execute(&ctx, CredentialHint::Restricted, move |access| {
        store.list_progress_metrics(access, client_id)
      })
      .await
  }

}
