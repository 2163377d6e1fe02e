//! Treatment goals and the progress metrics recorded against them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GoalStatus {
  #[default]
  NotStarted,
  InProgress,
  Achieved,
  Discontinued,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentGoal {
  pub goal_id:     Uuid,
  pub client_id:   Uuid,
  pub title:       String,
  pub description: Option<String>,
  pub target_date: Option<NaiveDate>,
  pub status:      GoalStatus,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTreatmentGoal {
  pub client_id:   Uuid,
  pub title:       String,
  pub description: Option<String>,
  pub target_date: Option<NaiveDate>,
  pub status:      GoalStatus,
}

/// A single measurement, e.g. a PHQ-9 score, optionally tied to a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMetric {
  pub metric_id:   Uuid,
  pub client_id:   Uuid,
  pub goal_id:     Option<Uuid>,
  pub metric_name: String,
  pub value:       f64,
  pub notes:       Option<String>,
  pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProgressMetric {
  pub client_id:   Uuid,
  pub goal_id:     Option<Uuid>,
  pub metric_name: String,
  pub value:       f64,
  pub notes:       Option<String>,
  /// Defaults to now when `None`.
  pub recorded_at: Option<DateTime<Utc>>,
}
