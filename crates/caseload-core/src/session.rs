//! Therapy sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionType {
  InPerson,
  #[default]
  Virtual,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
  #[default]
  Scheduled,
  Completed,
  Canceled,
  NoShow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub session_id:       Uuid,
  pub client_id:        Uuid,
  pub therapist_id:     Uuid,
  pub session_date:     DateTime<Utc>,
  pub duration_minutes: u32,
  pub session_type:     SessionType,
  pub status:           SessionStatus,
  pub notes:            Option<String>,
  pub created_at:       DateTime<Utc>,
}

impl Session {
  /// True if this session is owned by exactly this client/therapist pair.
  pub fn belongs_to(&self, client_id: Uuid, therapist_id: Uuid) -> bool {
    self.client_id == client_id && self.therapist_id == therapist_id
  }
}

/// Input to [`crate::store::RecordStore::insert_session`].
#[derive(Debug, Clone)]
pub struct NewSession {
  pub client_id:        Uuid,
  pub therapist_id:     Uuid,
  pub session_date:     DateTime<Utc>,
  pub duration_minutes: u32,
  pub session_type:     SessionType,
  pub status:           SessionStatus,
  pub notes:            Option<String>,
}

impl NewSession {
  /// A session created on demand to anchor a note whose session reference
  /// did not resolve. It is dated now and already completed.
  pub fn synthesized(client_id: Uuid, therapist_id: Uuid) -> Self {
    Self {
      client_id,
      therapist_id,
      session_date: Utc::now(),
      duration_minutes: 0,
      session_type: SessionType::Virtual,
      status: SessionStatus::Completed,
      notes: None,
    }
  }
}
