//! Client and client-profile types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where a client is in their course of treatment.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClientStatus {
  #[default]
  New,
  Active,
  OnHold,
  Completed,
}

// ─── Client ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
  pub client_id:    Uuid,
  /// Always the therapist of the principal that created the row.
  pub therapist_id: Uuid,
  pub first_name:   String,
  pub last_name:    String,
  pub email:        Option<String>,
  pub phone:        Option<String>,
  pub status:       ClientStatus,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

impl Client {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name).trim().to_string()
  }
}

/// Input to [`crate::store::RecordStore::insert_client`].
///
/// `therapist_id` must already be resolved from the calling principal.
#[derive(Debug, Clone)]
pub struct NewClient {
  /// Caller-chosen id; the store generates one when `None`.
  pub client_id:    Option<Uuid>,
  pub therapist_id: Uuid,
  pub first_name:   String,
  pub last_name:    String,
  pub email:        Option<String>,
  pub phone:        Option<String>,
  pub status:       ClientStatus,
}

impl NewClient {
  /// Minimal stand-in row for a client that a dependent write referenced but
  /// that does not exist yet.
  pub fn placeholder(client_id: Option<Uuid>, therapist_id: Uuid) -> Self {
    Self {
      client_id,
      therapist_id,
      first_name: "Unnamed".into(),
      last_name: "Client".into(),
      email: None,
      phone: None,
      status: ClientStatus::New,
    }
  }
}

/// Partial update for a client. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientPatch {
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub status:     Option<ClientStatus>,
}

impl ClientPatch {
  pub fn is_empty(&self) -> bool {
    self.first_name.is_none()
      && self.last_name.is_none()
      && self.email.is_none()
      && self.phone.is_none()
      && self.status.is_none()
  }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// Demographic and clinical details kept alongside a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDetails {
  pub date_of_birth:     Option<NaiveDate>,
  pub gender:            Option<String>,
  pub address:           Option<String>,
  pub emergency_contact: Option<String>,
  pub diagnosis:         Option<String>,
  pub medications:       Vec<String>,
  pub notes:             Option<String>,
}

/// At most one profile exists per client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientProfile {
  pub profile_id: Uuid,
  pub client_id:  Uuid,
  #[serde(flatten)]
  pub details:    ProfileDetails,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn status_text_forms() {
    assert_eq!(ClientStatus::OnHold.as_ref(), "on_hold");
    assert_eq!(ClientStatus::from_str("completed").unwrap(), ClientStatus::Completed);
    assert!(ClientStatus::from_str("archived").is_err());
    assert_eq!(serde_json::to_string(&ClientStatus::OnHold).unwrap(), "\"on_hold\"");
  }

  #[test]
  fn placeholder_keeps_requested_id() {
    let id = Uuid::new_v4();
    let therapist = Uuid::new_v4();
    let p = NewClient::placeholder(Some(id), therapist);
    assert_eq!(p.client_id, Some(id));
    assert_eq!(p.therapist_id, therapist);
    assert_eq!(p.status, ClientStatus::New);
  }

  #[test]
  fn profile_details_tolerate_missing_fields() {
    let d: ProfileDetails = serde_json::from_str(r#"{"gender":"f"}"#).unwrap();
    assert_eq!(d.gender.as_deref(), Some("f"));
    assert!(d.medications.is_empty());
  }
}
