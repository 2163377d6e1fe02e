//! Therapist: the practitioner row owned by exactly one principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::principal::PrincipalContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Therapist {
  pub therapist_id: Uuid,
  /// The owning principal. At most one therapist exists per principal.
  pub principal_id: Uuid,
  pub display_name: String,
  pub email:        Option<String>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::RecordStore::insert_therapist`].
#[derive(Debug, Clone)]
pub struct NewTherapist {
  pub principal_id: Uuid,
  pub display_name: String,
  pub email:        Option<String>,
}

impl NewTherapist {
  /// A minimal therapist row for the verified principal in `ctx`.
  ///
  /// The display name is the local part of the principal's email when one is
  /// known.
  pub fn for_principal(ctx: &PrincipalContext) -> Self {
    let display_name = ctx
      .email
      .as_deref()
      .and_then(|e| e.split('@').next())
      .filter(|local| !local.is_empty())
      .unwrap_or("Therapist")
      .to_string();

    Self {
      principal_id: ctx.principal_id(),
      display_name,
      email: ctx.email.clone(),
    }
  }
}
