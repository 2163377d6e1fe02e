//! Credential tiers for store access.
//!
//! Every store call is issued under an [`Access`]. A restricted access is
//! bound to one principal and is filtered by row-level ownership policy; a
//! privileged access carries the service key and bypasses policy entirely.
//! Privileged access is only ever constructed inside orchestration code.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Credentials ─────────────────────────────────────────────────────────────

/// A bearer credential bound to one principal, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
  pub principal_id: Uuid,
  pub token:        String,
  pub expires_at:   DateTime<Utc>,
}

impl Credential {
  /// Mint a fresh opaque token for `principal_id` that lives for `ttl`.
  pub fn issue(principal_id: Uuid, ttl: Duration) -> Self {
    Self {
      principal_id,
      token: Uuid::new_v4().simple().to_string(),
      expires_at: Utc::now() + ttl,
    }
  }

  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    self.expires_at <= now
  }

  /// True if the credential expires within `margin` of `now` (or already has).
  pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
    self.expires_at - now <= margin
  }
}

/// The service-role key. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ServiceKey(String);

impl ServiceKey {
  pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

  pub fn expose(&self) -> &str { &self.0 }
}

impl fmt::Debug for ServiceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("ServiceKey(***)")
  }
}

// ─── Access ──────────────────────────────────────────────────────────────────

/// The credential tier a single store call runs under.
#[derive(Debug, Clone)]
pub enum Access {
  /// Subject to row-level policy; rows are scoped to the credential's
  /// principal.
  Restricted(Credential),
  /// Bypasses row-level policy.
  Privileged(ServiceKey),
}

impl Access {
  pub fn is_privileged(&self) -> bool { matches!(self, Self::Privileged(_)) }

  /// The principal a restricted access is scoped to; `None` when privileged.
  pub fn principal_id(&self) -> Option<Uuid> {
    match self {
      Self::Restricted(c) => Some(c.principal_id),
      Self::Privileged(_) => None,
    }
  }
}

// ─── Failure classification ──────────────────────────────────────────────────

/// Backend-independent classification of a store failure. The access router
/// and provisioner act on these kinds without knowing the backend's error
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  /// The restricted credential was rejected by row-level policy.
  PolicyDenied,
  /// A unique or primary-key constraint was violated.
  Duplicate,
  /// The restricted credential has expired.
  CredentialExpired,
  /// A referenced parent row does not exist.
  NotFound,
  Other,
}

/// Implemented by store error types so callers can classify failures.
pub trait StoreFailure {
  fn failure_kind(&self) -> FailureKind;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn credential_expiry_window() {
    let now = Utc::now();
    let cred = Credential {
      principal_id: Uuid::new_v4(),
      token:        "t".into(),
      expires_at:   now + Duration::seconds(90),
    };
    assert!(!cred.is_expired_at(now));
    assert!(cred.expires_within(Duration::minutes(5), now));
    assert!(!cred.expires_within(Duration::seconds(30), now));
    assert!(cred.is_expired_at(now + Duration::seconds(90)));
  }

  #[test]
  fn service_key_debug_is_redacted() {
    let key = ServiceKey::new("super-secret");
    assert_eq!(format!("{key:?}"), "ServiceKey(***)");
    assert_eq!(key.expose(), "super-secret");
  }
}
