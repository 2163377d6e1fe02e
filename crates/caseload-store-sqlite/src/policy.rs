//! Row-level ownership policy, evaluated on the database thread.
//!
//! A statement runs under a [`Scope`]: the principal id for restricted
//! access, or `None` for privileged access. Reads fold the scope into their
//! `WHERE` clause (`?N IS NULL OR t.principal_id = ?N`); writes first resolve
//! the owning principal of the row they touch and consult [`gate`].

use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{Error, Result};

/// `Some(principal_id)` for restricted access, `None` for privileged.
pub type Scope = Option<String>;

// ─── Owner lookups ───────────────────────────────────────────────────────────

pub const THERAPIST_OWNER: &str =
  "SELECT principal_id FROM therapists WHERE therapist_id = ?1";

pub const CLIENT_OWNER: &str = "SELECT t.principal_id
   FROM clients c JOIN therapists t ON t.therapist_id = c.therapist_id
   WHERE c.client_id = ?1";

pub const SESSION_OWNER: &str = "SELECT t.principal_id
   FROM sessions s JOIN therapists t ON t.therapist_id = s.therapist_id
   WHERE s.session_id = ?1";

pub const GOAL_OWNER: &str = "SELECT t.principal_id
   FROM treatment_goals g
   JOIN clients c    ON c.client_id    = g.client_id
   JOIN therapists t ON t.therapist_id = c.therapist_id
   WHERE g.goal_id = ?1";

// ─── Gate ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
  Allowed,
  Denied,
  Missing,
}

/// Decide whether `scope` may write to the row selected by `owner_sql`.
pub fn gate(
  conn: &Connection,
  scope: &Scope,
  owner_sql: &str,
  id: &str,
) -> rusqlite::Result<Gate> {
  let owner: Option<String> = conn
    .query_row(owner_sql, rusqlite::params![id], |r| r.get(0))
    .optional()?;

  Ok(match (owner, scope) {
    (None, _) => Gate::Missing,
    (Some(_), None) => Gate::Allowed,
    (Some(owner), Some(principal)) if &owner == principal => Gate::Allowed,
    (Some(_), Some(_)) => Gate::Denied,
  })
}

// ─── Gated outcome ───────────────────────────────────────────────────────────

/// Result of a policy-gated statement, carried back from the database
/// thread. `Denied` and `Missing` name the entity whose gate refused.
pub enum Gated<T> {
  Done(T),
  Denied(&'static str),
  Missing(&'static str),
}

impl<T> Gated<T> {
  /// Short-circuit helper for closures: `Some(refusal)` unless allowed.
  pub fn refuse(gate: Gate, entity: &'static str) -> Option<Self> {
    match gate {
      Gate::Allowed => None,
      Gate::Denied => Some(Self::Denied(entity)),
      Gate::Missing => Some(Self::Missing(entity)),
    }
  }

  /// For updates and deletes of an existing row: a missing row is `None`,
  /// not an error.
  pub fn into_option(self, action: &'static str, id: Uuid) -> Result<Option<T>> {
    match self {
      Self::Done(v) => Ok(Some(v)),
      Self::Missing(_) => Ok(None),
      Self::Denied(entity) => Err(Error::PolicyDenied { action, entity, id }),
    }
  }

  /// For inserts of `entity` with id `id`: a missing parent is an error.
  pub fn into_result(self, entity: &'static str, id: Uuid) -> Result<T> {
    match self {
      Self::Done(v) => Ok(v),
      Self::Missing(parent) => {
        Err(Error::MissingReference(format!("{parent} referenced by {entity} {id}")))
      }
      Self::Denied(_) => Err(Error::PolicyDenied { action: "insert", entity, id }),
    }
  }
}
