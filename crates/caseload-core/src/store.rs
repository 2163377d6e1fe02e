//! The `RecordStore` trait: typed CRUD primitives per entity.
//!
//! The trait is implemented by storage backends (e.g.
//! `caseload-store-sqlite`). Every method takes the [`Access`] it runs under;
//! the backend enforces row-level ownership for [`Access::Restricted`] and
//! skips it for [`Access::Privileged`].
//!
//! Ownership policy, as every backend must apply it:
//!
//! - Reads under a restricted access only see rows owned by the principal.
//!   Rows owned by someone else look absent, never denied.
//! - Writes under a restricted access that touch a row (or reference a
//!   parent) owned by someone else fail with a
//!   [`FailureKind::PolicyDenied`](crate::access::FailureKind) error.
//! - An expired restricted credential fails every call with
//!   [`FailureKind::CredentialExpired`](crate::access::FailureKind).
//!
//! A therapist is owned by its `principal_id`; clients, sessions and notes by
//! the principal of their therapist; profiles, goals and metrics by the
//! principal of their client's therapist.

use std::future::Future;

use uuid::Uuid;

use crate::{
  access::{Access, StoreFailure},
  client::{Client, ClientPatch, ClientProfile, NewClient, ProfileDetails},
  goal::{NewProgressMetric, NewTreatmentGoal, ProgressMetric, TreatmentGoal},
  note::{NewSessionNote, SessionNote},
  session::{NewSession, Session, SessionStatus},
  therapist::{NewTherapist, Therapist},
};

/// Abstraction over a Caseload record store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + StoreFailure + Send + Sync + 'static;

  // ── Therapists ────────────────────────────────────────────────────────

  /// The therapist owned by `principal_id`. If duplicates exist the oldest
  /// row wins.
  fn find_therapist_by_principal(
    &self,
    access: Access,
    principal_id: Uuid,
  ) -> impl Future<Output = Result<Option<Therapist>, Self::Error>> + Send + '_;

  fn get_therapist(
    &self,
    access: Access,
    therapist_id: Uuid,
  ) -> impl Future<Output = Result<Option<Therapist>, Self::Error>> + Send + '_;

  /// Fails with a duplicate error if the principal already has a therapist.
  fn insert_therapist(
    &self,
    access: Access,
    input: NewTherapist,
  ) -> impl Future<Output = Result<Therapist, Self::Error>> + Send + '_;

  // ── Clients ───────────────────────────────────────────────────────────

  fn get_client(
    &self,
    access: Access,
    client_id: Uuid,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// All visible clients, optionally restricted to one therapist, ordered by
  /// creation time.
  fn list_clients(
    &self,
    access: Access,
    therapist_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Client>, Self::Error>> + Send + '_;

  /// Fails with a duplicate error if `input.client_id` is already taken.
  fn insert_client(
    &self,
    access: Access,
    input: NewClient,
  ) -> impl Future<Output = Result<Client, Self::Error>> + Send + '_;

  /// Returns `None` if the client does not exist.
  fn update_client(
    &self,
    access: Access,
    client_id: Uuid,
    patch: ClientPatch,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// Returns `false` if there was nothing to delete. Dependent sessions,
  /// notes, goals, metrics and the profile are removed with the client.
  fn delete_client(
    &self,
    access: Access,
    client_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Client profiles ───────────────────────────────────────────────────

  fn get_client_profile(
    &self,
    access: Access,
    client_id: Uuid,
  ) -> impl Future<Output = Result<Option<ClientProfile>, Self::Error>> + Send + '_;

  /// Insert the client's profile or replace its details.
  fn upsert_client_profile(
    &self,
    access: Access,
    client_id: Uuid,
    details: ProfileDetails,
  ) -> impl Future<Output = Result<ClientProfile, Self::Error>> + Send + '_;

  fn delete_client_profile(
    &self,
    access: Access,
    client_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  fn get_session(
    &self,
    access: Access,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Visible sessions, optionally for one client, newest first.
  fn list_sessions(
    &self,
    access: Access,
    client_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Session>, Self::Error>> + Send + '_;

  fn insert_session(
    &self,
    access: Access,
    input: NewSession,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;

  fn update_session_status(
    &self,
    access: Access,
    session_id: Uuid,
    status: SessionStatus,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  // ── Session notes ─────────────────────────────────────────────────────

  fn get_session_note(
    &self,
    access: Access,
    note_id: Uuid,
  ) -> impl Future<Output = Result<Option<SessionNote>, Self::Error>> + Send + '_;

  /// Visible notes, optionally for one client, newest first.
  fn list_session_notes(
    &self,
    access: Access,
    client_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<SessionNote>, Self::Error>> + Send + '_;

  fn insert_session_note(
    &self,
    access: Access,
    input: NewSessionNote,
  ) -> impl Future<Output = Result<SessionNote, Self::Error>> + Send + '_;

  // ── Treatment goals ───────────────────────────────────────────────────

  fn get_treatment_goal(
    &self,
    access: Access,
    goal_id: Uuid,
  ) -> impl Future<Output = Result<Option<TreatmentGoal>, Self::Error>> + Send + '_;

  fn list_treatment_goals(
    &self,
    access: Access,
    client_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TreatmentGoal>, Self::Error>> + Send + '_;

  fn insert_treatment_goal(
    &self,
    access: Access,
    input: NewTreatmentGoal,
  ) -> impl Future<Output = Result<TreatmentGoal, Self::Error>> + Send + '_;

  // ── Progress metrics ──────────────────────────────────────────────────

  /// Metrics for one client, oldest first.
  fn list_progress_metrics(
    &self,
    access: Access,
    client_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ProgressMetric>, Self::Error>> + Send + '_;

  fn insert_progress_metric(
    &self,
    access: Access,
    input: NewProgressMetric,
  ) -> impl Future<Output = Result<ProgressMetric, Self::Error>> + Send + '_;
}
