//! Integration tests for `SqliteStore` against an in-memory database.

use caseload_core::{
  access::{Access, Credential, FailureKind, ServiceKey, StoreFailure as _},
  client::{ClientPatch, ClientStatus, NewClient, ProfileDetails},
  goal::{GoalStatus, NewProgressMetric, NewTreatmentGoal},
  note::{NewSessionNote, StructuredContent},
  session::{NewSession, SessionStatus},
  store::RecordStore,
  therapist::{NewTherapist, Therapist},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{Error, SqliteStore};

const KEY: &str = "test-service-key";

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
    .with_service_key(ServiceKey::new(KEY))
}

fn privileged() -> Access { Access::Privileged(ServiceKey::new(KEY)) }

fn restricted(principal_id: Uuid) -> Access {
  Access::Restricted(Credential::issue(principal_id, Duration::hours(1)))
}

async fn seed_therapist(s: &SqliteStore, principal_id: Uuid) -> Therapist {
  s.insert_therapist(privileged(), NewTherapist {
    principal_id,
    display_name: "Dr. Test".into(),
    email: Some("test@example.com".into()),
  })
  .await
  .unwrap()
}

fn new_client(therapist_id: Uuid, first: &str) -> NewClient {
  NewClient {
    first_name: first.into(),
    last_name: "Doe".into(),
    ..NewClient::placeholder(None, therapist_id)
  }
}

// ─── Therapists ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn therapist_found_by_principal() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;

  let found = s
    .find_therapist_by_principal(restricted(principal), principal)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.therapist_id, t.therapist_id);
}

#[tokio::test]
async fn therapist_of_other_principal_is_invisible() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let t = seed_therapist(&s, owner).await;

  let stranger = restricted(Uuid::new_v4());
  assert!(s.get_therapist(stranger.clone(), t.therapist_id).await.unwrap().is_none());
  assert!(s.find_therapist_by_principal(stranger, owner).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_therapist_is_classified() {
  let s = store().await;
  let principal = Uuid::new_v4();
  seed_therapist(&s, principal).await;

  let err = s
    .insert_therapist(restricted(principal), NewTherapist {
      principal_id: principal,
      display_name: "Again".into(),
      email:        None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate(_)), "got {err:?}");
  assert_eq!(err.failure_kind(), FailureKind::Duplicate);
}

#[tokio::test]
async fn restricted_cannot_insert_therapist_for_someone_else() {
  let s = store().await;
  let err = s
    .insert_therapist(restricted(Uuid::new_v4()), NewTherapist {
      principal_id: Uuid::new_v4(),
      display_name: "Imposter".into(),
      email:        None,
    })
    .await
    .unwrap_err();
  assert_eq!(err.failure_kind(), FailureKind::PolicyDenied);
}

// ─── Access validation ───────────────────────────────────────────────────────

#[tokio::test]
async fn expired_credential_is_rejected() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let expired = Access::Restricted(Credential {
    principal_id: principal,
    token:        "stale".into(),
    expires_at:   Utc::now() - Duration::seconds(1),
  });

  let err = s.list_clients(expired, None).await.unwrap_err();
  assert!(matches!(err, Error::CredentialExpired(p) if p == principal));
  assert_eq!(err.failure_kind(), FailureKind::CredentialExpired);
}

#[tokio::test]
async fn wrong_service_key_is_rejected() {
  let s = store().await;
  let err = s
    .list_clients(Access::Privileged(ServiceKey::new("nope")), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidServiceKey));
}

#[tokio::test]
async fn keyless_store_accepts_any_privileged_access() {
  let s = SqliteStore::open_in_memory().await.unwrap();
  let clients = s
    .list_clients(Access::Privileged(ServiceKey::new("anything")), None)
    .await
    .unwrap();
  assert!(clients.is_empty());
}

// ─── Clients ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn restricted_reads_are_scoped_to_owner() {
  let s = store().await;
  let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
  let ta = seed_therapist(&s, alice).await;
  let tb = seed_therapist(&s, bob).await;

  let ca = s.insert_client(restricted(alice), new_client(ta.therapist_id, "Ann")).await.unwrap();
  s.insert_client(restricted(bob), new_client(tb.therapist_id, "Ben")).await.unwrap();

  let visible = s.list_clients(restricted(alice), None).await.unwrap();
  assert_eq!(visible.len(), 1);
  assert_eq!(visible[0].client_id, ca.client_id);

  let all = s.list_clients(privileged(), None).await.unwrap();
  assert_eq!(all.len(), 2);

  let by_therapist = s.list_clients(privileged(), Some(tb.therapist_id)).await.unwrap();
  assert_eq!(by_therapist.len(), 1);
  assert_eq!(by_therapist[0].first_name, "Ben");
}

#[tokio::test]
async fn insert_client_keeps_requested_id() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;
  let wanted = Uuid::new_v4();

  let c = s
    .insert_client(restricted(principal), NewClient::placeholder(Some(wanted), t.therapist_id))
    .await
    .unwrap();
  assert_eq!(c.client_id, wanted);
  assert_eq!(c.status, ClientStatus::New);

  let err = s
    .insert_client(privileged(), NewClient::placeholder(Some(wanted), t.therapist_id))
    .await
    .unwrap_err();
  assert_eq!(err.failure_kind(), FailureKind::Duplicate);
}

#[tokio::test]
async fn insert_client_under_foreign_therapist_is_denied() {
  let s = store().await;
  let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
  seed_therapist(&s, alice).await;
  let tb = seed_therapist(&s, bob).await;

  let err = s
    .insert_client(restricted(alice), new_client(tb.therapist_id, "Eve"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PolicyDenied { entity: "client", .. }), "got {err:?}");
}

#[tokio::test]
async fn insert_client_for_unknown_therapist_is_missing_reference() {
  let s = store().await;
  let err = s
    .insert_client(privileged(), new_client(Uuid::new_v4(), "Nobody"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::MissingReference(_)), "got {err:?}");
}

#[tokio::test]
async fn update_client_applies_patch() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;
  let c = s.insert_client(restricted(principal), new_client(t.therapist_id, "Ann")).await.unwrap();

  let updated = s
    .update_client(restricted(principal), c.client_id, ClientPatch {
      status: Some(ClientStatus::Active),
      phone: Some("555-0100".into()),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.status, ClientStatus::Active);
  assert_eq!(updated.phone.as_deref(), Some("555-0100"));
  assert_eq!(updated.first_name, "Ann");
  assert!(updated.updated_at >= c.updated_at);

  let missing = s
    .update_client(privileged(), Uuid::new_v4(), ClientPatch::default())
    .await
    .unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn foreign_delete_is_denied_and_row_survives() {
  let s = store().await;
  let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
  let ta = seed_therapist(&s, alice).await;
  let c = s.insert_client(restricted(alice), new_client(ta.therapist_id, "Ann")).await.unwrap();

  let err = s.delete_client(restricted(bob), c.client_id).await.unwrap_err();
  assert_eq!(err.failure_kind(), FailureKind::PolicyDenied);
  assert!(s.get_client(privileged(), c.client_id).await.unwrap().is_some());
}

#[tokio::test]
async fn delete_client_cascades() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;
  let c = s.insert_client(privileged(), new_client(t.therapist_id, "Ann")).await.unwrap();

  s.upsert_client_profile(privileged(), c.client_id, ProfileDetails::default())
    .await
    .unwrap();
  let session = s
    .insert_session(privileged(), NewSession::synthesized(c.client_id, t.therapist_id))
    .await
    .unwrap();
  s.insert_session_note(privileged(), NewSessionNote {
    session_id:   session.session_id,
    client_id:    c.client_id,
    therapist_id: t.therapist_id,
    title:        "Intake".into(),
    content:      StructuredContent::default(),
    therapy_type: None,
    tags:         vec![],
  })
  .await
  .unwrap();

  assert!(s.delete_client(restricted(principal), c.client_id).await.unwrap());
  assert!(s.get_client(privileged(), c.client_id).await.unwrap().is_none());
  assert!(s.get_client_profile(privileged(), c.client_id).await.unwrap().is_none());
  assert!(s.list_sessions(privileged(), Some(c.client_id)).await.unwrap().is_empty());
  assert!(s.list_session_notes(privileged(), Some(c.client_id)).await.unwrap().is_empty());

  // Second delete finds nothing.
  assert!(!s.delete_client(privileged(), c.client_id).await.unwrap());
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn profile_upsert_replaces_details() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;
  let c = s.insert_client(privileged(), new_client(t.therapist_id, "Ann")).await.unwrap();

  let first = s
    .upsert_client_profile(restricted(principal), c.client_id, ProfileDetails {
      diagnosis: Some("GAD".into()),
      medications: vec!["sertraline".into()],
      ..Default::default()
    })
    .await
    .unwrap();

  let second = s
    .upsert_client_profile(restricted(principal), c.client_id, ProfileDetails {
      diagnosis: Some("MDD".into()),
      date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 4, 2),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(first.profile_id, second.profile_id);
  assert_eq!(second.details.diagnosis.as_deref(), Some("MDD"));
  assert!(second.details.medications.is_empty());

  let fetched = s.get_client_profile(restricted(principal), c.client_id).await.unwrap().unwrap();
  assert_eq!(fetched.details, second.details);
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sessions_listed_newest_first() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;
  let c = s.insert_client(privileged(), new_client(t.therapist_id, "Ann")).await.unwrap();

  let mut older = NewSession::synthesized(c.client_id, t.therapist_id);
  older.session_date = Utc::now() - Duration::days(7);
  older.duration_minutes = 50;
  let older = s.insert_session(restricted(principal), older).await.unwrap();
  let newer = s
    .insert_session(restricted(principal), NewSession::synthesized(c.client_id, t.therapist_id))
    .await
    .unwrap();

  let listed = s.list_sessions(restricted(principal), Some(c.client_id)).await.unwrap();
  let ids: Vec<_> = listed.iter().map(|x| x.session_id).collect();
  assert_eq!(ids, vec![newer.session_id, older.session_id]);
  assert_eq!(listed[1].duration_minutes, 50);
}

#[tokio::test]
async fn session_status_update() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;
  let c = s.insert_client(privileged(), new_client(t.therapist_id, "Ann")).await.unwrap();
  let session = s
    .insert_session(privileged(), NewSession::synthesized(c.client_id, t.therapist_id))
    .await
    .unwrap();

  let updated = s
    .update_session_status(restricted(principal), session.session_id, SessionStatus::NoShow)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.status, SessionStatus::NoShow);

  let err = s
    .update_session_status(restricted(Uuid::new_v4()), session.session_id, SessionStatus::Canceled)
    .await
    .unwrap_err();
  assert_eq!(err.failure_kind(), FailureKind::PolicyDenied);
}

// ─── Notes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn note_content_and_tags_persist() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;
  let c = s.insert_client(privileged(), new_client(t.therapist_id, "Ann")).await.unwrap();
  let session = s
    .insert_session(privileged(), NewSession::synthesized(c.client_id, t.therapist_id))
    .await
    .unwrap();

  let content = StructuredContent {
    summary: "check-in".into(),
    body: "slept better".into(),
    sections: vec![],
  };
  let note = s
    .insert_session_note(restricted(principal), NewSessionNote {
      session_id:   session.session_id,
      client_id:    c.client_id,
      therapist_id: t.therapist_id,
      title:        "Week 2".into(),
      content:      content.clone(),
      therapy_type: Some("CBT".into()),
      tags:         vec!["sleep".into(), "progress".into()],
    })
    .await
    .unwrap();

  let fetched = s.get_session_note(restricted(principal), note.note_id).await.unwrap().unwrap();
  assert_eq!(fetched.content, content);
  assert_eq!(fetched.tags, vec!["sleep".to_string(), "progress".to_string()]);
  assert!(s.get_session_note(restricted(Uuid::new_v4()), note.note_id).await.unwrap().is_none());
}

#[tokio::test]
async fn note_for_missing_session_names_the_parent() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;
  let c = s.insert_client(privileged(), new_client(t.therapist_id, "Ann")).await.unwrap();

  let err = s
    .insert_session_note(privileged(), NewSessionNote {
      session_id:   Uuid::new_v4(),
      client_id:    c.client_id,
      therapist_id: t.therapist_id,
      title:        "Orphan".into(),
      content:      StructuredContent::default(),
      therapy_type: None,
      tags:         vec![],
    })
    .await
    .unwrap_err();
  let Error::MissingReference(msg) = err else { panic!("got {err:?}") };
  assert!(msg.starts_with("session referenced by session note"), "{msg}");
}

// ─── Goals and metrics ───────────────────────────────────────────────────────

#[tokio::test]
async fn goals_and_metrics_are_scoped_and_ordered() {
  let s = store().await;
  let principal = Uuid::new_v4();
  let t = seed_therapist(&s, principal).await;
  let c = s.insert_client(privileged(), new_client(t.therapist_id, "Ann")).await.unwrap();

  let goal = s
    .insert_treatment_goal(restricted(principal), NewTreatmentGoal {
      client_id:   c.client_id,
      title:       "Reduce panic attacks".into(),
      description: None,
      target_date: None,
      status:      GoalStatus::InProgress,
    })
    .await
    .unwrap();

  s.insert_progress_metric(restricted(principal), NewProgressMetric {
    client_id:   c.client_id,
    goal_id:     Some(goal.goal_id),
    metric_name: "GAD-7".into(),
    value:       14.0,
    notes:       None,
    recorded_at: Some(Utc::now() - Duration::days(14)),
  })
  .await
  .unwrap();
  s.insert_progress_metric(restricted(principal), NewProgressMetric {
    client_id:   c.client_id,
    goal_id:     Some(goal.goal_id),
    metric_name: "GAD-7".into(),
    value:       9.0,
    notes:       Some("improving".into()),
    recorded_at: None,
  })
  .await
  .unwrap();

  let metrics = s.list_progress_metrics(restricted(principal), c.client_id).await.unwrap();
  let values: Vec<f64> = metrics.iter().map(|m| m.value).collect();
  assert_eq!(values, vec![14.0, 9.0]);

  let goals = s.list_treatment_goals(restricted(principal), c.client_id).await.unwrap();
  assert_eq!(goals.len(), 1);
  assert_eq!(goals[0].status, GoalStatus::InProgress);

  let stranger = restricted(Uuid::new_v4());
  assert!(s.list_progress_metrics(stranger.clone(), c.client_id).await.unwrap().is_empty());
  assert!(s.get_treatment_goal(stranger, goal.goal_id).await.unwrap().is_none());
}
