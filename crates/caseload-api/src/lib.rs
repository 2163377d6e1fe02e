//! JSON HTTP API for a caseload practice.
//!
//! Exposes an axum [`Router`] over a [`Practice`]. Every route requires HTTP
//! Basic auth; the username is a configured principal id (or its email) and
//! the password is checked against an argon2 hash. A verified request gets a
//! freshly issued [`caseload_core::principal::PrincipalContext`] which is
//! handed to the orchestrated operation.
//!
//! | Method   | Path                      | Operation                 |
//! |----------|---------------------------|---------------------------|
//! | `GET`    | `/therapist`              | ensure therapist          |
//! | `GET`    | `/clients`                | list clients              |
//! | `POST`   | `/clients`                | create client             |
//! | `GET`    | `/clients/{id}`           | get client                |
//! | `PATCH`  | `/clients/{id}`           | update client             |
//! | `DELETE` | `/clients/{id}`           | delete client and profile |
//! | `GET`    | `/clients/{id}/goals`     | list treatment goals      |
//! | `POST`   | `/clients/{id}/goals`     | create treatment goal     |
//! | `GET`    | `/clients/{id}/metrics`   | list progress metrics     |
//! | `POST`   | `/clients/{id}/metrics`   | record progress metric    |
//! | `GET`    | `/sessions[?client_id=]`  | list sessions             |
//! | `POST`   | `/sessions`               | create session            |
//! | `PUT`    | `/sessions/{id}/status`   | update session status     |
//! | `GET`    | `/session-notes[?client_id=]` | list session notes    |
//! | `POST`   | `/session-notes`          | create session note       |

pub mod auth;
pub mod clients;
pub mod error;
pub mod notes;
pub mod progress;
pub mod sessions;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, put},
};
use caseload_core::{access::ServiceKey, store::RecordStore};
use caseload_orchestrator::{Practice, PracticeConfig};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use auth::{AuthConfig, IssuingAuth};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Service-role key for privileged store access. Without one, operations
  /// that need to bypass row-level policy answer 503.
  #[serde(default)]
  pub service_key:         Option<ServiceKey>,
  #[serde(default = "default_credential_ttl")]
  pub credential_ttl_secs: i64,
  #[serde(default = "default_refresh_margin")]
  pub refresh_margin_secs: i64,
  #[serde(default)]
  pub principals:          Vec<PrincipalEntry>,
}

/// One principal allowed to sign in.
#[derive(Deserialize, Clone)]
pub struct PrincipalEntry {
  pub id:            Uuid,
  #[serde(default)]
  pub email:         Option<String>,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

fn default_credential_ttl() -> i64 { 3600 }

fn default_refresh_margin() -> i64 { 300 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: RecordStore> {
  pub practice: Arc<Practice<S, IssuingAuth>>,
  pub auth:     Arc<AuthConfig>,
}

impl<S: RecordStore> AppState<S> {
  pub fn new(store: Arc<S>, config: &ServerConfig) -> Self {
    let auth = Arc::new(AuthConfig {
      principals:     config.principals.clone(),
      credential_ttl: chrono::Duration::seconds(config.credential_ttl_secs),
    });
    let practice = Practice::new(store, Arc::new(IssuingAuth::new(auth.clone())), PracticeConfig {
      service_key:    config.service_key.clone(),
      refresh_margin: chrono::Duration::seconds(config.refresh_margin_secs),
    });
    Self {
      practice: Arc::new(practice),
      auth,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RecordStore + Clone + 'static,
{
  Router::new()
    .route("/therapist", get(clients::therapist::<S>))
    // Clients
    .route("/clients", get(clients::list::<S>).post(clients::create::<S>))
    .route(
      "/clients/{id}",
      get(clients::get_one::<S>)
        .patch(clients::update::<S>)
        .delete(clients::delete_one::<S>),
    )
    // Goals and metrics
    .route(
      "/clients/{id}/goals",
      get(progress::list_goals::<S>).post(progress::create_goal::<S>),
    )
    .route(
      "/clients/{id}/metrics",
      get(progress::list_metrics::<S>).post(progress::record_metric::<S>),
    )
    // Sessions
    .route("/sessions", get(sessions::list::<S>).post(sessions::create::<S>))
    .route("/sessions/{id}/status", put(sessions::set_status::<S>))
    // Notes
    .route("/session-notes", get(notes::list::<S>).post(notes::create::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use caseload_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  const KEY: &str = "api-test-service-key";

  fn principal() -> Uuid { Uuid::from_u128(0xA11CE) }

  fn other_principal() -> Uuid { Uuid::from_u128(0xB0B) }

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory()
      .await
      .unwrap()
      .with_service_key(ServiceKey::new(KEY));
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    let config = ServerConfig {
      host:                "127.0.0.1".to_string(),
      port:                8080,
      store_path:          PathBuf::from(":memory:"),
      service_key:         Some(ServiceKey::new(KEY)),
      credential_ttl_secs: 3600,
      refresh_margin_secs: 300,
      principals:          vec![
        PrincipalEntry {
          id:            principal(),
          email:         Some("alice@example.org".to_string()),
          password_hash: hash.clone(),
        },
        PrincipalEntry {
          id:            other_principal(),
          email:         None,
          password_hash: hash,
        },
      ],
    };
    AppState::new(Arc::new(store), &config)
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn send(
    state: &AppState<SqliteStore>,
    method: &str,
    uri: &str,
    user: Uuid,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::AUTHORIZATION, basic(&user.to_string(), "secret"));
    let req = match body {
      Some(v) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(v.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn create_client(state: &AppState<SqliteStore>, user: Uuid, first: &str) -> Value {
    let (status, body) = send(
      state,
      "POST",
      "/clients",
      user,
      Some(json!({ "first_name": first, "last_name": "Doe" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
  }

  #[tokio::test]
  async fn requests_without_credentials_are_challenged() {
    let state = make_state("secret").await;
    let req = Request::builder().uri("/clients").body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn therapist_is_provisioned_on_first_request() {
    let state = make_state("secret").await;
    let (status, first) = send(&state, "GET", "/therapist", principal(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["principal_id"], principal().to_string());

    let (_, second) = send(&state, "GET", "/therapist", principal(), None).await;
    assert_eq!(first["therapist_id"], second["therapist_id"]);
  }

  #[tokio::test]
  async fn clients_are_created_listed_and_scoped() {
    let state = make_state("secret").await;
    let created = create_client(&state, principal(), "Jane").await;
    create_client(&state, other_principal(), "Sam").await;

    let (status, list) = send(&state, "GET", "/clients", principal(), None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["client_id"], created["client_id"]);

    let uri = format!("/clients/{}", created["client_id"].as_str().unwrap());
    let (status, _) = send(&state, "GET", &uri, other_principal(), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn blank_client_name_is_a_bad_request() {
    let state = make_state("secret").await;
    let (status, body) = send(
      &state,
      "POST",
      "/clients",
      principal(),
      Some(json!({ "first_name": " ", "last_name": "Doe" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("first_name"));
  }

  #[tokio::test]
  async fn missing_client_name_is_a_bad_request() {
    let state = make_state("secret").await;
    let (status, body) =
      send(&state, "POST", "/clients", principal(), Some(json!({ "last_name": "Doe" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("first_name"));
  }

  #[tokio::test]
  async fn other_principals_cannot_change_a_client() {
    let state = make_state("secret").await;
    let created = create_client(&state, principal(), "Jane").await;
    let uri = format!("/clients/{}", created["client_id"].as_str().unwrap());

    let (status, _) = send(
      &state,
      "PATCH",
      &uri,
      other_principal(),
      Some(json!({ "first_name": "Mallory" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, current) = send(&state, "GET", &uri, principal(), None).await;
    assert_eq!(current["first_name"], "Jane");
  }

  #[tokio::test]
  async fn client_patch_and_delete() {
    let state = make_state("secret").await;
    let created = create_client(&state, principal(), "Jane").await;
    let uri = format!("/clients/{}", created["client_id"].as_str().unwrap());

    let (status, updated) =
      send(&state, "PATCH", &uri, principal(), Some(json!({ "status": "active" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "active");
    assert_eq!(updated["first_name"], "Jane");

    let (status, outcome) = send(&state, "DELETE", &uri, principal(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome, json!({ "success": true }));

    let (_, again) = send(&state, "DELETE", &uri, principal(), None).await;
    assert_eq!(again, json!({ "success": false }));
  }

  #[tokio::test]
  async fn session_is_scheduled_and_rescheduled() {
    let state = make_state("secret").await;
    let client_id = Uuid::new_v4();
    let (status, session) = send(
      &state,
      "POST",
      "/sessions",
      principal(),
      Some(json!({
        "client_id": client_id,
        "session_date": "2026-03-02T15:00:00Z",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["client_id"], client_id.to_string());
    assert_eq!(session["duration_minutes"], 60);

    let uri = format!("/sessions/{}/status", session["session_id"].as_str().unwrap());
    let (status, updated) =
      send(&state, "PUT", &uri, principal(), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "completed");

    let (_, list) = send(
      &state,
      "GET",
      &format!("/sessions?client_id={client_id}"),
      principal(),
      None,
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn note_provisions_its_parents() {
    let state = make_state("secret").await;
    let client_id = Uuid::new_v4();
    let missing_session = Uuid::new_v4();
    let (status, note) = send(
      &state,
      "POST",
      "/session-notes",
      principal(),
      Some(json!({
        "client_id": client_id,
        "therapist_id": Uuid::new_v4(),
        "session_id": missing_session,
        "title": "Intake",
        "content": "First meeting.",
        "tags": ["intake", " intake "],
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(note["client_id"], client_id.to_string());
    assert_ne!(note["session_id"], missing_session.to_string());
    assert_eq!(note["tags"], json!(["intake"]));

    let (_, notes) = send(&state, "GET", "/session-notes", principal(), None).await;
    assert_eq!(notes.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn note_without_title_is_rejected() {
    let state = make_state("secret").await;
    let (status, _) = send(
      &state,
      "POST",
      "/session-notes",
      principal(),
      Some(json!({
        "client_id": Uuid::new_v4(),
        "therapist_id": Uuid::new_v4(),
        "title": "",
        "content": "text",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
      &state,
      "POST",
      "/session-notes",
      principal(),
      Some(json!({
        "client_id": Uuid::new_v4(),
        "therapist_id": Uuid::new_v4(),
        "content": "text",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("title"));
  }

  #[tokio::test]
  async fn goals_and_metrics_round_trip() {
    let state = make_state("secret").await;
    let created = create_client(&state, principal(), "Jane").await;
    let id = created["client_id"].as_str().unwrap();

    let (status, goal) = send(
      &state,
      "POST",
      &format!("/clients/{id}/goals"),
      principal(),
      Some(json!({ "title": "Sleep through the night" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(goal["status"], "not_started");

    let (status, _) = send(
      &state,
      "POST",
      &format!("/clients/{id}/metrics"),
      principal(),
      Some(json!({ "goal_id": goal["goal_id"], "metric_name": "PHQ-9", "value": 12.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, goals) = send(&state, "GET", &format!("/clients/{id}/goals"), principal(), None).await;
    assert_eq!(goals.as_array().unwrap().len(), 1);
    let (_, metrics) =
      send(&state, "GET", &format!("/clients/{id}/metrics"), principal(), None).await;
    assert_eq!(metrics[0]["metric_name"], "PHQ-9");

    let (status, _) = send(
      &state,
      "POST",
      &format!("/clients/{id}/goals"),
      other_principal(),
      Some(json!({ "title": "Not yours" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
