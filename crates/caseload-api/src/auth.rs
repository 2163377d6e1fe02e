//! HTTP Basic-auth extractor and the credential issuer behind it.

use std::{convert::Infallible, sync::Arc};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use caseload_core::{
  principal::{AuthProvider, PrincipalContext},
  store::RecordStore,
};
use chrono::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::{AppState, PrincipalEntry, error::ApiError};

/// Principals accepted by this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub principals:     Vec<PrincipalEntry>,
  /// Lifetime of the credential issued for each verified request.
  pub credential_ttl: Duration,
}

impl AuthConfig {
  fn find(&self, username: &str) -> Option<&PrincipalEntry> {
    let id = Uuid::parse_str(username).ok();
    self.principals.iter().find(|p| {
      Some(p.id) == id || p.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(username))
    })
  }

  fn issue(&self, entry: &PrincipalEntry) -> PrincipalContext {
    PrincipalContext::issue(entry.id, entry.email.clone(), self.credential_ttl)
  }
}

/// Verify Basic credentials and issue a context for the matching principal.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<PrincipalContext, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let Some(entry) = config.find(username) else {
    debug!(username, "unknown principal");
    return Err(ApiError::Unauthorized);
  };

  let parsed_hash =
    PasswordHash::new(&entry.password_hash).map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(config.issue(entry))
}

/// The verified caller.
pub struct Authenticated(pub PrincipalContext);

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: RecordStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth).map(Authenticated)
  }
}

// ─── Auth provider ───────────────────────────────────────────────────────────

/// Stateless [`AuthProvider`]: the principal arrives with each request, so
/// there is no ambient session, and a refresh re-issues a credential for any
/// principal that is still configured.
pub struct IssuingAuth {
  config: Arc<AuthConfig>,
}

impl IssuingAuth {
  pub fn new(config: Arc<AuthConfig>) -> Self { Self { config } }
}

impl AuthProvider for IssuingAuth {
  type Error = Infallible;

  async fn get_session(&self) -> Result<Option<PrincipalContext>, Self::Error> { Ok(None) }

  async fn refresh_session(
    &self,
    current: PrincipalContext,
  ) -> Result<Option<PrincipalContext>, Self::Error> {
    let id = current.principal_id();
    Ok(
      self
        .config
        .principals
        .iter()
        .find(|p| p.id == id)
        .map(|entry| self.config.issue(entry)),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::{Request, header};
  use rand_core::OsRng;

  fn alice() -> Uuid { Uuid::from_u128(0xA11CE) }

  fn make_config(password: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig {
      principals:     vec![PrincipalEntry {
        id:            alice(),
        email:         Some("alice@example.org".to_string()),
        password_hash: hash,
      }],
      credential_ttl: Duration::minutes(30),
    }
  }

  fn headers(value: &str) -> HeaderMap {
    let req = Request::builder()
      .header(header::AUTHORIZATION, value)
      .body(())
      .unwrap();
    req.headers().clone()
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[test]
  fn correct_credentials_issue_a_context() {
    let config = make_config("secret");
    let ctx = verify_auth(&headers(&basic(&alice().to_string(), "secret")), &config).unwrap();
    assert_eq!(ctx.principal_id(), alice());
    assert_eq!(ctx.email.as_deref(), Some("alice@example.org"));
    assert!(!ctx.credential.is_expired_at(chrono::Utc::now()));
  }

  #[test]
  fn email_works_as_username() {
    let config = make_config("secret");
    let ctx = verify_auth(&headers(&basic("Alice@Example.org", "secret")), &config).unwrap();
    assert_eq!(ctx.principal_id(), alice());
  }

  #[test]
  fn wrong_password() {
    let config = make_config("secret");
    let res = verify_auth(&headers(&basic(&alice().to_string(), "wrong")), &config);
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[test]
  fn unknown_principal() {
    let config = make_config("secret");
    let res = verify_auth(&headers(&basic(&Uuid::new_v4().to_string(), "secret")), &config);
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let config = make_config("secret");
    assert!(matches!(verify_auth(&HeaderMap::new(), &config), Err(ApiError::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let config = make_config("secret");
    let res = verify_auth(&headers("Basic !!!not-base64!!!"), &config);
    assert!(matches!(res, Err(ApiError::Unauthorized)));
  }

  #[tokio::test]
  async fn refresh_reissues_for_configured_principals_only() {
    let auth = IssuingAuth::new(Arc::new(make_config("secret")));
    assert!(auth.get_session().await.unwrap().is_none());

    let current = PrincipalContext::issue(alice(), None, Duration::seconds(5));
    let renewed = auth.refresh_session(current.clone()).await.unwrap().unwrap();
    assert_eq!(renewed.principal_id(), alice());
    assert_ne!(renewed.credential, current.credential);

    let stranger = PrincipalContext::issue(Uuid::new_v4(), None, Duration::seconds(5));
    assert!(auth.refresh_session(stranger).await.unwrap().is_none());
  }
}
