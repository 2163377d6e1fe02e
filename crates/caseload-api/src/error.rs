//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use caseload_orchestrator::Error as PracticeError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error(transparent)]
  Practice(#[from] PracticeError),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    let ApiError::Practice(e) = self else {
      return StatusCode::UNAUTHORIZED;
    };
    match e {
      PracticeError::AuthenticationRequired | PracticeError::CredentialExpired => {
        StatusCode::UNAUTHORIZED
      }
      PracticeError::Validation(_) => StatusCode::BAD_REQUEST,
      PracticeError::NotFound { .. } => StatusCode::NOT_FOUND,
      PracticeError::PolicyDenied(_) => StatusCode::FORBIDDEN,
      PracticeError::Conflict(_) | PracticeError::ProvisioningExhausted { .. } => {
        StatusCode::CONFLICT
      }
      PracticeError::MissingReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
      PracticeError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      PracticeError::Auth(_) | PracticeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(error = %self, "request failed");
    }
    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"caseload\""),
      );
    }
    res
  }
}
