//! API error type, JSON body extractor and [`IntoResponse`] implementations.

use axum::{
  extract::{FromRequest, rejection::JsonRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use moln_core::validate::ValidationError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthFailure;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// User-fixable problems, reported together.
  #[error("validation failed")]
  Invalid(Vec<ValidationError>),

  #[error("{0}")]
  BadRequest(String),

  #[error("Not Found")]
  NotFound,

  /// Missing or rejected credentials. `challenge` is the
  /// `WWW-Authenticate` value sent back.
  #[error("{reason}")]
  Unauthenticated { reason: AuthFailure, challenge: String },

  #[error("Authorization: user is not authorized to access this page")]
  Forbidden,

  /// Store or hashing failure.
  #[error(transparent)]
  Internal(moln_core::Error),
}

impl From<moln_core::Error> for ApiError {
  fn from(err: moln_core::Error) -> Self {
    match err {
      moln_core::Error::Invalid(errors) => Self::Invalid(errors),
      other => Self::Internal(other),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Invalid(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound => StatusCode::NOT_FOUND,
      ApiError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden => StatusCode::FORBIDDEN,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    match self {
      ApiError::Invalid(errors) => {
        let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
        (status, axum::Json(json!({ "errors": errors }))).into_response()
      }
      ApiError::Unauthenticated { reason, challenge } => {
        let mut res =
          (status, axum::Json(json!({ "error": reason.to_string() }))).into_response();
        if let Ok(value) = HeaderValue::from_str(&challenge) {
          res.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        res
      }
      ApiError::Internal(err) => {
        tracing::error!(error = %err, "request failed");
        (status, axum::Json(json!({ "error": err.to_string() }))).into_response()
      }
      other => (status, axum::Json(json!({ "error": other.to_string() }))).into_response(),
    }
  }
}

// ─── JSON extractor ──────────────────────────────────────────────────────────

/// [`axum::Json`] with body rejections reported as [`ApiError::BadRequest`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
  fn into_response(self) -> Response { axum::Json(self.0).into_response() }
}
