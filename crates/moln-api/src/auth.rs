//! Token and HTTP Basic authentication.
//!
//! A request authenticates with either:
//!
//! - `Authorization: Token <token>` (or a `?token=` query parameter, which
//!   wins over the header), resolved through the token index;
//! - `Authorization: Basic <base64(user:password)>`, verified against the
//!   stored password digest. A wrong password is recorded as an
//!   `"Invalid login attempt"` activity on the targeted account.

use axum::{
  extract::{FromRequestParts, Query},
  http::{HeaderMap, Uri, header, request::Parts},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use moln_core::{
  Repository,
  password,
  record::{NewActivity, User},
  store::KeyValueStore,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::{AppState, error::ApiError};

/// Activity message recorded on a failed Basic login.
pub const INVALID_LOGIN: &str = "Invalid login attempt";

/// Why a request carrying credentials was not authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
  #[error("Authentication: authorization header value missing")]
  NoAuthorizationValue,
  #[error("Authentication: authorization header password missing")]
  NoAuthorizationPassword,
  #[error("Authentication: token does not exist")]
  TokenNotFound,
  #[error("Unauthorized")]
  UserNotFound,
  #[error("Unauthorized")]
  Unauthorized,
}

/// The scheme a challenge is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
  Token,
  Basic,
}

impl Scheme {
  /// The `WWW-Authenticate` value for `realm`.
  pub fn challenge(self, realm: &str) -> String {
    let scheme = match self {
      Scheme::Token => "Token",
      Scheme::Basic => "Basic",
    };
    format!("{scheme} realm=\"{realm}\"")
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
  /// No credentials at all.
  Unauthenticated,
  Token(User),
  Basic(User),
  Failed { reason: AuthFailure, scheme: Scheme },
}

impl Authentication {
  fn failed(reason: AuthFailure, scheme: Scheme) -> Self {
    Self::Failed { reason, scheme }
  }
}

/// Authenticate from the raw `Authorization` header value and an
/// out-of-band token.
///
/// Only store and hashing failures are errors; every credential problem is
/// an [`Authentication`] outcome.
pub async fn authenticate<S: KeyValueStore>(
  repo: &Repository<S>,
  authorization: Option<&str>,
  oob_token: Option<&str>,
) -> moln_core::Result<Authentication> {
  if let Some(token) = oob_token.filter(|t| !t.is_empty()) {
    return by_token(repo, token).await;
  }

  let Some(authorization) = authorization.map(str::trim).filter(|a| !a.is_empty())
  else {
    return Ok(Authentication::Unauthenticated);
  };

  let (scheme, credential) = authorization
    .split_once(char::is_whitespace)
    .map_or((authorization, ""), |(s, c)| (s, c.trim()));
  let scheme = match scheme.to_ascii_lowercase().as_str() {
    "token" => Some(Scheme::Token),
    "basic" => Some(Scheme::Basic),
    _ => None,
  };

  // A missing value is reported before the scheme is judged.
  let Some(credential) = credential.split_whitespace().next() else {
    return Ok(Authentication::failed(
      AuthFailure::NoAuthorizationValue,
      scheme.unwrap_or(Scheme::Token),
    ));
  };
  let Some(scheme) = scheme else {
    return Ok(Authentication::failed(AuthFailure::Unauthorized, Scheme::Token));
  };

  match scheme {
    Scheme::Token => by_token(repo, credential).await,
    Scheme::Basic => by_basic(repo, credential).await,
  }
}

async fn by_token<S: KeyValueStore>(
  repo: &Repository<S>,
  value: &str,
) -> moln_core::Result<Authentication> {
  let not_found = Authentication::failed(AuthFailure::TokenNotFound, Scheme::Token);
  let Some(token) = repo.resolve_token(value).await? else {
    return Ok(not_found);
  };
  // A token whose owner is gone is as good as missing.
  Ok(match repo.get_user(&token.user).await? {
    Some(user) => Authentication::Token(user),
    None => not_found,
  })
}

async fn by_basic<S: KeyValueStore>(
  repo: &Repository<S>,
  credential: &str,
) -> moln_core::Result<Authentication> {
  let rejected = Authentication::failed(AuthFailure::Unauthorized, Scheme::Basic);
  let Ok(decoded) = B64.decode(credential) else {
    return Ok(rejected);
  };
  let Ok(decoded) = String::from_utf8(decoded) else {
    return Ok(rejected);
  };

  let (name, plain) = decoded.split_once(':').unwrap_or((decoded.as_str(), ""));
  if plain.is_empty() {
    return Ok(Authentication::failed(
      AuthFailure::NoAuthorizationPassword,
      Scheme::Basic,
    ));
  }

  let Some(user) = repo.get_user(name).await? else {
    return Ok(Authentication::failed(AuthFailure::UserNotFound, Scheme::Basic));
  };

  if password::verify(plain, &user.password)? {
    return Ok(Authentication::Basic(user));
  }

  warn!(user = %user.name, "invalid login attempt");
  repo
    .record_activity(&user.name, NewActivity { message: INVALID_LOGIN.to_owned() })
    .await?;
  Ok(rejected)
}

// ─── Extractor ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TokenQuery {
  token: Option<String>,
}

/// Authenticate a request from its headers and URI, turning every failed
/// outcome into a 401 with the matching challenge.
pub async fn require_user<S: KeyValueStore>(
  state: &AppState<S>,
  headers: &HeaderMap,
  uri: &Uri,
) -> Result<User, ApiError> {
  let authorization = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok());
  let oob_token = Query::<TokenQuery>::try_from_uri(uri)
    .ok()
    .and_then(|Query(q)| q.token);

  let (reason, scheme) =
    match authenticate(&state.repo, authorization, oob_token.as_deref()).await? {
      Authentication::Token(user) | Authentication::Basic(user) => return Ok(user),
      Authentication::Unauthenticated => (AuthFailure::Unauthorized, Scheme::Token),
      Authentication::Failed { reason, scheme } => (reason, scheme),
    };

  let realm = headers
    .get(header::HOST)
    .and_then(|v| v.to_str().ok())
    .unwrap_or(&state.config.host);
  Err(ApiError::Unauthenticated { reason, challenge: scheme.challenge(realm) })
}

/// The authenticated user. Rejects with 401 and a challenge otherwise.
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<AppState<S>> for CurrentUser
where
  S: KeyValueStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    require_user(state, &parts.headers, &parts.uri).await.map(CurrentUser)
  }
}
