//! JSON HTTP API for Moln.
//!
//! Exposes an axum [`Router`] for accounts, devices, tasks and activity logs,
//! backed by a [`Repository`] over any [`KeyValueStore`].

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;

pub use config::ServerConfig;
pub use error::ApiError;

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  extract::Request,
  http::{StatusCode, Uri},
  response::IntoResponse,
  routing::{get, post},
};
use moln_core::{Repository, store::KeyValueStore};
use serde_json::json;
use tower::Layer as _;
use tower_http::{
  normalize_path::{NormalizePath, NormalizePathLayer},
  timeout::TimeoutLayer,
  trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use handlers::{activities, devices, tasks, users};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub repo:   Repository<S>,
  pub config: Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { repo: self.repo.clone(), config: self.config.clone() }
  }
}

impl<S: KeyValueStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self {
      repo:   Repository::new(Arc::new(store)),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API [`Router`]: every route, the JSON 404 fallback, request
/// tracing and the request timeout.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: KeyValueStore + 'static,
{
  let timeout = Duration::from_secs(state.config.request_timeout_secs);

  Router::new()
    .route("/health", get(health))
    // Account
    .route(
      "/user",
      post(users::create::<S>)
        .get(users::show)
        .put(users::update::<S>)
        .delete(users::delete::<S>),
    )
    // Devices
    .route("/devices", get(devices::list::<S>).post(devices::create::<S>))
    .route(
      "/devices/{name}",
      get(devices::show::<S>).delete(devices::delete::<S>),
    )
    // Tasks
    .route("/tasks", get(tasks::list::<S>).post(tasks::create::<S>))
    .route(
      "/tasks/{id}",
      get(tasks::show::<S>)
        .put(tasks::update::<S>)
        .delete(tasks::delete::<S>),
    )
    // Activities
    .route(
      "/activities",
      get(activities::list::<S>).post(activities::create::<S>),
    )
    .route("/users/{name}/activities", get(activities::list_for::<S>))
    .fallback(not_found)
    .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
          tracing::info_span!(
            "request",
            method = %req.method(),
            uri = %redact_uri(req.uri()),
          )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    .with_state(state)
}

/// [`router`] behind trailing-slash normalisation, ready to serve.
///
/// Normalisation has to wrap the router from the outside: a layer added with
/// [`Router::layer`] only runs once a route has already been matched.
pub fn app<S>(state: AppState<S>) -> NormalizePath<Router>
where
  S: KeyValueStore + 'static,
{
  NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

async fn health() -> impl IntoResponse {
  axum::Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn not_found() -> ApiError { ApiError::NotFound }

/// Render `uri` for the access log with `token` and `password` query values
/// masked.
fn redact_uri(uri: &Uri) -> String {
  let Some(query) = uri.query() else {
    return uri.path().to_owned();
  };
  let query = query
    .split('&')
    .map(|pair| {
      let key = pair.split_once('=').map_or(pair, |(k, _)| k);
      match key {
        "token" | "password" => format!("{key}=[{key}]"),
        _ => pair.to_owned(),
      }
    })
    .collect::<Vec<_>>()
    .join("&");
  format!("{}?{query}", uri.path())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{body::Body, http::header};
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use moln_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState::new(store, ServerConfig::default())
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    &str,
  ) -> axum::response::Response {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    if !body.is_empty() {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    app(state).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  /// Sign up `alice` / `secret` and return her Basic header.
  async fn signup(state: &AppState<SqliteStore>) -> String {
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/user",
      vec![],
      r#"{"name":"Alice","password":"secret"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    basic("alice", "secret")
  }

  // ── Plumbing ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_reports_version() {
    let resp = oneshot_raw(make_state().await, "GET", "/health", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
  }

  #[tokio::test]
  async fn unknown_route_is_json_404() {
    let resp = oneshot_raw(make_state().await, "GET", "/nope", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await, json!({ "error": "Not Found" }));
  }

  #[tokio::test]
  async fn trailing_slash_is_ignored() {
    let resp = oneshot_raw(make_state().await, "GET", "/health/", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[test]
  fn redacts_secret_query_values() {
    let uri: Uri = "/tasks?token=abc&x=1&password=hunter2".parse().unwrap();
    assert_eq!(
      redact_uri(&uri),
      "/tasks?token=[token]&x=1&password=[password]"
    );
    let uri: Uri = "/tasks".parse().unwrap();
    assert_eq!(redact_uri(&uri), "/tasks");
  }

  // ── Users ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn signup_hides_password_and_rejects_duplicates() {
    let state = make_state().await;
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/user",
      vec![],
      r#"{"name":"Alice","password":"secret"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(json_body(resp).await, json!({ "name": "alice" }));

    let resp = oneshot_raw(
      state,
      "POST",
      "/user",
      vec![],
      r#"{"name":"alice","password":"other"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
      json_body(resp).await,
      json!({ "errors": ["User: name already exists"] })
    );
  }

  #[tokio::test]
  async fn empty_signup_lists_every_error() {
    let resp = oneshot_raw(make_state().await, "POST", "/user", vec![], "{}").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
      json_body(resp).await,
      json!({ "errors": ["User: name cannot be empty", "User: password cannot be empty"] })
    );
  }

  #[tokio::test]
  async fn malformed_body_is_400() {
    let resp = oneshot_raw(make_state().await, "POST", "/user", vec![], "{not json").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());
  }

  #[tokio::test]
  async fn missing_credentials_get_token_challenge() {
    let resp = oneshot_raw(
      make_state().await,
      "GET",
      "/user",
      vec![(header::HOST, "moln.example")],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      resp.headers()[header::WWW_AUTHENTICATE],
      "Token realm=\"moln.example\""
    );
  }

  #[tokio::test]
  async fn wrong_password_gets_basic_challenge_and_is_logged() {
    let state = make_state().await;
    signup(&state).await;

    let wrong = basic("alice", "nope");
    let resp = oneshot_raw(
      state.clone(),
      "GET",
      "/user",
      vec![(header::AUTHORIZATION, wrong.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let challenge = resp.headers()[header::WWW_AUTHENTICATE].to_str().unwrap();
    assert!(challenge.starts_with("Basic realm="), "{challenge}");

    let activities = state.repo.list_activities("alice").await.unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].message, "Invalid login attempt");
  }

  #[tokio::test]
  async fn password_change_takes_effect() {
    let state = make_state().await;
    let old = signup(&state).await;

    let resp = oneshot_raw(
      state.clone(),
      "PUT",
      "/user",
      vec![(header::AUTHORIZATION, old.as_str())],
      r#"{"password":"changed"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let new = basic("alice", "changed");
    let resp = oneshot_raw(
      state,
      "GET",
      "/user",
      vec![(header::AUTHORIZATION, new.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn delete_user_revokes_device_tokens() {
    let state = make_state().await;
    let auth = signup(&state).await;

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/devices",
      vec![(header::AUTHORIZATION, auth.as_str())],
      r#"{"name":"phone"}"#,
    )
    .await;
    let token = json_body(resp).await["token"].as_str().unwrap().to_owned();

    let resp = oneshot_raw(
      state.clone(),
      "DELETE",
      "/user",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = oneshot_raw(
      state,
      "GET",
      &format!("/user?token={token}"),
      vec![],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  // ── Devices ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn device_token_authenticates() {
    let state = make_state().await;
    let auth = signup(&state).await;

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/devices",
      vec![(header::AUTHORIZATION, auth.as_str())],
      r#"{"name":"phone"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let device = json_body(resp).await;
    assert_eq!(device["name"], "phone");
    let token = format!("Token {}", device["token"].as_str().unwrap());

    let resp = oneshot_raw(
      state.clone(),
      "GET",
      "/user",
      vec![(header::AUTHORIZATION, token.as_str())],
      "",
    )
    .await;
    assert_eq!(json_body(resp).await, json!({ "name": "alice" }));

    let resp = oneshot_raw(
      state.clone(),
      "DELETE",
      "/devices/phone",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = oneshot_raw(
      state,
      "GET",
      "/devices/phone",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Tasks ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn task_lifecycle() {
    let state = make_state().await;
    let auth = signup(&state).await;
    let headers = || vec![(header::AUTHORIZATION, auth.as_str())];

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/tasks",
      headers(),
      r#"{"message":"buy milk","category":"home"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let task = json_body(resp).await;
    assert_eq!(task["id"], 1);
    assert_eq!(task["complete"], false);

    let resp = oneshot_raw(
      state.clone(),
      "PUT",
      "/tasks/1",
      headers(),
      r#"{"complete":true}"#,
    )
    .await;
    let task = json_body(resp).await;
    assert_eq!(task["complete"], true);
    assert_eq!(task["message"], "buy milk");

    let resp =
      oneshot_raw(state.clone(), "DELETE", "/tasks/1", headers(), "").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/tasks",
      headers(),
      r#"{"message":"second"}"#,
    )
    .await;
    assert_eq!(json_body(resp).await["id"], 2);

    let resp = oneshot_raw(state.clone(), "GET", "/tasks", headers(), "").await;
    let tasks = json_body(resp).await;
    assert_eq!(tasks.as_array().unwrap().len(), 1);

    let resp = oneshot_raw(state, "GET", "/tasks/abc", headers(), "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn empty_task_message_is_rejected() {
    let state = make_state().await;
    let auth = signup(&state).await;
    let resp = oneshot_raw(
      state,
      "POST",
      "/tasks",
      vec![(header::AUTHORIZATION, auth.as_str())],
      r#"{"message":""}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
      json_body(resp).await,
      json!({ "errors": ["Task: message cannot be empty"] })
    );
  }

  // ── Activities ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unknown_named_log_skips_authentication() {
    let state = make_state().await;
    signup(&state).await;

    let wrong = basic("alice", "nope");
    let resp = oneshot_raw(
      state.clone(),
      "GET",
      "/users/ghost/activities",
      vec![(header::AUTHORIZATION, wrong.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(state.repo.list_activities("alice").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn named_activity_log_checks_existence_then_ownership() {
    let state = make_state().await;
    let auth = signup(&state).await;
    oneshot_raw(
      state.clone(),
      "POST",
      "/user",
      vec![],
      r#"{"name":"bob","password":"pw"}"#,
    )
    .await;

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/activities",
      vec![(header::AUTHORIZATION, auth.as_str())],
      r#"{"message":"synced"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp =
      oneshot_raw(state.clone(), "GET", "/users/ghost/activities", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp =
      oneshot_raw(state.clone(), "GET", "/users/alice/activities", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = oneshot_raw(
      state.clone(),
      "GET",
      "/users/bob/activities",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = oneshot_raw(
      state,
      "GET",
      "/users/Alice/activities",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let activities = json_body(resp).await;
    assert_eq!(activities[0]["message"], "synced");
  }
}
