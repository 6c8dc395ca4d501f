//! Handlers for the activity log.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/activities` | Body: `{"message":..}` |
//! | `GET`  | `/activities` | Newest first |
//! | `GET`  | `/users/{name}/activities` | 404 unknown user, 403 someone else's log |

use axum::{
  extract::{Path, State},
  http::{HeaderMap, StatusCode, Uri},
};
use moln_core::{
  record::{Activity, NewActivity},
  repo::normalize_name,
  store::KeyValueStore,
};

use crate::{
  AppState,
  auth::{CurrentUser, require_user},
  error::{ApiError, Json},
};

/// `POST /activities`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Json(input): Json<NewActivity>,
) -> Result<(StatusCode, Json<Activity>), ApiError>
where
  S: KeyValueStore + 'static,
{
  let activity = state.repo.record_activity(&user.name, input).await?;
  Ok((StatusCode::CREATED, Json(activity)))
}

/// `GET /activities`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Activity>>, ApiError>
where
  S: KeyValueStore + 'static,
{
  Ok(Json(state.repo.list_activities(&user.name).await?))
}

/// `GET /users/{name}/activities`
///
/// The named user must exist before credentials are looked at, so a lookup
/// of an unknown user never runs authentication.
pub async fn list_for<S>(
  State(state): State<AppState<S>>,
  Path(name): Path<String>,
  headers: HeaderMap,
  uri: Uri,
) -> Result<Json<Vec<Activity>>, ApiError>
where
  S: KeyValueStore + 'static,
{
  let name = normalize_name(&name);
  if state.repo.get_user(&name).await?.is_none() {
    return Err(ApiError::NotFound);
  }

  let current = require_user(&state, &headers, &uri).await?;
  if current.name != name {
    return Err(ApiError::Forbidden);
  }
  Ok(Json(state.repo.list_activities(&name).await?))
}
