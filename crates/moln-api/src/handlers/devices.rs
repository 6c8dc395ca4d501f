//! Handlers for `/devices` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/devices` | Body: `{"name":"phone"}`; returns the new token |
//! | `GET`    | `/devices` | Ordered by name |
//! | `GET`    | `/devices/{name}` | 404 if not found |
//! | `DELETE` | `/devices/{name}` | Revokes the token |

use axum::{
  extract::{Path, State},
  http::StatusCode,
};
use moln_core::{
  record::{Device, NewDevice},
  store::KeyValueStore,
};

use crate::{
  AppState,
  auth::CurrentUser,
  error::{ApiError, Json},
};

/// `POST /devices`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Json(input): Json<NewDevice>,
) -> Result<(StatusCode, Json<Device>), ApiError>
where
  S: KeyValueStore + 'static,
{
  let device = state.repo.create_device(&user, input).await?;
  Ok((StatusCode::CREATED, Json(device)))
}

/// `GET /devices`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Device>>, ApiError>
where
  S: KeyValueStore + 'static,
{
  Ok(Json(state.repo.list_devices(&user.name).await?))
}

/// `GET /devices/{name}`
pub async fn show<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(name): Path<String>,
) -> Result<Json<Device>, ApiError>
where
  S: KeyValueStore + 'static,
{
  let device = state
    .repo
    .get_device(&user.name, &name)
    .await?
    .ok_or(ApiError::NotFound)?;
  Ok(Json(device))
}

/// `DELETE /devices/{name}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(name): Path<String>,
) -> Result<Json<Device>, ApiError>
where
  S: KeyValueStore + 'static,
{
  let device = state
    .repo
    .get_device(&user.name, &name)
    .await?
    .ok_or(ApiError::NotFound)?;
  state.repo.delete_device(&device).await?;
  Ok(Json(device))
}
