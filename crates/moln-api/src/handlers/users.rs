//! Handlers for the `/user` endpoint: the authenticated account itself.
//!
//! | Method   | Path    | Notes |
//! |----------|---------|-------|
//! | `POST`   | `/user` | Sign up, no auth. Body: `{"name":..,"password":..}` |
//! | `GET`    | `/user` | |
//! | `PUT`    | `/user` | Body: `{"password":..}` |
//! | `DELETE` | `/user` | Removes every device, task and activity too |

use axum::{extract::State, http::StatusCode};
use moln_core::{
  record::{NewUser, User, UserUpdate},
  store::KeyValueStore,
};

use crate::{
  AppState,
  auth::CurrentUser,
  error::{ApiError, Json},
};

/// `POST /user`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError>
where
  S: KeyValueStore + 'static,
{
  let user = state.repo.create_user(input).await?;
  Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /user`
pub async fn show(CurrentUser(user): CurrentUser) -> Json<User> { Json(user) }

/// `PUT /user`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Json(update): Json<UserUpdate>,
) -> Result<Json<User>, ApiError>
where
  S: KeyValueStore + 'static,
{
  let user = state.repo.update_user(user, update).await?;
  Ok(Json(user))
}

/// `DELETE /user`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<User>, ApiError>
where
  S: KeyValueStore + 'static,
{
  state.repo.delete_user(&user.name).await?;
  Ok(Json(user))
}
