//! Handlers for `/tasks` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/tasks` | Body: `{"message":..,"category":..}` |
//! | `GET`    | `/tasks` | Ordered by id |
//! | `GET`    | `/tasks/{id}` | 404 if not found |
//! | `PUT`    | `/tasks/{id}` | Partial update; absent fields are kept |
//! | `DELETE` | `/tasks/{id}` | |

use axum::{
  extract::{Path, State},
  http::StatusCode,
};
use moln_core::{
  record::{NewTask, Task, TaskUpdate},
  store::KeyValueStore,
};

use crate::{
  AppState,
  auth::CurrentUser,
  error::{ApiError, Json},
};

/// Load a task of `user` by its path segment. Ids that do not parse name no
/// task at all.
async fn find<S: KeyValueStore>(
  state: &AppState<S>,
  user: &str,
  id: &str,
) -> Result<Task, ApiError> {
  let id: u64 = id.parse().map_err(|_| ApiError::NotFound)?;
  state.repo.get_task(user, id).await?.ok_or(ApiError::NotFound)
}

/// `POST /tasks`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError>
where
  S: KeyValueStore + 'static,
{
  let task = state.repo.create_task(&user.name, input).await?;
  Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /tasks`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Task>>, ApiError>
where
  S: KeyValueStore + 'static,
{
  Ok(Json(state.repo.list_tasks(&user.name).await?))
}

/// `GET /tasks/{id}`
pub async fn show<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<Task>, ApiError>
where
  S: KeyValueStore + 'static,
{
  Ok(Json(find(&state, &user.name, &id).await?))
}

/// `PUT /tasks/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
  Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>, ApiError>
where
  S: KeyValueStore + 'static,
{
  let task = find(&state, &user.name, &id).await?;
  Ok(Json(state.repo.update_task(task, update).await?))
}

/// `DELETE /tasks/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<String>,
) -> Result<Json<Task>, ApiError>
where
  S: KeyValueStore + 'static,
{
  let task = find(&state, &user.name, &id).await?;
  state.repo.delete_task(&task).await?;
  Ok(Json(task))
}
