//! [`Repository`]: records and their secondary indexes over a
//! [`KeyValueStore`].
//!
//! Write order is fixed for every record type:
//!
//! - save: primary hash first, then index entries (sets, lists, the token
//!   hash), so a failure halfway leaves an index entry pointing at nothing
//!   rather than a record no index can reach;
//! - delete: dependent sub-records first (a device's token, a user's
//!   children), then the primary hash, then the index entry.
//!
//! The store offers no multi-key transactions. Uniqueness checks are plain
//! existence checks followed by a write, so two concurrent creates of the
//! same name can both pass validation.

use std::sync::{
  Arc,
  atomic::{AtomicI64, Ordering},
};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::{
  Error, Result, keys, password,
  record::{
    Activity, Device, HashRecord, NewActivity, NewDevice, NewTask, NewUser,
    Task, TaskUpdate, Token, User, UserUpdate,
  },
  store::KeyValueStore,
  token,
  validate::{self, CheckResult, ValidationError, check, require},
};

// ─── Clock ───────────────────────────────────────────────────────────────────

/// Hands out strictly increasing timestamps, one nanosecond apart at worst,
/// so activity times stay unique and ordered within a process.
#[derive(Debug, Default)]
struct ActivityClock {
  last: AtomicI64,
}

impl ActivityClock {
  fn next(&self) -> DateTime<Utc> {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let prev = self
      .last
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last.saturating_add(1)))
      })
      .unwrap_or_else(|last| last);
    DateTime::from_timestamp_nanos(now.max(prev.saturating_add(1)))
  }
}

/// Format a timestamp the way activity keys store it. Fixed width, so
/// lexicographic order is chronological order.
pub fn format_time(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// User names are case-insensitive; this is their canonical form.
pub fn normalize_name(name: &str) -> String { name.to_lowercase() }

/// Characters that would let a name reach into another record's key.
const RESERVED: [char; 3] = [':', '{', '}'];

/// Whether `name` can be embedded in a key as a single segment.
pub fn is_key_safe(name: &str) -> bool { !name.contains(RESERVED) }

fn ensure_valid(errors: Vec<ValidationError>) -> Result<()> {
  if errors.is_empty() {
    Ok(())
  } else {
    Err(Error::Invalid(errors))
  }
}

// ─── Repository ──────────────────────────────────────────────────────────────

/// Data access for users, devices, tokens, activities and tasks.
///
/// Cloning is cheap: the store and clock are reference-counted.
pub struct Repository<S> {
  store: Arc<S>,
  clock: Arc<ActivityClock>,
}

impl<S> Clone for Repository<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), clock: self.clock.clone() }
  }
}

impl<S: KeyValueStore> Repository<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, clock: Arc::new(ActivityClock::default()) }
  }

  /// The underlying store handle.
  pub fn store(&self) -> &S { &self.store }

  async fn load<R: HashRecord>(&self, key: &str, owner: &str) -> Result<Option<R>> {
    let Some(fields) = self.store.hash_get_all(key).await.map_err(Error::store)?
    else {
      return Ok(None);
    };
    R::from_fields(owner, &fields)
      .map(Some)
      .map_err(|reason| Error::Malformed { key: key.to_owned(), reason })
  }

  async fn exists(&self, key: &str) -> Result<bool> {
    self.store.exists(key).await.map_err(Error::store)
  }

  async fn delete_key(&self, key: &str) -> Result<()> {
    self.store.delete(key).await.map_err(Error::store)
  }

  /// Soft-fail with `err` when `key` is already taken. Skipped unless
  /// `applies`.
  async fn check_unique(
    &self,
    applies: bool,
    key: String,
    err: ValidationError,
  ) -> CheckResult<ValidationError, Error> {
    if !applies {
      return Ok(None);
    }
    Ok(self.exists(&key).await?.then_some(err))
  }

  async fn write<R: HashRecord>(&self, key: &str, record: &R) -> Result<()> {
    self
      .store
      .hash_set(key, record.to_fields())
      .await
      .map_err(Error::store)
  }

  // ── Users ─────────────────────────────────────────────────────────────

  /// Soft problems with `user`, or the first store failure.
  pub async fn validate_user(
    &self,
    user: &User,
    is_new: bool,
  ) -> Result<Vec<ValidationError>> {
    validate::run(vec![
      require(!user.name.is_empty(), ValidationError::UserNameEmpty),
      require(is_key_safe(&user.name), ValidationError::UserNameInvalid),
      require(!user.password.is_empty(), ValidationError::UserPasswordEmpty),
      check(self.check_unique(
        is_new && !user.name.is_empty() && is_key_safe(&user.name),
        keys::user(&user.name),
        ValidationError::UserAlreadyExists,
      )),
    ])
    .await
  }

  /// Validate and store a new user. The password is hashed before saving.
  pub async fn create_user(&self, input: NewUser) -> Result<User> {
    let mut user = User {
      name:     normalize_name(&input.name),
      password: input.password,
    };
    ensure_valid(self.validate_user(&user, true).await?)?;

    user.password = password::hash(&user.password)?;
    self.write(&keys::user(&user.name), &user).await?;
    debug!(user = %user.name, "created user");
    Ok(user)
  }

  pub async fn get_user(&self, name: &str) -> Result<Option<User>> {
    let name = normalize_name(name);
    self.load(&keys::user(&name), &name).await
  }

  /// Apply `update` to an existing user and store the result.
  pub async fn update_user(&self, mut user: User, update: UserUpdate) -> Result<User> {
    let Some(plain) = update.password else {
      return Ok(user);
    };

    let candidate = User { name: user.name.clone(), password: plain };
    ensure_valid(self.validate_user(&candidate, false).await?)?;

    user.password = password::hash(&candidate.password)?;
    self.write(&keys::user(&user.name), &user).await?;
    debug!(user = %user.name, "updated user password");
    Ok(user)
  }

  /// Delete a user together with every device, token, activity and task
  /// they own.
  pub async fn delete_user(&self, name: &str) -> Result<()> {
    let name = normalize_name(name);

    for device in self.list_devices(&name).await? {
      self.delete_device(&device).await?;
    }
    self.delete_key(&keys::devices(&name)).await?;

    for activity in self.list_activities(&name).await? {
      self.delete_key(&keys::activity(&name, &activity.time)).await?;
    }
    self.delete_key(&keys::activities(&name)).await?;

    for task in self.list_tasks(&name).await? {
      self.delete_task(&task).await?;
    }
    self.delete_key(&keys::tasks(&name)).await?;
    self.delete_key(&keys::task_seq(&name)).await?;

    self.delete_key(&keys::user(&name)).await?;
    debug!(user = %name, "deleted user");
    Ok(())
  }

  // ── Devices & tokens ──────────────────────────────────────────────────

  pub async fn validate_device(
    &self,
    device: &Device,
    is_new: bool,
  ) -> Result<Vec<ValidationError>> {
    validate::run(vec![
      require(!device.name.is_empty(), ValidationError::DeviceNameEmpty),
      require(is_key_safe(&device.name), ValidationError::DeviceNameInvalid),
      check(self.check_unique(
        is_new && !device.name.is_empty() && is_key_safe(&device.name),
        keys::device(&device.user, &device.name),
        ValidationError::DeviceAlreadyExists,
      )),
      check(self.check_unique(
        is_new && !device.token.is_empty(),
        keys::token(&device.token),
        ValidationError::TokenAlreadyExists,
      )),
    ])
    .await
  }

  /// Register a device for `user`, minting its token.
  pub async fn create_device(&self, user: &User, input: NewDevice) -> Result<Device> {
    let device = Device {
      token: token::generate(&user.name, &input.name, Utc::now()),
      name:  input.name,
      user:  user.name.clone(),
    };
    ensure_valid(self.validate_device(&device, true).await?)?;

    let token = Token {
      value:  device.token.clone(),
      user:   device.user.clone(),
      device: device.name.clone(),
    };
    self.write(&keys::device(&device.user, &device.name), &device).await?;
    self.write(&keys::token(&token.value), &token).await?;
    self
      .store
      .set_add(&keys::devices(&device.user), &device.name)
      .await
      .map_err(Error::store)?;

    debug!(user = %device.user, device = %device.name, "created device");
    Ok(device)
  }

  pub async fn get_device(&self, user: &str, name: &str) -> Result<Option<Device>> {
    self.load(&keys::device(user, name), user).await
  }

  /// All devices of `user`, ordered by name. Index entries whose hash is
  /// gone are skipped.
  pub async fn list_devices(&self, user: &str) -> Result<Vec<Device>> {
    let mut names = self
      .store
      .set_members(&keys::devices(user))
      .await
      .map_err(Error::store)?;
    names.sort();

    let mut devices = Vec::with_capacity(names.len());
    for name in names {
      match self.get_device(user, &name).await? {
        Some(device) => devices.push(device),
        None => debug!(user, device = %name, "skipping dangling device index entry"),
      }
    }
    Ok(devices)
  }

  /// Delete a device and its token.
  pub async fn delete_device(&self, device: &Device) -> Result<()> {
    self.delete_key(&keys::token(&device.token)).await?;
    self.delete_key(&keys::device(&device.user, &device.name)).await?;
    self
      .store
      .set_remove(&keys::devices(&device.user), &device.name)
      .await
      .map_err(Error::store)?;
    debug!(user = %device.user, device = %device.name, "deleted device");
    Ok(())
  }

  /// Look up the (user, device) pair a token belongs to.
  pub async fn resolve_token(&self, value: &str) -> Result<Option<Token>> {
    self.load(&keys::token(value), value).await
  }

  // ── Activities ────────────────────────────────────────────────────────

  pub async fn validate_activity(
    &self,
    activity: &Activity,
  ) -> Result<Vec<ValidationError>> {
    validate::run(vec![require(
      !activity.message.is_empty(),
      ValidationError::ActivityMessageEmpty,
    )])
    .await
  }

  /// Append an activity to `user`'s log.
  pub async fn record_activity(&self, user: &str, input: NewActivity) -> Result<Activity> {
    let activity = Activity {
      message: input.message,
      time:    format_time(self.clock.next()),
      user:    user.to_owned(),
    };
    ensure_valid(self.validate_activity(&activity).await?)?;

    self.write(&keys::activity(user, &activity.time), &activity).await?;
    self
      .store
      .list_prepend(&keys::activities(user), &activity.time)
      .await
      .map_err(Error::store)?;

    debug!(user, time = %activity.time, "recorded activity");
    Ok(activity)
  }

  /// The activity log of `user`, newest first.
  pub async fn list_activities(&self, user: &str) -> Result<Vec<Activity>> {
    let times = self
      .store
      .list_range(&keys::activities(user))
      .await
      .map_err(Error::store)?;

    let mut activities = Vec::with_capacity(times.len());
    for time in times {
      let key = keys::activity(user, &time);
      match self.load(&key, user).await? {
        Some(activity) => activities.push(activity),
        None => debug!(user, %time, "skipping dangling activity index entry"),
      }
    }
    Ok(activities)
  }

  // ── Tasks ─────────────────────────────────────────────────────────────

  pub async fn validate_task(&self, task: &Task) -> Result<Vec<ValidationError>> {
    validate::run(vec![require(
      !task.message.is_empty(),
      ValidationError::TaskMessageEmpty,
    )])
    .await
  }

  /// Create a task for `user` under the next id of their sequence.
  pub async fn create_task(&self, user: &str, input: NewTask) -> Result<Task> {
    let mut task = Task {
      id:       0,
      message:  input.message,
      complete: false,
      category: input.category.filter(|c| !c.is_empty()),
      user:     user.to_owned(),
    };
    ensure_valid(self.validate_task(&task).await?)?;

    let seq_key = keys::task_seq(user);
    let next = self.store.incr(&seq_key).await.map_err(Error::store)?;
    task.id = u64::try_from(next).map_err(|_| Error::Malformed {
      key:    seq_key,
      reason: format!("negative task sequence {next}"),
    })?;

    self.save_task(&task).await?;
    debug!(user, id = task.id, "created task");
    Ok(task)
  }

  async fn save_task(&self, task: &Task) -> Result<()> {
    self.write(&keys::task(&task.user, task.id), task).await?;
    self
      .store
      .set_add(&keys::tasks(&task.user), &task.id.to_string())
      .await
      .map_err(Error::store)
  }

  pub async fn get_task(&self, user: &str, id: u64) -> Result<Option<Task>> {
    self.load(&keys::task(user, id), user).await
  }

  /// All tasks of `user`, ordered by id.
  pub async fn list_tasks(&self, user: &str) -> Result<Vec<Task>> {
    let key = keys::tasks(user);
    let members = self.store.set_members(&key).await.map_err(Error::store)?;

    let mut ids = members
      .iter()
      .map(|m| {
        m.parse::<u64>().map_err(|_| Error::Malformed {
          key:    key.clone(),
          reason: format!("invalid task id {m:?}"),
        })
      })
      .collect::<Result<Vec<_>>>()?;
    ids.sort_unstable();

    let mut tasks = Vec::with_capacity(ids.len());
    for id in ids {
      match self.get_task(user, id).await? {
        Some(task) => tasks.push(task),
        None => debug!(user, id, "skipping dangling task index entry"),
      }
    }
    Ok(tasks)
  }

  /// Apply `update` to `task`. An empty update returns the task unchanged
  /// without touching the store.
  pub async fn update_task(&self, mut task: Task, update: TaskUpdate) -> Result<Task> {
    if update.is_empty() {
      return Ok(task);
    }
    update.apply(&mut task);
    ensure_valid(self.validate_task(&task).await?)?;

    self.save_task(&task).await?;
    debug!(user = %task.user, id = task.id, "updated task");
    Ok(task)
  }

  pub async fn delete_task(&self, task: &Task) -> Result<()> {
    self.delete_key(&keys::task(&task.user, task.id)).await?;
    self
      .store
      .set_remove(&keys::tasks(&task.user), &task.id.to_string())
      .await
      .map_err(Error::store)?;
    debug!(user = %task.user, id = task.id, "deleted task");
    Ok(())
  }
}
