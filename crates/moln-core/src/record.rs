//! Record types and their mapping onto store hashes.
//!
//! Records are plain data. [`HashRecord`] turns a record into the
//! field/value pairs written with
//! [`KeyValueStore::hash_set`](crate::store::KeyValueStore::hash_set) and
//! back. Field names are part of the stored format and must not change.

use serde::{Deserialize, Serialize};

use crate::store::Fields;

// ─── Mapping ─────────────────────────────────────────────────────────────────

/// A record stored as a single hash.
pub trait HashRecord: Sized {
  fn to_fields(&self) -> Vec<(String, String)>;

  /// Rebuild a record from its hash.
  ///
  /// `owner` is the identifying segment of the key the hash was read from:
  /// the user name for user-scoped records, the token value for tokens.
  /// On failure, returns a description of the offending field.
  fn from_fields(owner: &str, fields: &Fields) -> Result<Self, String>;
}

fn field(fields: &Fields, name: &str) -> Result<String, String> {
  fields
    .get(name)
    .cloned()
    .ok_or_else(|| format!("missing field {name:?}"))
}

fn encode_bool(b: bool) -> String { if b { "true" } else { "false" }.to_owned() }

fn decode_bool(s: &str) -> Result<bool, String> {
  match s {
    "true" | "1" => Ok(true),
    "false" | "0" | "" => Ok(false),
    other => Err(format!("invalid boolean {other:?}")),
  }
}

// ─── User ────────────────────────────────────────────────────────────────────

/// An account. `password` holds the argon2 digest, never the plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
  pub name:     String,
  #[serde(skip_serializing)]
  pub password: String,
}

/// Signup input.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  #[serde(default)]
  pub name:     String,
  #[serde(default)]
  pub password: String,
}

/// Partial update of a user. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
  /// New plain-text password; hashed before it is stored.
  pub password: Option<String>,
}

impl UserUpdate {
  pub fn is_empty(&self) -> bool { self.password.is_none() }
}

impl HashRecord for User {
  fn to_fields(&self) -> Vec<(String, String)> {
    vec![
      ("name".to_owned(), self.name.clone()),
      ("password".to_owned(), self.password.clone()),
    ]
  }

  fn from_fields(owner: &str, fields: &Fields) -> Result<Self, String> {
    Ok(Self {
      name:     fields.get("name").cloned().unwrap_or_else(|| owner.to_owned()),
      password: field(fields, "password")?,
    })
  }
}

// ─── Device ──────────────────────────────────────────────────────────────────

/// A registered client device and the token it authenticates with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
  pub name:  String,
  pub token: String,
  #[serde(skip)]
  pub user:  String,
}

/// Device registration input.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
  #[serde(default)]
  pub name: String,
}

impl HashRecord for Device {
  fn to_fields(&self) -> Vec<(String, String)> {
    vec![
      ("name".to_owned(), self.name.clone()),
      ("token".to_owned(), self.token.clone()),
      ("user".to_owned(), self.user.clone()),
    ]
  }

  fn from_fields(owner: &str, fields: &Fields) -> Result<Self, String> {
    Ok(Self {
      name:  field(fields, "name")?,
      token: field(fields, "token")?,
      user:  fields.get("user").cloned().unwrap_or_else(|| owner.to_owned()),
    })
  }
}

// ─── Token ───────────────────────────────────────────────────────────────────

/// Reverse index from a token value to its (user, device) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
  pub value:  String,
  pub user:   String,
  pub device: String,
}

impl HashRecord for Token {
  fn to_fields(&self) -> Vec<(String, String)> {
    vec![
      ("device".to_owned(), self.device.clone()),
      ("user".to_owned(), self.user.clone()),
    ]
  }

  fn from_fields(owner: &str, fields: &Fields) -> Result<Self, String> {
    Ok(Self {
      value:  owner.to_owned(),
      user:   field(fields, "user")?,
      device: field(fields, "device")?,
    })
  }
}

// ─── Activity ────────────────────────────────────────────────────────────────

/// A single audit-log entry. `time` doubles as its unique id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
  pub message: String,
  /// RFC 3339, UTC, nanosecond precision.
  pub time:    String,
  #[serde(skip)]
  pub user:    String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewActivity {
  #[serde(default)]
  pub message: String,
}

impl HashRecord for Activity {
  fn to_fields(&self) -> Vec<(String, String)> {
    vec![
      ("message".to_owned(), self.message.clone()),
      ("time".to_owned(), self.time.clone()),
    ]
  }

  fn from_fields(owner: &str, fields: &Fields) -> Result<Self, String> {
    Ok(Self {
      message: field(fields, "message")?,
      time:    field(fields, "time")?,
      user:    owner.to_owned(),
    })
  }
}

// ─── Task ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
  pub id:       u64,
  pub message:  String,
  pub complete: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip)]
  pub user:     String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
  #[serde(default)]
  pub message:  String,
  pub category: Option<String>,
}

/// Partial update of a task. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
  pub message:  Option<String>,
  pub complete: Option<bool>,
  pub category: Option<String>,
}

impl TaskUpdate {
  pub fn is_empty(&self) -> bool {
    self.message.is_none() && self.complete.is_none() && self.category.is_none()
  }

  /// Overwrite the fields of `task` that this update carries.
  pub fn apply(self, task: &mut Task) {
    if let Some(message) = self.message {
      task.message = message;
    }
    if let Some(complete) = self.complete {
      task.complete = complete;
    }
    if let Some(category) = self.category {
      task.category = (!category.is_empty()).then_some(category);
    }
  }
}

impl HashRecord for Task {
  fn to_fields(&self) -> Vec<(String, String)> {
    vec![
      ("id".to_owned(), self.id.to_string()),
      ("message".to_owned(), self.message.clone()),
      ("category".to_owned(), self.category.clone().unwrap_or_default()),
      ("complete".to_owned(), encode_bool(self.complete)),
    ]
  }

  fn from_fields(owner: &str, fields: &Fields) -> Result<Self, String> {
    let id = field(fields, "id")?;
    let category = fields.get("category").filter(|c| !c.is_empty()).cloned();
    Ok(Self {
      id: id.parse().map_err(|_| format!("invalid task id {id:?}"))?,
      message: field(fields, "message")?,
      complete: decode_bool(fields.get("complete").map_or("", String::as_str))?,
      category,
      user: owner.to_owned(),
    })
  }
}
