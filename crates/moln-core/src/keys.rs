//! Key templates for the key-value layout.
//!
//! | Template | Structure |
//! |----------|-----------|
//! | `users:{user}` | hash |
//! | `users:{user}:devices` | set |
//! | `users:{user}:devices:{device}` | hash |
//! | `users:{user}:activities` | list, newest first |
//! | `users:{user}:activities:{time}` | hash |
//! | `users:{user}:tasks` | set |
//! | `users:{user}:tasks:{id}` | hash |
//! | `users:{user}:task_seq` | counter |
//! | `tokens:{token}` | hash |

pub const USER: &str = "users:{{user}}";
pub const DEVICES: &str = "users:{{user}}:devices";
pub const DEVICE: &str = "users:{{user}}:devices:{{device}}";
pub const ACTIVITIES: &str = "users:{{user}}:activities";
pub const ACTIVITY: &str = "users:{{user}}:activities:{{activity}}";
pub const TASKS: &str = "users:{{user}}:tasks";
pub const TASK: &str = "users:{{user}}:tasks:{{task}}";
pub const TASK_SEQ: &str = "users:{{user}}:task_seq";
pub const TOKEN: &str = "tokens:{{token}}";

/// Substitute every `{{name}}` placeholder in `template` in a single pass.
/// Substituted values are copied verbatim and never scanned for further
/// placeholders.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
  let mut key = String::with_capacity(template.len());
  let mut rest = template;
  while let Some(start) = rest.find("{{") {
    let Some(len) = rest[start + 2..].find("}}") else {
      break;
    };
    key.push_str(&rest[..start]);
    let name = &rest[start + 2..start + 2 + len];
    match vars.iter().find(|(n, _)| *n == name) {
      Some((_, value)) => key.push_str(value),
      None => key.push_str(&rest[start..start + 4 + len]),
    }
    rest = &rest[start + 4 + len..];
  }
  key.push_str(rest);
  key
}

pub fn user(user: &str) -> String { render(USER, &[("user", user)]) }

pub fn devices(user: &str) -> String { render(DEVICES, &[("user", user)]) }

pub fn device(user: &str, device: &str) -> String {
  render(DEVICE, &[("user", user), ("device", device)])
}

pub fn activities(user: &str) -> String {
  render(ACTIVITIES, &[("user", user)])
}

pub fn activity(user: &str, time: &str) -> String {
  render(ACTIVITY, &[("user", user), ("activity", time)])
}

pub fn tasks(user: &str) -> String { render(TASKS, &[("user", user)]) }

pub fn task(user: &str, id: u64) -> String {
  render(TASK, &[("user", user), ("task", &id.to_string())])
}

pub fn task_seq(user: &str) -> String { render(TASK_SEQ, &[("user", user)]) }

pub fn token(token: &str) -> String { render(TOKEN, &[("token", token)]) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_nested_templates() {
    assert_eq!(user("alice"), "users:alice");
    assert_eq!(device("alice", "phone"), "users:alice:devices:phone");
    assert_eq!(task("alice", 7), "users:alice:tasks:7");
    assert_eq!(
      activity("alice", "2024-01-01T00:00:00.000000000Z"),
      "users:alice:activities:2024-01-01T00:00:00.000000000Z"
    );
    assert_eq!(token("abc"), "tokens:abc");
  }

  #[test]
  fn render_replaces_every_occurrence() {
    let key = render("{{a}}:{{a}}:{{b}}", &[("a", "x"), ("b", "y")]);
    assert_eq!(key, "x:x:y");
  }

  #[test]
  fn substituted_values_are_not_rescanned() {
    assert_eq!(task("{{task}}", 1), "users:{{task}}:tasks:1");
    assert_eq!(
      device("{{device}}", "phone"),
      "users:{{device}}:devices:phone"
    );
    assert_ne!(task("{{task}}", 1), task("1", 1));
  }

  #[test]
  fn unterminated_placeholder_is_kept() {
    assert_eq!(render("a:{{b", &[("b", "x")]), "a:{{b");
  }

  #[test]
  fn unknown_placeholders_are_left_alone() {
    assert_eq!(render(USER, &[("device", "phone")]), USER);
  }
}
