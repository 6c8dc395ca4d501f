use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Runtime server configuration, deserialised from `config.toml` layered
/// with `MOLN_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub store_path:           PathBuf,
  pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                 "127.0.0.1".to_string(),
      port:                 8080,
      store_path:           PathBuf::from("moln.db"),
      request_timeout_secs: 30,
    }
  }
}

impl ServerConfig {
  /// Read `path` (optional) and the environment. Missing keys fall back to
  /// their defaults.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("MOLN").try_parsing(true))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/moln.toml")).unwrap();
    assert_eq!(cfg.request_timeout_secs, 30);
    assert_eq!(cfg.store_path, PathBuf::from("moln.db"));
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = std::env::temp_dir().join(format!("moln-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.toml");
    std::fs::write(&path, "port = 9999\nstore_path = \"/tmp/x.db\"\n").unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!(cfg.port, 9999);
    assert_eq!(cfg.store_path, PathBuf::from("/tmp/x.db"));
    assert_eq!(cfg.host, "127.0.0.1");

    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn tls_section_is_ignored() {
    let dir = std::env::temp_dir().join(format!("moln-config-tls-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.toml");
    std::fs::write(&path, "port = 8443\n\n[tls]\ncert = \"a.pem\"\nkey = \"b.pem\"\n")
      .unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!(cfg.port, 8443);

    let _ = std::fs::remove_dir_all(&dir);
  }
}
