//! Context-based configuration for Watson command line tools.
//!
//! Configuration is stored in ~/.watson/{app_name}/config.yaml. A context
//! bundles one set of credentials with optional per-service URL and version
//! overrides, similar to kubectl contexts.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".watson";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application name (not serialized).
    #[serde(skip)]
    pub app_name: String,

    /// Name of the currently active context.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_context: String,

    /// Map of context name to context configuration.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub contexts: HashMap<String, Context>,

    #[serde(skip)]
    config_path: PathBuf,
}

/// One named set of credentials and endpoint settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// IAM API key. Takes precedence over every other credential.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// IAM token endpoint override.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iam_url: String,

    /// Pre-issued bearer token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bearer_token: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// Base URL overrides keyed by service name (e.g. `text-to-speech`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub urls: HashMap<String, String>,

    /// Version date overrides keyed by service name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub versions: HashMap<String, String>,

    /// Request timeout in seconds (optional).
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout: i32,

    #[serde(default, skip_serializing_if = "is_false")]
    pub learning_opt_out: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub disable_ssl_verification: bool,

    /// Default voice for Text to Speech (optional).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_voice: String,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Config {
    /// Gets the default config directory.
    pub fn default_config_dir(app_name: &str) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(app_name))
    }

    /// Gets the default config file path.
    pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
        Self::default_config_dir(app_name).map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Returns the config file path.
    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Adds or replaces a context. The first context added becomes current.
    pub fn add_context(&mut self, name: &str, mut ctx: Context) -> anyhow::Result<()> {
        if name.is_empty() {
            anyhow::bail!("context name must not be empty");
        }
        ctx.name = name.to_string();
        self.contexts.insert(name.to_string(), ctx);
        if self.current_context.is_empty() {
            self.current_context = name.to_string();
        }
        self.save()
    }

    /// Deletes a context.
    pub fn delete_context(&mut self, name: &str) -> anyhow::Result<()> {
        if self.contexts.remove(name).is_none() {
            anyhow::bail!("context '{}' not found", name);
        }
        if self.current_context == name {
            self.current_context.clear();
        }
        self.save()
    }

    /// Sets the current context.
    pub fn use_context(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.contexts.contains_key(name) {
            anyhow::bail!("context '{}' not found", name);
        }
        self.current_context = name.to_string();
        self.save()
    }

    /// Gets a specific context.
    pub fn get_context(&self, name: &str) -> Option<&Context> {
        self.contexts.get(name)
    }

    /// Gets the current context.
    pub fn get_current_context(&self) -> Option<&Context> {
        if self.current_context.is_empty() {
            return None;
        }
        self.contexts.get(&self.current_context)
    }

    /// Resolves the context by name, or the current context if no name is given.
    pub fn resolve_context(&self, name: Option<&str>) -> Option<&Context> {
        match name {
            Some(n) if !n.is_empty() => self.get_context(n),
            _ => self.get_current_context(),
        }
    }

    /// Lists all context names, sorted.
    pub fn list_contexts(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.contexts.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Context {
    /// Describes which credential this context will authenticate with.
    ///
    /// Mirrors the precedence used when building a client: API key, then
    /// bearer token, then username and password.
    pub fn auth_kind(&self) -> &'static str {
        if !self.api_key.is_empty() {
            "iam"
        } else if !self.bearer_token.is_empty() {
            "bearer"
        } else if !self.username.is_empty() || !self.password.is_empty() {
            "basic"
        } else {
            "none"
        }
    }

    /// Returns the URL override for a service, if any.
    pub fn url_for(&self, service: &str) -> Option<&str> {
        self.urls
            .get(service)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Returns the version override for a service, if any.
    pub fn version_for(&self, service: &str) -> Option<&str> {
        self.versions
            .get(service)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Loads configuration for the specified app, creating an empty file if
/// none exists yet.
pub fn load_config(app_name: &str, custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = match custom_path {
        Some(p) => PathBuf::from(p),
        None => Config::default_config_path(app_name)
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path"))?,
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cfg = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&content)?
        }
    } else {
        let cfg = Config::default();
        std::fs::write(&config_path, serde_yaml::to_string(&cfg)?)?;
        cfg
    };

    cfg.app_name = app_name.to_string();
    cfg.config_path = config_path;

    Ok(cfg)
}

/// Masks a secret for display, keeping the first and last four characters.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(dir: &TempDir) -> Config {
        let path = dir.path().join("watson").join("config.yaml");
        load_config("watson", path.to_str()).unwrap()
    }

    #[test]
    fn test_load_creates_file() {
        let dir = TempDir::new().unwrap();
        let cfg = load(&dir);
        assert!(cfg.path().exists());
        assert!(cfg.contexts.is_empty());
        assert_eq!(cfg.app_name, "watson");
    }

    #[test]
    fn test_context_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut cfg = load(&dir);

        let mut prod = Context {
            api_key: "abcd1234efgh5678".into(),
            learning_opt_out: true,
            ..Default::default()
        };
        prod.urls.insert(
            "text-to-speech".into(),
            "https://stream.example.test/text-to-speech/api".into(),
        );
        cfg.add_context("prod", prod).unwrap();
        cfg.add_context(
            "legacy",
            Context {
                username: "user".into(),
                password: "pass".into(),
                ..Default::default()
            },
        )
        .unwrap();

        // First context added becomes current.
        assert_eq!(cfg.current_context, "prod");

        let reloaded = load(&dir);
        assert_eq!(reloaded.list_contexts(), vec!["legacy", "prod"]);
        let prod = reloaded.get_context("prod").unwrap();
        assert_eq!(prod.name, "prod");
        assert_eq!(prod.auth_kind(), "iam");
        assert!(prod.learning_opt_out);
        assert_eq!(
            prod.url_for("text-to-speech"),
            Some("https://stream.example.test/text-to-speech/api")
        );
        assert_eq!(prod.url_for("discovery"), None);

        cfg.use_context("legacy").unwrap();
        assert_eq!(
            cfg.resolve_context(None).unwrap().auth_kind(),
            "basic"
        );
        assert_eq!(cfg.resolve_context(Some("prod")).unwrap().name, "prod");
        assert!(cfg.resolve_context(Some("missing")).is_none());

        cfg.delete_context("legacy").unwrap();
        assert!(cfg.current_context.is_empty());
        assert!(cfg.delete_context("legacy").is_err());
        assert!(cfg.use_context("legacy").is_err());
    }

    #[test]
    fn test_empty_file_is_empty_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "").unwrap();
        let cfg = load_config("watson", path.to_str()).unwrap();
        assert!(cfg.contexts.is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
current_context: dev
contexts:
  dev:
    bearer_token: tok
    versions:
      assistant: "2019-02-28"
    timeout: 30
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let dev = cfg.get_current_context().unwrap();
        assert_eq!(dev.auth_kind(), "bearer");
        assert_eq!(dev.version_for("assistant"), Some("2019-02-28"));
        assert_eq!(dev.timeout, 30);
        assert!(!dev.disable_ssl_verification);
    }

    #[test]
    fn test_auth_kind_none() {
        assert_eq!(Context::default().auth_kind(), "none");
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("short"), "*****");
        assert_eq!(mask_api_key("abcd1234efgh5678"), "abcd********5678");
        assert_eq!(mask_api_key(""), "");
    }
}
