use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".pr-review-bot.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read private key {path}: {source}")]
    KeyRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Top-level configuration loaded from .pr-review-bot.toml.
///
/// Every field is optional in the file; environment variables fill in or
/// override what the file leaves out. Required values are only checked by
/// [`Config::secrets`], which runs once at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub App identity and webhook settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Generative model settings
    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub App id. Falls back to APP_ID.
    pub app_id: Option<String>,
    /// PEM private key of the app. Falls back to PRIVATE_KEY_PATH.
    pub private_key_path: Option<PathBuf>,
    /// Shared webhook secret. Falls back to WEBHOOK_SECRET.
    pub webhook_secret: Option<String>,
    /// REST API root, for GitHub Enterprise.
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiConfig {
    /// Model id, e.g. "gemini-1.5-flash-001"
    pub model: Option<String>,
    /// Google Cloud project. When set, requests go to Vertex AI.
    pub project: Option<String>,
    /// Vertex AI region
    pub location: Option<String>,
    /// Overrides the endpoint root
    pub api_base: Option<String>,
    /// API key, sent as `?key=` to either endpoint. Falls back to GEMINI_API_KEY.
    pub credential: Option<String>,
}

/// Values that must be present before the listener starts.
pub struct Secrets {
    pub app_id: String,
    pub private_key_pem: String,
    pub webhook_secret: String,
    pub generation_credential: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_webhook_path() -> String {
    "/api/webhook".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
        }
    }
}

impl ServerConfig {
    /// Public URL of the webhook endpoint, as printed at startup.
    pub fn webhook_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.webhook_path)
    }
}

impl GitHubConfig {
    pub fn api_base(&self) -> String {
        self.api_base
            .as_deref()
            .unwrap_or("https://api.github.com")
            .trim_end_matches('/')
            .to_string()
    }
}

impl Config {
    /// Load configuration from `path`, or from .pr-review-bot.toml in the
    /// current directory when no path is given, then apply environment
    /// overrides.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load from a specific path without looking at the environment.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Overlay environment variables onto the file values.
    ///
    /// Takes a lookup function so tests don't have to touch the process
    /// environment.
    pub fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(app_id) = env("APP_ID") {
            self.github.app_id = Some(app_id);
        }
        if let Some(path) = env("PRIVATE_KEY_PATH") {
            self.github.private_key_path = Some(PathBuf::from(path));
        }
        if let Some(secret) = env("WEBHOOK_SECRET") {
            self.github.webhook_secret = Some(secret);
        }
        if let Some(credential) = env("GEMINI_API_KEY") {
            self.gemini.credential = Some(credential);
        }
        if let Some(project) = env("VERTEX_PROJECT") {
            self.gemini.project = Some(project);
        }
        if let Some(location) = env("VERTEX_LOCATION") {
            self.gemini.location = Some(location);
        }
        if let Some(port) = env("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: port.clone(),
            })?;
        }
        Ok(())
    }

    /// Resolve every required value and read the private key file.
    ///
    /// Also rejects a webhook path the router could not mount.
    pub fn secrets(&self) -> Result<Secrets, ConfigError> {
        if !self.server.webhook_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                name: "webhook_path",
                value: self.server.webhook_path.clone(),
            });
        }

        let app_id = non_empty(&self.github.app_id).ok_or(ConfigError::Missing("APP_ID"))?;
        let key_path = self
            .github
            .private_key_path
            .as_ref()
            .ok_or(ConfigError::Missing("PRIVATE_KEY_PATH"))?;
        let webhook_secret =
            non_empty(&self.github.webhook_secret).ok_or(ConfigError::Missing("WEBHOOK_SECRET"))?;
        let generation_credential =
            non_empty(&self.gemini.credential).ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let private_key_pem = fs::read_to_string(key_path).map_err(|source| ConfigError::KeyRead {
            path: key_path.clone(),
            source,
        })?;

        Ok(Secrets {
            app_id,
            private_key_pem,
            webhook_secret,
            generation_credential,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn key_fixture() -> String {
        format!("{}/tests/fixtures/test_app_key.pem", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.app_id.is_none());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.webhook_path, "/api/webhook");
        assert_eq!(config.server.webhook_url(), "http://localhost:3000/api/webhook");
        assert_eq!(config.github.api_base(), "https://api.github.com");
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[github]
app_id = "12345"
private_key_path = "/etc/bot/key.pem"
api_base = "https://ghe.example.com/api/v3/"

[server]
port = 8080

[gemini]
project = "my-project"
location = "europe-west4"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github.app_id.as_deref(), Some("12345"));
        assert_eq!(config.github.api_base(), "https://ghe.example.com/api/v3");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.gemini.project.as_deref(), Some("my-project"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config: Config = toml::from_str("[github]\napp_id = \"1\"").unwrap();
        config
            .apply_env(env_from(&[
                ("APP_ID", "2"),
                ("WEBHOOK_SECRET", "s3cret"),
                ("GEMINI_API_KEY", "AIza-key"),
                ("PORT", "4000"),
            ]))
            .unwrap();
        assert_eq!(config.github.app_id.as_deref(), Some("2"));
        assert_eq!(config.github.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.gemini.credential.as_deref(), Some("AIza-key"));
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_access_token_env_is_not_a_credential() {
        let mut config: Config = toml::from_str("[gemini]\ncredential = \"AIza-file\"").unwrap();
        config
            .apply_env(env_from(&[("GOOGLE_ACCESS_TOKEN", "ya29.token")]))
            .unwrap();
        assert_eq!(config.gemini.credential.as_deref(), Some("AIza-file"));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = Config::default();
        let err = config.apply_env(env_from(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "PORT", .. }));
    }

    #[test]
    fn test_secrets_requires_every_value() {
        let mut config = Config::default();
        assert!(matches!(config.secrets(), Err(ConfigError::Missing("APP_ID"))));

        config.github.app_id = Some("12345".to_string());
        assert!(matches!(
            config.secrets(),
            Err(ConfigError::Missing("PRIVATE_KEY_PATH"))
        ));

        config.github.private_key_path = Some(PathBuf::from(key_fixture()));
        config.github.webhook_secret = Some("   ".to_string());
        assert!(matches!(
            config.secrets(),
            Err(ConfigError::Missing("WEBHOOK_SECRET"))
        ));

        config.github.webhook_secret = Some("s3cret".to_string());
        assert!(matches!(
            config.secrets(),
            Err(ConfigError::Missing("GEMINI_API_KEY"))
        ));

        config.gemini.credential = Some("AIza-key".to_string());
        let secrets = config.secrets().unwrap();
        assert_eq!(secrets.app_id, "12345");
        assert!(secrets.private_key_pem.contains("PRIVATE KEY"));
    }

    #[test]
    fn test_secrets_reports_unreadable_key() {
        let mut config = Config::default();
        config
            .apply_env(env_from(&[
                ("APP_ID", "12345"),
                ("PRIVATE_KEY_PATH", "/nonexistent/key.pem"),
                ("WEBHOOK_SECRET", "s3cret"),
                ("GEMINI_API_KEY", "AIza-key"),
            ]))
            .unwrap();
        assert!(matches!(config.secrets(), Err(ConfigError::KeyRead { .. })));
    }

    #[test]
    fn test_secrets_rejects_relative_webhook_path() {
        let key = key_fixture();
        let mut config = Config::default();
        config
            .apply_env(env_from(&[
                ("APP_ID", "12345"),
                ("PRIVATE_KEY_PATH", key.as_str()),
                ("WEBHOOK_SECRET", "s3cret"),
                ("GEMINI_API_KEY", "AIza-key"),
            ]))
            .unwrap();
        assert!(config.secrets().is_ok());

        for path in ["api/webhook", ""] {
            config.server.webhook_path = path.to_string();
            assert!(matches!(
                config.secrets(),
                Err(ConfigError::InvalidValue { name: "webhook_path", .. })
            ));
        }
    }

    #[test]
    fn test_relative_webhook_path_from_file_is_rejected() {
        let config: Config = toml::from_str("[server]\nwebhook_path = \"api/webhook\"").unwrap();
        assert!(matches!(
            config.secrets(),
            Err(ConfigError::InvalidValue { name: "webhook_path", .. })
        ));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/.pr-review-bot.toml")));
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }
}
