//! `quarry.toml` configuration, environment overrides and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Once, OnceLock};

use quarry_core::{Authentication, RemoteRepository, RepositoryError, MAVEN_CENTRAL_REPOSITORY_URL};
use quarry_retry::{Retry, RetryConfig, RetryConfigError};
use serde::{Deserialize, Serialize};

pub const QUARRY_CONFIG_FILE_NAME: &str = "quarry.toml";

/// Overrides `local_repository`.
pub const QUARRY_LOCAL_REPOSITORY_ENV_VAR: &str = "QUARRY_LOCAL_REPOSITORY";
/// Overrides `offline` (`1`, `true`, `yes`, `on`).
pub const QUARRY_OFFLINE_ENV_VAR: &str = "QUARRY_OFFLINE";
/// Overrides `strict_validation` (`1`, `true`, `yes`, `on`).
pub const QUARRY_STRICT_VALIDATION_ENV_VAR: &str = "QUARRY_STRICT_VALIDATION";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse toml config: {0}")]
    Toml(String),

    #[error("invalid repository {id:?}: {source}")]
    InvalidRepository {
        id: String,
        #[source]
        source: RepositoryError,
    },

    #[error("invalid retry settings: {0}")]
    InvalidRetry(#[from] RetryConfigError),

    #[error("failed to determine home directory for default local repository path")]
    MissingHomeDir,
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` includes a source snippet, which may contain passwords.
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

fn sanitize_toml_error_message(message: &str) -> String {
    static QUOTED_STRING_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = QUOTED_STRING_RE.get_or_init(|| {
        regex::Regex::new(r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\])*'"#)
            .expect("quoted-string regex should compile")
    });
    re.replace_all(message, r#""<redacted>""#).into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl RepositoryConfig {
    pub fn to_remote_repository(&self) -> Result<RemoteRepository, ConfigError> {
        let authentication = self.username.as_ref().map(|username| Authentication {
            username: username.clone(),
            password: self.password.clone().unwrap_or_default(),
        });
        RemoteRepository::new(self.id.clone(), &self.url)
            .map(|repo| repo.with_authentication(authentication))
            .map_err(|source| ConfigError::InvalidRepository {
                id: self.id.clone(),
                source,
            })
    }
}

fn default_repositories() -> Vec<RepositoryConfig> {
    vec![RepositoryConfig {
        id: "central".to_string(),
        url: MAVEN_CENTRAL_REPOSITORY_URL.to_string(),
        username: None,
        password: None,
    }]
}

/// Java-style properties for proxy credentials, e.g. `"https.proxyUser" = "me"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Environment that profile activation is evaluated against.
///
/// Unset fields are filled from the running host where that makes sense (`os_*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesConfig {
    #[serde(default)]
    pub jdk: Option<String>,
    #[serde(default)]
    pub os_name: Option<String>,
    #[serde(default)]
    pub os_family: Option<String>,
    #[serde(default)]
    pub os_arch: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    /// System/user properties visible to `<property>` activation.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Simple level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "warn".to_owned()
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            "off" | "none" => "off".to_owned(),
            // Anything else is treated as an `EnvFilter` directive string.
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        })
    }

    /// Effective filter; `RUST_LOG`, when set, is appended to the configured directives.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        match env_directives {
            Some(env_directives) => {
                let config_directives = Self::normalize_level_directives(&self.level);
                tracing_subscriber::EnvFilter::try_new(format!(
                    "{config_directives},{env_directives}"
                ))
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuarryConfig {
    /// Local repository root; `~/.m2/repository` when unset.
    #[serde(default)]
    pub local_repository: Option<PathBuf>,

    /// Never touch the network; resolve from the local repository only.
    #[serde(default)]
    pub offline: bool,

    /// Validate cached `.jar`/`.zip` files and delete corrupted ones.
    #[serde(default)]
    pub strict_validation: bool,

    /// Remote repositories, in lookup order.
    #[serde(default = "default_repositories")]
    pub repositories: Vec<RepositoryConfig>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub profiles: ProfilesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            local_repository: None,
            offline: false,
            strict_validation: false,
            repositories: default_repositories(),
            retry: RetryConfig::default(),
            proxy: ProxyConfig::default(),
            profiles: ProfilesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl QuarryConfig {
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    /// Load `path` (or defaults when `None`) and apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(QUARRY_LOCAL_REPOSITORY_ENV_VAR).filter(|v| !v.trim().is_empty())
        {
            self.local_repository = Some(PathBuf::from(path.trim()));
        }
        if let Some(value) = lookup(QUARRY_OFFLINE_ENV_VAR) {
            self.offline = parse_flag(&value);
        }
        if let Some(value) = lookup(QUARRY_STRICT_VALIDATION_ENV_VAR) {
            self.strict_validation = parse_flag(&value);
        }
    }

    pub fn local_repository_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.local_repository {
            return Ok(path.clone());
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .filter(|home| !home.is_empty())
            .ok_or(ConfigError::MissingHomeDir)?;
        Ok(PathBuf::from(home).join(".m2").join("repository"))
    }

    pub fn remote_repositories(&self) -> Result<Vec<RemoteRepository>, ConfigError> {
        self.repositories
            .iter()
            .map(RepositoryConfig::to_remote_repository)
            .collect()
    }

    /// Build the retry policy, rejecting non-positive settings.
    pub fn retry_policy(&self) -> Result<Retry, ConfigError> {
        Ok(Retry::from_config(&self.retry)?)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

static TRACING_INIT: Once = Once::new();

/// Installs a global `tracing` subscriber writing to stderr.
///
/// Safe to call multiple times; only the first call has an effect.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::Layer as _;

    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();
        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!(
                target = "quarry.config",
                "global tracing subscriber already installed"
            );
        }
    });
}
