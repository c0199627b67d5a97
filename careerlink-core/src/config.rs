//! Client configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `CAREERLINK_*` environment variables (`CAREERLINK_API__BASE_URL`, ...).

use crate::error::{CareerlinkError, CareerlinkResult, ErrorContext};
use crate::logging::LoggingConfig;
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration of the careerlink client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CareerlinkConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub session: SessionSettings,
    pub routes: RouteConfig,
    pub logging: LoggingConfig,
}

/// Remote authority endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_seconds: 30,
            user_agent: format!("careerlink/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Where persisted credentials live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub credentials_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: "~/.careerlink/credentials.json".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn credentials_path(&self) -> PathBuf {
        expand_home(&self.credentials_path)
    }
}

/// Session manager tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Delay between a successful login/register and the navigation intent
    pub navigation_delay_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            navigation_delay_ms: 100,
        }
    }
}

/// Navigation targets used by the session manager and route guards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub public_home: String,
    pub login: String,
    pub student_home: String,
    pub recruiter_home: String,
    pub admin_home: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            public_home: "/".to_string(),
            login: "/login".to_string(),
            student_home: "/student/dashboard".to_string(),
            recruiter_home: "/recruiter/dashboard".to_string(),
            admin_home: "/admin".to_string(),
        }
    }
}

impl RouteConfig {
    /// Where a freshly signed-in account is sent. Admins have no landing page.
    pub fn home_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Student => Some(&self.student_home),
            Role::Recruiter => Some(&self.recruiter_home),
            Role::Admin => None,
        }
    }

    /// Dashboard of a role, used when a guard turns an account away
    pub fn dashboard_for(&self, role: Role) -> &str {
        match role {
            Role::Student => &self.student_home,
            Role::Recruiter => &self.recruiter_home,
            Role::Admin => &self.admin_home,
        }
    }

    fn all(&self) -> [(&'static str, &str); 5] {
        [
            ("routes.public_home", &self.public_home),
            ("routes.login", &self.login),
            ("routes.student_home", &self.student_home),
            ("routes.recruiter_home", &self.recruiter_home),
            ("routes.admin_home", &self.admin_home),
        ]
    }
}

/// Resolve a leading `~` against the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

impl CareerlinkConfig {
    /// Environment variable prefix for overrides
    pub const ENV_PREFIX: &'static str = "CAREERLINK";

    /// Load defaults, an optional TOML file and environment overrides
    pub fn load(path: Option<&Path>) -> CareerlinkResult<Self> {
        let defaults = config::Config::try_from(&Self::default()).map_err(|e| {
            CareerlinkError::Config {
                message: format!("Failed to build default config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config").with_operation("defaults"),
            }
        })?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(Self::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|settings| settings.try_deserialize::<Self>())
            .map_err(|e| CareerlinkError::Config {
                message: format!("Failed to load config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("load")
                    .with_suggestion("Check TOML syntax in config file")
                    .with_suggestion("Check CAREERLINK_* environment variables"),
            })
    }

    /// Load configuration from a TOML file only
    pub fn from_file<P: AsRef<Path>>(path: P) -> CareerlinkResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CareerlinkError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        toml::from_str(&content).map_err(|e| CareerlinkError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> CareerlinkResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| CareerlinkError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })
    }

    pub fn to_toml(&self) -> CareerlinkResult<String> {
        toml::to_string_pretty(self).map_err(|e| CareerlinkError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> CareerlinkResult<()> {
        let base_url = url::Url::parse(&self.api.base_url).map_err(|e| CareerlinkError::Config {
            message: format!("Invalid api.base_url '{}': {}", self.api.base_url, e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("validate")
                .with_suggestion("Use an absolute URL such as https://api.example.com/api"),
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(CareerlinkError::Config {
                message: format!("Unsupported api.base_url scheme: {}", base_url.scheme()),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use http or https"),
            });
        }

        if self.api.timeout_seconds == 0 {
            return Err(CareerlinkError::Config {
                message: "api.timeout_seconds must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set api.timeout_seconds to a positive value"),
            });
        }

        for (key, route) in self.routes.all() {
            if !route.starts_with('/') {
                return Err(CareerlinkError::Config {
                    message: format!("{} must be an absolute path, got '{}'", key, route),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_metadata("key", key),
                });
            }
        }

        Ok(())
    }
}
