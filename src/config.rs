//! Configuration Management
//!
//! Handles persistent configuration storage for osops and resolution of
//! Keystone credentials from flags, `OS_*` environment variables and the
//! config file.

use crate::resource::WaitSpec;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_INTERFACE: &str = "public";
const DEFAULT_DOMAIN: &str = "Default";

/// Partially specified Keystone credentials
///
/// Every layer (config file, environment, CLI flags) produces one of these;
/// [`AuthConfig::overlay`] merges them with the later layer winning.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Never written back by [`Config::save`]
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_domain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_domain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

impl AuthConfig {
    /// Read the standard `OS_*` variables from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the standard `OS_*` variables through an arbitrary lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            auth_url: get("OS_AUTH_URL"),
            username: get("OS_USERNAME"),
            password: get("OS_PASSWORD"),
            project_name: get("OS_PROJECT_NAME").or_else(|| get("OS_TENANT_NAME")),
            user_domain_name: get("OS_USER_DOMAIN_NAME"),
            project_domain_name: get("OS_PROJECT_DOMAIN_NAME"),
            region: get("OS_REGION_NAME"),
            interface: get("OS_INTERFACE"),
        }
    }

    /// Merge another layer on top of this one (set fields in `top` win)
    pub fn overlay(self, top: AuthConfig) -> AuthConfig {
        AuthConfig {
            auth_url: top.auth_url.or(self.auth_url),
            username: top.username.or(self.username),
            password: top.password.or(self.password),
            project_name: top.project_name.or(self.project_name),
            user_domain_name: top.user_domain_name.or(self.user_domain_name),
            project_domain_name: top.project_domain_name.or(self.project_domain_name),
            region: top.region.or(self.region),
            interface: top.interface.or(self.interface),
        }
    }

    /// Resolve into complete settings, failing on missing required fields
    pub fn resolve(self) -> Result<AuthSettings> {
        let auth_url = self
            .auth_url
            .context("No Keystone URL configured. Set OS_AUTH_URL or use --auth-url")?;
        let parsed = url::Url::parse(&auth_url)
            .with_context(|| format!("Invalid Keystone URL '{}'", auth_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Keystone URL must be http or https, got '{}'", auth_url);
        }

        Ok(AuthSettings {
            auth_url,
            username: self
                .username
                .context("No user configured. Set OS_USERNAME")?,
            password: self
                .password
                .context("No password configured. Set OS_PASSWORD")?,
            project_name: self
                .project_name
                .context("No project configured. Set OS_PROJECT_NAME or use --project")?,
            user_domain_name: self
                .user_domain_name
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            project_domain_name: self
                .project_domain_name
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            region: self.region,
            interface: self
                .interface
                .unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
        })
    }
}

/// Fully resolved Keystone credentials
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    pub user_domain_name: String,
    pub project_domain_name: String,
    pub region: Option<String>,
    pub interface: String,
}

/// Default polling budget for operations that wait on a status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitConfig {
    #[serde(default = "default_attempts")]
    pub attempts: NonZeroU32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
}

fn default_attempts() -> NonZeroU32 {
    WaitSpec::DEFAULT_ATTEMPTS
}

fn default_interval_secs() -> f64 {
    WaitSpec::DEFAULT_INTERVAL.as_secs_f64()
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl WaitConfig {
    /// Build a wait spec for `target_status` using these defaults
    pub fn spec(&self, target_status: &str) -> WaitSpec {
        let interval = Duration::try_from_secs_f64(self.interval_secs.max(0.0))
            .unwrap_or(WaitSpec::DEFAULT_INTERVAL);
        WaitSpec::new(target_status, self.attempts, interval)
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Keystone settings (password is never persisted)
    #[serde(default)]
    pub auth: AuthConfig,
    /// Polling defaults
    #[serde(default)]
    pub wait: WaitConfig,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("osops").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Cannot read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Load a config file the user named explicitly
    ///
    /// A missing file yields defaults so `config --save` can create it; an
    /// unreadable or malformed one is an error.
    pub fn load_explicit(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {:?}", path))
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective credentials (CLI > environment > config)
    pub fn effective_auth(&self, cli: AuthConfig) -> Result<AuthSettings> {
        self.auth
            .clone()
            .overlay(AuthConfig::from_env())
            .overlay(cli)
            .resolve()
    }
}
