//! Configuration System
//!
//! Two layers:
//! - [`UploadConfig`]: the five required parameters, read once from the
//!   environment at startup and validated in full before any work runs.
//! - [`Settings`]: optional ambient settings (API endpoint, collector, logging) merged by
//!   the `config` crate from defaults, an optional TOML file and `KVPUSH_*`
//!   environment overrides.

use crate::collector::CollectorConfig;
use crate::error::UploadError;
use crate::kv::DEFAULT_API_BASE_URL;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

pub const ENV_API_KEY: &str = "CF_API_KEY";
pub const ENV_API_EMAIL: &str = "CF_API_EMAIL";
pub const ENV_TARGET_DIRECTORY: &str = "TARGET_DIRECTORY";
pub const ENV_ACCOUNT_ID: &str = "CF_API_ACCOUNT_ID";
pub const ENV_NAMESPACE: &str = "CF_KV_NAMESPACE";

/// Every required parameter, in reporting order.
pub const REQUIRED_ENV_VARS: [&str; 5] = [
    ENV_API_KEY,
    ENV_API_EMAIL,
    ENV_TARGET_DIRECTORY,
    ENV_ACCOUNT_ID,
    ENV_NAMESPACE,
];

/// Prefix for ambient setting overrides, e.g. `KVPUSH_LOGGING__LEVEL`.
const SETTINGS_ENV_PREFIX: &str = "KVPUSH";

/// Account credentials for the KV API
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_email: String,
    pub account_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_email", &self.api_email)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Required run parameters
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Root of the tree to upload
    pub target_directory: PathBuf,
    pub credentials: Credentials,
    /// Title of the namespace to find or create
    pub namespace: String,
    /// Walk options for the target directory
    pub collector: CollectorConfig,
}

impl UploadConfig {
    /// Read the required parameters from the process environment.
    pub fn from_env() -> Result<Self, UploadError> {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    /// Build from an arbitrary lookup. A present but empty value counts as set.
    ///
    /// All missing names are reported together in [`UploadError::MissingConfig`].
    /// The target directory is taken as a raw OS path; the other values must be
    /// valid unicode, otherwise [`UploadError::NonUnicodeConfig`] names them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, UploadError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let values: Vec<Option<OsString>> =
            REQUIRED_ENV_VARS.iter().map(|&name| lookup(name)).collect();

        let missing: Vec<String> = REQUIRED_ENV_VARS
            .iter()
            .zip(&values)
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(UploadError::MissingConfig { names: missing });
        }

        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        let api_key = next();
        let api_email = next();
        let target_directory = PathBuf::from(next());
        let account_id = next();
        let namespace = next();

        let mut non_unicode = Vec::new();
        let mut text = |name: &str, value: OsString| {
            value.into_string().unwrap_or_else(|_| {
                non_unicode.push(name.to_string());
                String::new()
            })
        };
        let api_key = text(ENV_API_KEY, api_key);
        let api_email = text(ENV_API_EMAIL, api_email);
        let account_id = text(ENV_ACCOUNT_ID, account_id);
        let namespace = text(ENV_NAMESPACE, namespace);
        if !non_unicode.is_empty() {
            return Err(UploadError::NonUnicodeConfig { names: non_unicode });
        }

        Ok(Self {
            target_directory,
            credentials: Credentials {
                api_key,
                api_email,
                account_id,
            },
            namespace,
            collector: CollectorConfig::default(),
        })
    }
}

/// HTTP endpoint settings for the KV API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Route requests through proxies named by `HTTP_PROXY`/`HTTPS_PROXY`
    #[serde(default = "default_system_proxy")]
    pub system_proxy: bool,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_system_proxy() -> bool {
    true
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            system_proxy: default_system_proxy(),
        }
    }
}

/// Optional ambient settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from defaults, an optional file, and `KVPUSH_*` overrides.
    pub fn load(file: Option<&Path>) -> Result<Self, UploadError> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            let path = dunce::canonicalize(path).map_err(|e| {
                UploadError::Settings(format!(
                    "Failed to resolve config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(SETTINGS_ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML string (no environment overrides).
    pub fn from_toml_str(contents: &str) -> Result<Self, UploadError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        if self.api.base_url.trim().is_empty() {
            return Err(UploadError::Settings("api.base_url cannot be empty".to_string()));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(UploadError::Settings(
                "api.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
