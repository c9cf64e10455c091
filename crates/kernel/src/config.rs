//! Configuration loaded from environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Secret key for form token digests (SECURITY_SALT, required).
    pub security_salt: String,

    /// Whether debug output (including `_Token[debug]`) is enabled (default: false).
    pub debug: bool,

    /// Field names unlocked on every form (comma-separated, default: none).
    pub unlocked_fields: Vec<String>,

    /// Optional YAML file with template overrides.
    pub templates_file: Option<PathBuf>,

    /// Whether session cookies carry the Secure flag (default: true).
    pub cookie_secure: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let security_salt =
            env::var("SECURITY_SALT").context("SECURITY_SALT environment variable is required")?;
        if security_salt.is_empty() {
            anyhow::bail!("SECURITY_SALT must not be empty");
        }

        let debug = env::var("DEBUG")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let unlocked_fields = env::var("FORM_UNLOCKED_FIELDS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let templates_file = env::var("TEMPLATES_FILE").ok().map(PathBuf::from);

        let cookie_secure = env::var("COOKIE_SECURE")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        Ok(Self {
            port,
            security_salt,
            debug,
            unlocked_fields,
            templates_file,
            cookie_secure,
        })
    }

    /// Configuration handed to each form guard.
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            salt: self.security_salt.clone(),
            unlocked_fields: self.unlocked_fields.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("security_salt", &"<redacted>")
            .field("debug", &self.debug)
            .field("unlocked_fields", &self.unlocked_fields)
            .field("templates_file", &self.templates_file)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

/// Per-guard configuration: the HMAC key and the fields unlocked up front.
#[derive(Clone, Default)]
pub struct GuardConfig {
    pub salt: String,
    pub unlocked_fields: Vec<String>,
}

impl GuardConfig {
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            unlocked_fields: Vec::new(),
        }
    }

    /// Pre-register unlocked field names.
    pub fn unlocked(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.unlocked_fields.extend(names.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("salt", &"<redacted>")
            .field("unlocked_fields", &self.unlocked_fields)
            .finish()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
