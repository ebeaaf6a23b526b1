//! Service configuration

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Authentication service settings
///
/// Loaded from `AUTH_*` environment variables, e.g. `AUTH_PIN_LENGTH=8`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Listen address (default: `0.0.0.0:3000`)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Number of digits in an issued PIN (default: 6)
    #[serde(default = "default_pin_length")]
    pub pin_length: usize,
    /// How long a PIN stays valid after it was last issued (default: 300)
    #[serde(default = "default_pin_ttl_seconds")]
    pub pin_ttl_seconds: u64,
    /// Session cookie name (default: `session_id`)
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Mark the session cookie `Secure` (default: true)
    #[serde(default = "default_true")]
    pub cookie_secure: bool,
    /// Where blank logins and anonymous page visits are sent (default: `/`)
    #[serde(default = "default_home_path")]
    pub home_path: String,
    /// Where a successful Google sign-in lands (default: `/login`)
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Subject of the PIN email
    #[serde(default = "default_mail_subject")]
    pub mail_subject: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_pin_length() -> usize {
    6
}

fn default_pin_ttl_seconds() -> u64 {
    300
}

fn default_cookie_name() -> String {
    "session_id".to_string()
}

fn default_true() -> bool {
    true
}

fn default_home_path() -> String {
    "/".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_mail_subject() -> String {
    "Your sign-in code".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            pin_length: default_pin_length(),
            pin_ttl_seconds: default_pin_ttl_seconds(),
            cookie_name: default_cookie_name(),
            cookie_secure: default_true(),
            home_path: default_home_path(),
            login_path: default_login_path(),
            mail_subject: default_mail_subject(),
        }
    }
}

impl AuthConfig {
    /// Load the configuration from `AUTH_*` environment variables
    pub fn from_env() -> Result<Self> {
        let config: AuthConfig = Config::builder()
            .add_source(Environment::with_prefix("AUTH").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.pin_length == 0 {
            anyhow::bail!("AUTH_PIN_LENGTH must be at least 1");
        }

        Ok(config)
    }

    /// Validity window of an issued PIN
    pub fn pin_ttl(&self) -> Duration {
        Duration::from_secs(self.pin_ttl_seconds)
    }
}
