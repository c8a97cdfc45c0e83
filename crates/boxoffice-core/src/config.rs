//! Client configuration.
//!
//! Stored as `config.json` in the config directory. Every field has a default,
//! so a missing file (or a partial one) is fine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cookies::DEFAULT_CSRF_COOKIE;

const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown auth mode: {0} (expected \"csrf-cookie\" or \"bearer\")")]
    UnknownMode(String),
}

/// Which handshake the API expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Fetch a CSRF cookie, echo it in a header, let the server hold the session.
    #[default]
    CsrfCookie,
    /// Exchange credentials for a token sent as `Authorization: Bearer`.
    Bearer,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::CsrfCookie => "csrf-cookie",
            AuthMode::Bearer => "bearer",
        }
    }
}

impl std::str::FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csrf-cookie" | "csrf" | "cookie" => Ok(AuthMode::CsrfCookie),
            "bearer" | "token" => Ok(AuthMode::Bearer),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoints {
    pub csrf: String,
    pub login: String,
    pub logout: String,
    pub register: String,
    pub user: String,
    pub probe: String,
    pub movies: String,
    pub studios: String,
    pub bookings: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            csrf: "/sanctum/csrf-cookie".to_string(),
            login: "/api/login".to_string(),
            logout: "/api/logout".to_string(),
            register: "/api/register".to_string(),
            user: "/api/user".to_string(),
            probe: "/api/ping".to_string(),
            movies: "/api/movies".to_string(),
            studios: "/api/studios".to_string(),
            bookings: "/api/bookings".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub base_url: String,

    pub mode: AuthMode,

    /// Cookie the server uses to hand out the CSRF token.
    pub csrf_cookie_name: String,

    /// Header the server expects the CSRF token in.
    pub csrf_header_name: String,

    pub endpoints: Endpoints,

    /// Directory for the HTTP wire log. No log when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            mode: AuthMode::default(),
            csrf_cookie_name: DEFAULT_CSRF_COOKIE.to_string(),
            csrf_header_name: "X-XSRF-TOKEN".to_string(),
            endpoints: Endpoints::default(),
            log_dir: None,
        }
    }
}

/// Load `config.json` from `dir`, or defaults when it doesn't exist.
pub fn load_config(dir: &Path) -> Result<ClientConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let contents = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save `config.json` to `dir` (write-then-rename).
pub fn save_config(dir: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    fs::create_dir_all(dir)?;

    let file_path = dir.join(CONFIG_FILE);
    let temp_path = dir.join(format!("{CONFIG_FILE}.tmp"));

    let json = serde_json::to_string_pretty(config)?;
    fs::write(&temp_path, &json)?;
    fs::rename(&temp_path, &file_path)?;

    Ok(())
}
