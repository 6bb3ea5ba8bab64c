//! Process configuration read from the environment.

use std::{
    env,
    ffi::OsString,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use tracing::warn;

const DEFAULT_PORT: u16 = 5001;
/// Default location of the persisted event selection.
const DEFAULT_DISPLAY_CONFIG_PATH: &str = "config/display.json";
/// Default location of the persisted refresh token.
const DEFAULT_REFRESH_TOKEN_PATH: &str = "config/refresh_token.txt";

const DISPLAY_CONFIG_PATH_ENV: &str = "DISPLAY_CONFIG_PATH";
const REFRESH_TOKEN_PATH_ENV: &str = "REFRESH_TOKEN_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration of the server process.
pub struct AppConfig {
    /// TCP port the HTTP server listens on.
    pub port: u16,
    /// File holding the persisted event selection.
    pub display_config_path: PathBuf,
    /// File holding the persisted refresh token.
    pub refresh_token_path: PathBuf,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var_os(key))
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let port = ["PORT", "SERVER_PORT"]
            .into_iter()
            .find_map(|key| lookup(key).map(|value| (key, value)))
            .and_then(|(key, value)| {
                let parsed = value.to_str().and_then(|text| text.trim().parse::<u16>().ok());
                if parsed.is_none() {
                    warn!(var = key, value = ?value, "invalid port; using default");
                }
                parsed
            })
            .unwrap_or(DEFAULT_PORT);

        Self {
            port,
            display_config_path: resolve_path(&lookup, DISPLAY_CONFIG_PATH_ENV, DEFAULT_DISPLAY_CONFIG_PATH),
            refresh_token_path: resolve_path(&lookup, REFRESH_TOKEN_PATH_ENV, DEFAULT_REFRESH_TOKEN_PATH),
        }
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

/// Resolve a path taking the environment override into account.
fn resolve_path(lookup: &impl Fn(&str) -> Option<OsString>, var: &str, default: &str) -> PathBuf {
    lookup(var)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(default))
}
