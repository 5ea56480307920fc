//! Server configuration: TOML file + CLI overrides.

use castrel_core::{RelayError, RelayResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
        }
    }
}

fn default_max_clients() -> usize {
    256
}

/// Resolved server configuration (CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening port. Zero asks the OS for an ephemeral port.
    pub port: u16,
    /// Upper bound on concurrently registered sessions.
    pub max_clients: usize,
}

impl ServerConfig {
    /// Load config from a TOML file, then apply CLI overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(
        config_path: Option<&Path>,
        port: u16,
        cli_max_clients: Option<usize>,
    ) -> RelayResult<Self> {
        let file_config = if let Some(path) = config_path {
            let expanded = expand_tilde(path);
            if expanded.exists() {
                info!(path = %expanded.display(), "loading config file");
                let content = std::fs::read_to_string(&expanded)?;
                toml::from_str::<ConfigFile>(&content)
                    .map_err(|e| RelayError::Other(format!("config parse error: {e}")))?
            } else {
                info!(path = %expanded.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
        } else {
            ConfigFile::default()
        };

        Ok(Self {
            port,
            max_clients: cli_max_clients.unwrap_or(file_config.server.max_clients),
        })
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_section() {
        let parsed: ConfigFile = toml::from_str("[server]\nmax_clients = 12\n").expect("parse");
        assert_eq!(parsed.server.max_clients, 12);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let parsed: ConfigFile = toml::from_str("").expect("parse");
        assert_eq!(parsed.server.max_clients, 256);
    }

    #[test]
    fn cli_override_wins() {
        let config = ServerConfig::load(None, 7000, Some(3)).expect("load");
        assert_eq!(config.port, 7000);
        assert_eq!(config.max_clients, 3);
    }
}
