use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use roost_client::{ConnectOptions, ServerSpec};
use roost_helpers::de;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,
    #[serde(
        default = "default_session_timeout",
        deserialize_with = "de::deserialize_duration"
    )]
    pub session_timeout: Duration,
    #[serde(
        default = "default_heartbeat_interval",
        deserialize_with = "de::deserialize_duration"
    )]
    pub heartbeat_interval: Duration,
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "de::deserialize_duration"
    )]
    pub connect_timeout: Duration,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            session_timeout: default_session_timeout(),
            heartbeat_interval: default_heartbeat_interval(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from the explicit path, `ROOST_CONFIG_PATH`, or
    /// `roost.yaml` in the working directory; falls back to defaults when no
    /// file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = path
            .map(Path::to_path_buf)
            .or_else(resolve_config_path);

        match resolved {
            Some(path) => {
                let raw = std::fs::read(&path).with_context(|| {
                    format!("failed to read {}", path.display())
                })?;
                serde_yaml::from_slice(&raw).with_context(|| {
                    format!("failed to parse yaml {}", path.display())
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Resolves the configured server strings into specs, honouring a
    /// `--server` override.
    pub fn server_specs(
        &self,
        override_server: Option<&str>,
    ) -> Result<Vec<ServerSpec>> {
        let timeout_ms = self.session_timeout.as_millis() as i32;
        let entries: Vec<&str> = match override_server {
            Some(server) => vec![server],
            None => {
                self.servers.iter().map(String::as_str).collect()
            }
        };

        let mut specs = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.trim();
            let Some((host, port)) = entry.rsplit_once(':') else {
                bail!("server entry must be host:port, got {entry:?}");
            };
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid port in {entry:?}"))?;
            if host.is_empty() {
                bail!("server entry must be host:port, got {entry:?}");
            }
            specs.push(ServerSpec::new(host, port, timeout_ms));
        }
        if specs.is_empty() {
            bail!("no servers configured");
        }
        Ok(specs)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            heartbeat_interval: self.heartbeat_interval,
            connect_timeout: self.connect_timeout,
        }
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Some(path) = non_empty_env("ROOST_CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidate = cwd.join("roost.yaml");
    if candidate.exists() { Some(candidate) } else { None }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    })
}

fn default_servers() -> Vec<String> {
    vec!["127.0.0.1:2181".to_string()]
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}
