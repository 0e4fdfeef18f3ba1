use std::{net::SocketAddr, time::Duration};

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_TIMEOUT_SECS: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    pub metrics_bind_addr: Option<SocketAddr>,
    #[serde(default)]
    pub upstream_servers: Vec<String>,
    /// Seconds to wait for an upstream reply.
    pub timeout: Option<i64>,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 53))
}

impl Config {
    pub fn init() -> Result<Self> {
        let config_name = std::env::args()
            .nth(1)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
        Self::load(&config_name).with_context(|| format!("Error loading config {}", config_name))
    }

    pub fn load(config_name: &str) -> Result<Self> {
        Self::from_source(config::File::with_name(config_name))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.upstream_servers.is_empty(),
            "No upstream servers configured"
        );
        for server in &self.upstream_servers {
            validate_upstream(server)?;
        }
        if let Some(timeout) = self.timeout {
            ensure!(
                timeout > 0,
                "Invalid timeout value {}: must be greater than 0",
                timeout
            );
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS) as u64)
    }
}

fn validate_upstream(server: &str) -> Result<()> {
    let (host, port) = match server.rsplit_once(':') {
        Some(parts) => parts,
        None => bail!("Upstream server {} should be host:port", server),
    };
    ensure!(
        !host.is_empty(),
        "Upstream server {} has an empty host",
        server
    );
    port.parse::<u16>()
        .with_context(|| format!("Upstream server {} has an invalid port", server))?;
    Ok(())
}
