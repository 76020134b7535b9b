use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use netjack_game::protocol::DISCOVERY_PORT;

pub fn load() -> Result<Settings, ConfigError> {
    let env = env::var(RUN_MODE_ENV).unwrap_or_else(|_| "development".into());
    Config::builder()
        .add_source(File::with_name(DEFAULT_CFG_PATH).required(false))
        .add_source(File::with_name(&format!("config/client-{}", env)).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

const DEFAULT_CFG_PATH: &str = "config/client";
const RUN_MODE_ENV: &str = "NETJACK_CLIENT_RUN_MODE";
const ENV_PREFIX: &str = "netjack_client";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: Logging,
    pub client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: "warn".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Client {
    pub team_name: String,
    /// The UDP port offers are expected on.
    pub discovery_port: u16,
    /// How often discovery wakes up to check for cancellation.
    pub poll_interval_ms: u64,
    pub read_timeout_secs: u64,
}

impl Client {
    pub fn discovery_addr(&self) -> String {
        format!("0.0.0.0:{}", self.discovery_port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for Client {
    fn default() -> Self {
        Client {
            team_name: "netjack".into(),
            discovery_port: DISCOVERY_PORT,
            poll_interval_ms: 1000,
            read_timeout_secs: 60,
        }
    }
}
