use std::default::Default;
use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use netjack_game::protocol::DISCOVERY_PORT;

pub fn load() -> Result<Settings, ConfigError> {
    let env = env::var(RUN_MODE_ENV).unwrap_or_else(|_| "development".into());
    Config::builder()
        .add_source(File::with_name(DEFAULT_CFG_PATH).required(false))
        .add_source(File::with_name(&format!("config/{}", env)).required(false))
        .add_source(File::with_name(LOCAL_CFG_PATH).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

const DEFAULT_CFG_PATH: &str = "config/default";
const LOCAL_CFG_PATH: &str = "config/local";
const RUN_MODE_ENV: &str = "NETJACK_SERVER_RUN_MODE";
const ENV_PREFIX: &str = "netjack_server";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: Logging,
    pub runtime: Runtime,
    pub server: Server,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Runtime {
    pub threaded: bool,
    pub worker_threads: usize,
    pub max_blocking_threads: usize,
    pub thread_name: String,
}

impl Default for Runtime {
    fn default() -> Self {
        let num_cores = num_cpus::get_physical();
        Runtime {
            threaded: true,
            worker_threads: num_cores,
            max_blocking_threads: num_cores * 2,
            thread_name: "async-worker".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Server {
    /// Where to accept game sessions. The port is what gets advertised.
    pub bind_addr: String,
    /// The name advertised in offers.
    pub name: String,
    /// Where offers are sent.
    pub broadcast_addr: String,
    pub offer_interval_ms: u64,
    /// How long a session waits for the client before giving up.
    pub read_timeout_secs: u64,
}

impl Server {
    pub fn offer_interval(&self) -> Duration {
        Duration::from_millis(self.offer_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for Server {
    fn default() -> Self {
        Server {
            bind_addr: "0.0.0.0:5555".into(),
            name: "netjack".into(),
            broadcast_addr: format!("255.255.255.255:{}", DISCOVERY_PORT),
            offer_interval_ms: 1000,
            read_timeout_secs: 60,
        }
    }
}
