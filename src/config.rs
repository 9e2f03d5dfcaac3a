use clap::Parser;
use serde::Deserialize;
use std::fs::read_to_string;
use std::net::SocketAddr;
use std::time::Duration;

use hub_core::{HeartbeatConfig, OrgId, UserId};

#[derive(Deserialize, Debug)]
pub struct Hub {
    /// address the `/ws/` and control-plane HTTP endpoints bind to.
    #[serde(default = "Hub::listen")]
    pub listen: SocketAddr,

    /// realm reported in logs; purely informational.
    #[serde(default = "Hub::realm")]
    pub realm: String,
}

impl Hub {
    fn listen() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn realm() -> String {
        "localhost".to_string()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
            realm: Self::realm(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Auth {
    /// HMAC secret used to verify HS256 bearer tokens (§4.3).
    ///
    /// Warn: the default is only fit for local development. Production
    /// deployments must override this from the config file or an
    /// environment-backed secret store.
    #[serde(default = "Auth::secret")]
    pub secret: String,
}

impl Auth {
    fn secret() -> String {
        "dev-only-insecure-secret".to_string()
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            secret: Self::secret(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Heartbeat {
    #[serde(default = "Heartbeat::ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "Heartbeat::pong_timeout_secs")]
    pub pong_timeout_secs: u64,
    #[serde(default = "Heartbeat::watch_interval_secs")]
    pub watch_interval_secs: u64,
}

impl Heartbeat {
    fn ping_interval_secs() -> u64 {
        30
    }

    fn pong_timeout_secs() -> u64 {
        60
    }

    fn watch_interval_secs() -> u64 {
        10
    }

    pub fn as_core_config(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs),
            watch_interval: Duration::from_secs(self.watch_interval_secs),
        }
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            ping_interval_secs: Self::ping_interval_secs(),
            pong_timeout_secs: Self::pong_timeout_secs(),
            watch_interval_secs: Self::watch_interval_secs(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

/// A user row to bootstrap the in-memory store with at startup.
///
/// There is no registration/OTP flow in this hub (out of scope); seeding is
/// the config-driven substitute for it, a static identity map populated
/// once at startup.
#[derive(Deserialize, Debug, Clone)]
pub struct SeedUser {
    pub id: UserId,
    pub email: String,
    #[serde(default = "SeedUser::is_active")]
    pub is_active: bool,
}

impl SeedUser {
    fn is_active() -> bool {
        true
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SeedOrg {
    pub id: OrgId,
    pub name: String,
    pub subnet: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SeedMembership {
    pub user_id: UserId,
    pub org_id: OrgId,
}

#[derive(Deserialize, Debug, Default)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub orgs: Vec<SeedOrg>,
    #[serde(default)]
    pub memberships: Vec<SeedMembership>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub hub: Hub,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub heartbeat: Heartbeat,
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub seed: Seed,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub: Hub::default(),
            auth: Auth::default(),
            heartbeat: Heartbeat::default(),
            log: Log::default(),
            seed: Seed::default(),
        }
    }
}

#[derive(Parser)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// path to a json5 config file; built-in defaults are used for anything
    /// it omits, and entirely if no path is given.
    #[arg(long)]
    config: Option<String>,
}

impl Config {
    /// Loads command line parameters, reading the configuration file they
    /// name if one was given, falling back to built-in defaults otherwise.
    pub fn load() -> anyhow::Result<Self> {
        let cfg_str = match Cli::parse().config {
            Some(path) => read_to_string(path)?,
            None => "{}".to_string(),
        };
        Ok(serde_json5::from_str(&cfg_str)?)
    }
}
