use std::{
    collections::HashMap,
    fs,
    net::Ipv4Addr,
    path::Path,
    time::Duration,
};

use serde::Deserialize;
use tracing::warn;

use crate::transport::DEFAULT_USER_AGENT;

pub const DEFAULT_CONFIG_PATH: &str = "olycam.toml";
const ENV_PREFIX: &str = "OLYCAM__";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Host or `host:port` of the camera's HTTP server.
    pub gateway: String,
    pub user_agent: String,
    pub command_timeout_ms: u64,
    pub poll_tick_ms: u64,
    pub wifi_poll_interval_ms: u64,
    pub property_poll_interval_ms: u64,
    pub live_view_quality: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway: "192.168.0.10".into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            command_timeout_ms: 5000,
            poll_tick_ms: 50,
            wifi_poll_interval_ms: 2000,
            property_poll_interval_ms: 500,
            live_view_quality: "0320x0240".into(),
        }
    }
}

impl Settings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn poll_tick(&self) -> Duration {
        Duration::from_millis(self.poll_tick_ms.max(1))
    }

    pub fn wifi_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wifi_poll_interval_ms)
    }

    pub fn property_poll_interval(&self) -> Duration {
        Duration::from_millis(self.property_poll_interval_ms)
    }

    /// The gateway as an IPv4 address, ignoring any port. `None` for host names.
    pub fn gateway_ip(&self) -> Option<Ipv4Addr> {
        let host = self
            .gateway
            .rsplit_once(':')
            .map_or(self.gateway.as_str(), |(host, _)| host);
        host.parse().ok()
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "gateway" => self.gateway = value.to_string(),
            "user_agent" => self.user_agent = value.to_string(),
            "live_view_quality" => self.live_view_quality = value.to_string(),
            "command_timeout_ms" => set_millis(&mut self.command_timeout_ms, key, value),
            "poll_tick_ms" => set_millis(&mut self.poll_tick_ms, key, value),
            "wifi_poll_interval_ms" => set_millis(&mut self.wifi_poll_interval_ms, key, value),
            "property_poll_interval_ms" => {
                set_millis(&mut self.property_poll_interval_ms, key, value)
            }
            _ => {}
        }
    }
}

fn set_millis(slot: &mut u64, key: &str, value: &str) {
    match value.trim().parse::<u64>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value, "ignoring non-numeric setting"),
    }
}

const KEYS: [&str; 7] = [
    "gateway",
    "user_agent",
    "command_timeout_ms",
    "poll_tick_ms",
    "wifi_poll_interval_ms",
    "property_poll_interval_ms",
    "live_view_quality",
];

/// Defaults, then the flat TOML file at `path` if readable, then `OLYCAM__*` variables.
pub fn load_settings_from(path: &Path) -> Settings {
    let file = fs::read_to_string(path).ok();
    resolve_settings(file.as_deref(), |name| std::env::var(name).ok())
}

fn resolve_settings(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => {
                for (key, value) in &file_cfg {
                    settings.apply(key, value);
                }
            }
            Err(err) => warn!(error = %err, "ignoring unreadable config file"),
        }
    }

    for key in KEYS {
        let name = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
        if let Some(value) = env(&name) {
            settings.apply(key, &value);
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
