use crate::application::poller::PollerConfig;
use crate::domain::sensor::UnitSystem;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub units: UnitSystem,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub protocol: String,
    pub request_timeout_secs: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            host: "192.168.19.14".to_string(),
            port: 5678,
            name: "AthliOS".to_string(),
            protocol: "http".to_string(),
            request_timeout_secs: 5,
        }
    }
}

impl DeviceSettings {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { interval_secs: 2 }
    }
}

impl PollSettings {
    /// Poller settings for the steady-state `ha` and `server` endpoints
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            ..PollerConfig::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Load `config/athlios.*` (optional) overlaid with `ATHLIOS__*` env vars,
/// e.g. `ATHLIOS__DEVICE__HOST=10.0.0.2`
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/athlios").required(false))
        .add_source(
            config::Environment::with_prefix("ATHLIOS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("");
        assert_eq!(config.device.base_url(), "http://192.168.19.14:5678");
        assert_eq!(config.device.name, "AthliOS");
        assert_eq!(config.device.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.poll.poller_config().interval, Duration::from_secs(2));
        assert_eq!(config.units, UnitSystem::Metric);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_overrides() {
        let config = parse(
            r#"
            units = "imperial"

            [device]
            host = "10.0.0.2"
            port = 8443
            protocol = "https"

            [poll]
            interval_secs = 5
            "#,
        );

        assert_eq!(config.device.base_url(), "https://10.0.0.2:8443");
        assert_eq!(config.device.name, "AthliOS");
        assert_eq!(config.units, UnitSystem::Imperial);

        let poller = config.poll.poller_config();
        assert_eq!(poller.interval, Duration::from_secs(5));
        assert_eq!(poller.endpoints.len(), 2);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = parse("[poll]\ninterval_secs = 0\n");
        assert_eq!(config.poll.poller_config().interval, Duration::from_secs(1));
    }
}
