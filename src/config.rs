use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Fleet backend the units report to
    pub backend: BackendConfig,
    /// Real-time store mirrored alongside the backend
    pub realtime: RealtimeConfig,
    /// GPS daemon connection (bus units only)
    #[serde(default)]
    pub gps: GpsConfig,
    /// Short-range transceiver attached to the unit
    #[serde(default)]
    pub transceiver: TransceiverConfig,
    /// Onboard tracker settings
    #[serde(default)]
    pub bus: BusConfig,
    /// Roadside receiver settings
    #[serde(default)]
    pub station: StationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the fleet API, e.g. "https://fleet.example.com"
    pub base_url: String,
    /// Token sent as `Authorization: Token <key>`
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Base URL of the real-time store, e.g. "https://your-app.firebaseio.com"
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GpsConfig {
    /// Address of the gpsd-compatible daemon (default: 127.0.0.1:2947)
    #[serde(default = "GpsConfig::default_daemon_addr")]
    pub daemon_addr: String,
    /// Reference point for synthetic fixes when no live fix is available
    #[serde(default = "GpsConfig::default_reference_latitude")]
    pub reference_latitude: f64,
    #[serde(default = "GpsConfig::default_reference_longitude")]
    pub reference_longitude: f64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            daemon_addr: Self::default_daemon_addr(),
            reference_latitude: Self::default_reference_latitude(),
            reference_longitude: Self::default_reference_longitude(),
        }
    }
}

impl GpsConfig {
    fn default_daemon_addr() -> String {
        "127.0.0.1:2947".to_string()
    }
    fn default_reference_latitude() -> f64 {
        37.7749
    }
    fn default_reference_longitude() -> f64 {
        -122.4194
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransceiverConfig {
    /// Serial device path (default: /dev/ttyUSB0)
    #[serde(default = "TransceiverConfig::default_device")]
    pub device: String,
    /// Baud rate (default: 9600)
    #[serde(default = "TransceiverConfig::default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            device: Self::default_device(),
            baud_rate: Self::default_baud_rate(),
        }
    }
}

impl TransceiverConfig {
    fn default_device() -> String {
        "/dev/ttyUSB0".to_string()
    }
    fn default_baud_rate() -> u32 {
        9600
    }
}

/// Settings for the onboard tracker unit
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Identity of this bus, assigned by the fleet backend
    #[serde(default)]
    pub bus_id: String,
    /// Seconds between tracker cycles (default: 5)
    #[serde(default = "BusConfig::default_update_interval_secs")]
    pub update_interval_secs: u64,
    /// Radius in km for the nearby-station lookup (default: 0.5)
    #[serde(default = "BusConfig::default_search_radius_km")]
    pub search_radius_km: f64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bus_id: String::new(),
            update_interval_secs: Self::default_update_interval_secs(),
            search_radius_km: Self::default_search_radius_km(),
        }
    }
}

impl BusConfig {
    fn default_update_interval_secs() -> u64 {
        5
    }
    fn default_search_radius_km() -> f64 {
        0.5
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bus_id.is_empty() {
            return Err("bus.bus_id must be set".to_string());
        }
        if self.update_interval_secs == 0 {
            return Err("bus.update_interval_secs must be at least 1".to_string());
        }
        if self.search_radius_km <= 0.0 {
            return Err("bus.search_radius_km must be positive".to_string());
        }
        Ok(())
    }
}

/// Settings for the roadside receiver unit
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    /// Identity of this station, assigned by the fleet backend
    #[serde(default)]
    pub station_id: String,
    /// Seconds between receiver cycles (default: 1)
    #[serde(default = "StationConfig::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds after which an unseen bus is evicted (default: 300)
    #[serde(default = "StationConfig::default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Longer wait applied after a cycle error (default: 5)
    #[serde(default = "StationConfig::default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            station_id: String::new(),
            poll_interval_secs: Self::default_poll_interval_secs(),
            stale_after_secs: Self::default_stale_after_secs(),
            error_backoff_secs: Self::default_error_backoff_secs(),
        }
    }
}

impl StationConfig {
    fn default_poll_interval_secs() -> u64 {
        1
    }
    fn default_stale_after_secs() -> u64 {
        300
    }
    fn default_error_backoff_secs() -> u64 {
        5
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.station_id.is_empty() {
            return Err("station.station_id must be set".to_string());
        }
        if self.poll_interval_secs == 0 {
            return Err("station.poll_interval_secs must be at least 1".to_string());
        }
        if self.stale_after_secs == 0 {
            return Err("station.stale_after_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if !config.backend.base_url.starts_with("http") {
            return Err(ConfigError::ParseError(format!(
                "backend.base_url must be an http(s) URL, got '{}'",
                config.backend.base_url
            )));
        }
        if !config.realtime.base_url.starts_with("http") {
            return Err(ConfigError::ParseError(format!(
                "realtime.base_url must be an http(s) URL, got '{}'",
                config.realtime.base_url
            )));
        }

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}
