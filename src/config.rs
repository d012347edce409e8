//! ==============================================================================
//! config.rs - station configuration loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `station.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - StationSection: name and location of the station.
//!     - PollingConfig: base interval, sink cadences and the sink timeout.
//!     - BrokerConfig: telemetry topics and the mqtt broker (or http bridge).
//!     - CloudConfig: weather underground endpoint and station credentials.
//!     - DisplayConfig: panel geometry.
//!     - LoggingConfig: log level and payload echo.
//!
//! ==============================================================================

use crate::scheduler::{Cadence, SchedulerConfig};
use crate::sinks::DisplayLayout;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// report screen rows, counting both half gaps and the host line
const DISPLAY_ROWS: u32 = 11;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StationConfig {
    pub station: StationSection,
    pub polling: PollingConfig,
    pub broker: BrokerConfig,
    pub cloud: CloudConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
    /// file this was loaded from; None means built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StationSection {
    pub name: String,
    pub location: String,
}

impl Default for StationSection {
    fn default() -> Self {
        Self {
            name: "CastleWeather".to_string(),
            location: "37.014835,-121.979731".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    /// display refresh, in base ticks
    pub display_cadence: u64,
    /// weather underground upload, in base ticks
    pub cloud_cadence: u64,
    pub sink_timeout_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            display_cadence: 6,
            cloud_cadence: 60,
            sink_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BrokerConfig {
    /// mqtt broker host
    pub host: Option<String>,
    pub port: u16,
    pub client_id: String,
    /// http ingest bridge, used when no mqtt host is set
    pub url: Option<String>,
    pub data_topic: String,
    pub status_topic: String,
}

/// how telemetry leaves the station
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerTransport {
    Mqtt { host: String, port: u16, client_id: String },
    HttpBridge { url: String },
    Log,
}

impl BrokerConfig {
    pub fn transport(&self) -> BrokerTransport {
        match (&self.host, &self.url) {
            (Some(host), _) => BrokerTransport::Mqtt {
                host: host.clone(),
                port: self.port,
                client_id: self.client_id.clone(),
            },
            (None, Some(url)) => BrokerTransport::HttpBridge { url: url.clone() },
            (None, None) => BrokerTransport::Log,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 1883,
            client_id: "CastleWeather".to_string(),
            url: None,
            data_topic: "weather/data".to_string(),
            status_topic: "weather/status".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CloudConfig {
    pub enabled: bool,
    pub base_url: String,
    pub station_id: String,
    pub password: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://weatherstation.wunderground.com/weatherstation/updateweatherstation.php"
                .to_string(),
            station_id: "XXXXXXXXXXXX".to_string(),
            password: "XXXXXXXX".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub enabled: bool,
    pub line_spacing: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let layout = DisplayLayout::default();
        Self { enabled: true, line_spacing: layout.line_spacing, height: layout.height }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl StationConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let mut config: StationConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        config.validate()?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load with default fallback
    ///
    /// runs before logging is up (the log level lives in here), so problems
    /// go straight to stderr.
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("station.toml"),
            PathBuf::from("..").join("config").join("station.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => return config,
                    Err(e) => eprintln!("[CONFIG] Warning: failed to load {}: {:#}", path.display(), e),
                }
            }
        }

        eprintln!("[CONFIG] Warning: no config file found - using defaults");
        Self::default()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let p = &self.polling;
        if p.interval_seconds == 0 {
            bail!("polling.interval_seconds must be > 0");
        }
        if p.display_cadence == 0 || p.cloud_cadence == 0 {
            bail!("polling cadences must be > 0");
        }
        if p.sink_timeout_seconds == 0 || p.sink_timeout_seconds >= p.interval_seconds {
            bail!(
                "polling.sink_timeout_seconds ({}) must be between 1 and interval_seconds ({})",
                p.sink_timeout_seconds,
                p.interval_seconds
            );
        }
        let d = &self.display;
        let needed = d.line_spacing.checked_mul(DISPLAY_ROWS);
        if d.line_spacing == 0 || needed.map_or(true, |rows| rows > d.height) {
            bail!(
                "display.line_spacing ({}) must be > 0 and fit {} rows in display.height ({})",
                d.line_spacing,
                DISPLAY_ROWS,
                d.height
            );
        }
        Ok(())
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            base_interval: Duration::from_secs(self.polling.interval_seconds),
            cadence: Cadence {
                display: self.polling.display_cadence,
                cloud: self.polling.cloud_cadence,
            },
            sink_timeout: Duration::from_secs(self.polling.sink_timeout_seconds),
            show_sensor_data: self.logging.show_sensor_data,
        }
    }

    pub fn display_layout(&self) -> DisplayLayout {
        DisplayLayout { line_spacing: self.display.line_spacing, height: self.display.height }
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        match &self.source {
            Some(path) => tracing::info!(target: "config", "loaded from {}", path.display()),
            None => tracing::info!(target: "config", "using built-in defaults"),
        }
        tracing::info!(target: "config", "station: {} ({})", self.station.name, self.station.location);
        tracing::info!(
            target: "config",
            "base tick: {}s | display every {} | cloud every {} | sink timeout {}s",
            self.polling.interval_seconds,
            self.polling.display_cadence,
            self.polling.cloud_cadence,
            self.polling.sink_timeout_seconds
        );
        let broker = match self.broker.transport() {
            BrokerTransport::Mqtt { host, port, .. } => format!("mqtt://{}:{}", host, port),
            BrokerTransport::HttpBridge { url } => url,
            BrokerTransport::Log => "log only".to_string(),
        };
        tracing::info!(
            target: "config",
            "broker: {} | cloud upload: {} | display: {}",
            broker,
            if self.cloud.enabled { "on" } else { "off" },
            if self.display.enabled { "on" } else { "off" }
        );
    }
}
