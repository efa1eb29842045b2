//! Hub configuration.
//!
//! Settings are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables prefixed `SENSORHUB_`, with `__` between
//!    nested keys (e.g. `SENSORHUB_TASKS__LOGGER__RATE_HZ=1.0`)
//! 4. command-line flags, applied by the binary
//!
//! # Example file
//!
//! ```toml
//! [device]
//! kind = "simulated"
//!
//! [device.simulated]
//! interval = "500ms"
//! seed = 42
//!
//! [reader]
//! idle_backoff = "50ms"
//! error_backoff = "1s"
//!
//! [tasks.logger]
//! rate_hz = 1.0
//! priority = 64
//!
//! [alerts]
//! temperature_c = 28.0
//!
//! [log]
//! path = "sensor_log.jsonl"
//! format = "json_lines"
//!
//! [network]
//! enabled = true
//! target = "255.255.255.255:5005"
//! ```

pub mod duration;

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use sensorhub_rt::{OverrunPolicy, TaskPriority, MAX_PERIOD};
use sensorhub_sinks::LogFormat;
use sensorhub_types::AlertThresholds;
use serde::Deserialize;
use thiserror::Error;

use crate::device::{SimulatedConfig, DEFAULT_REPLAY_INTERVAL};
use crate::hub::TaskSpec;
use crate::reader::ReaderConfig;

pub use duration::{format_duration, parse_duration};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SENSORHUB";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or did not match the expected shape.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A duration string could not be parsed.
    #[error("Invalid duration '{input}': {reason}")]
    Duration { input: String, reason: String },

    /// Values parsed but make no sense together.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which device implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// The kernel driver's character device.
    #[default]
    Char,
    /// Pseudo-random readings.
    Simulated,
    /// A recorded JSON-lines session.
    Replay,
}

impl std::str::FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "char" | "chardev" => Ok(DeviceKind::Char),
            "simulated" | "sim" => Ok(DeviceKind::Simulated),
            "replay" => Ok(DeviceKind::Replay),
            other => Err(format!(
                "unknown device kind '{}' (expected char, simulated or replay)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub kind: DeviceKind,
    /// Device node for `char`, recording for `replay`.
    pub path: PathBuf,
    /// Restart a replay when it runs out.
    pub looping: bool,
    /// Time between replayed samples.
    #[serde(deserialize_with = "duration::deserialize")]
    pub replay_interval: Duration,
    pub simulated: SimulatedConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: DeviceKind::default(),
            path: PathBuf::from("/dev/sensorhub"),
            looping: false,
            replay_interval: DEFAULT_REPLAY_INTERVAL,
            simulated: SimulatedConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Snapshots queued for the network worker.
    pub broadcast_capacity: usize,
    /// Alert events kept for consumers.
    pub alert_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 4,
            alert_capacity: 32,
        }
    }
}

/// Overrides for one task. Unset fields keep the task's own default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub rate_hz: Option<f64>,
    pub priority: Option<TaskPriority>,
}

impl TaskConfig {
    fn resolve(&self, rate_hz: f64, priority: TaskPriority) -> TaskSpec {
        TaskSpec {
            rate_hz: self.rate_hz.unwrap_or(rate_hz),
            priority: self.priority.unwrap_or(priority),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub logger: TaskConfig,
    pub alerts: TaskConfig,
    pub broadcast: TaskConfig,
    pub heartbeat: TaskConfig,
}

impl TasksConfig {
    pub fn logger(&self) -> TaskSpec {
        self.logger.resolve(0.5, TaskPriority::LOW)
    }

    pub fn alerts(&self) -> TaskSpec {
        self.alerts.resolve(0.2, TaskPriority::NORMAL)
    }

    pub fn broadcast(&self) -> TaskSpec {
        self.broadcast.resolve(1.0, TaskPriority::NORMAL)
    }

    pub fn heartbeat(&self) -> TaskSpec {
        self.heartbeat.resolve(2.0, TaskPriority::BACKGROUND)
    }

    fn all(&self) -> [(&'static str, TaskSpec); 4] {
        [
            ("logger", self.logger()),
            ("alerts", self.alerts()),
            ("broadcast", self.broadcast()),
            ("heartbeat", self.heartbeat()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub path: PathBuf,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sensor_log.txt"),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Send snapshots over UDP. When off, the network worker discards them.
    pub enabled: bool,
    pub target: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target: "255.255.255.255:5005".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub overrun_policy: OverrunPolicy,
}

/// Everything needed to build a [`Hub`](crate::Hub).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub device: DeviceConfig,
    pub reader: ReaderConfig,
    pub channel: ChannelConfig,
    pub tasks: TasksConfig,
    pub alerts: AlertThresholds,
    pub log: LogConfig,
    pub network: NetworkConfig,
    pub scheduler: SchedulerConfig,
}

impl HubConfig {
    /// Load defaults, then `path` if given, then `SENSORHUB_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, environment())
    }

    /// Parse a TOML document on top of the defaults. Ignores the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder.add_source(env).build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let hub: HubConfig = config.try_deserialize()?;
        hub.validate()?;
        Ok(hub)
    }

    /// Reject settings the hub cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel.broadcast_capacity must be at least 1".into(),
            ));
        }
        if self.channel.alert_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel.alert_capacity must be at least 1".into(),
            ));
        }
        for (name, spec) in self.tasks.all() {
            if !spec.rate_hz.is_finite() || spec.rate_hz <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "tasks.{}.rate_hz must be a positive number, got {}",
                    name, spec.rate_hz
                )));
            }
            if 1.0 / spec.rate_hz > MAX_PERIOD.as_secs_f64() {
                return Err(ConfigError::Invalid(format!(
                    "tasks.{}.rate_hz is too low, the period may not exceed {}",
                    name,
                    format_duration(MAX_PERIOD)
                )));
            }
        }
        if !self.alerts.temperature_c.is_finite() || !self.alerts.humidity_pct.is_finite() {
            return Err(ConfigError::Invalid("alert thresholds must be finite".into()));
        }
        if self.device.kind == DeviceKind::Replay && self.device.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("device.path is required for replay".into()));
        }
        let simulated = &self.device.simulated;
        if !simulated.base_temperature.is_finite() || !simulated.base_humidity.is_finite() {
            return Err(ConfigError::Invalid("simulated base values must be finite".into()));
        }
        if simulated.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "device.simulated.interval must be greater than zero".into(),
            ));
        }
        if self.device.replay_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "device.replay_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.device.kind, DeviceKind::Char);
        assert_eq!(config.device.path, PathBuf::from("/dev/sensorhub"));
        assert_eq!(config.reader.idle_backoff, Duration::from_millis(50));
        assert_eq!(config.reader.error_backoff, Duration::from_secs(1));
        assert_eq!(config.tasks.logger().rate_hz, 0.5);
        assert_eq!(config.tasks.alerts().rate_hz, 0.2);
        assert_eq!(config.tasks.broadcast().priority, TaskPriority::NORMAL);
        assert_eq!(config.tasks.heartbeat().priority, TaskPriority::BACKGROUND);
        assert_eq!(config.alerts.temperature_c, 30.0);
        assert_eq!(config.scheduler.overrun_policy, OverrunPolicy::SkipMissed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(HubConfig::from_toml("").unwrap(), HubConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let config = HubConfig::from_toml(
            r#"
            [device]
            kind = "simulated"

            [device.simulated]
            interval = "250ms"
            seed = 3

            [reader]
            idle_backoff = "10ms"

            [tasks.logger]
            rate_hz = 2.0

            [alerts]
            humidity_pct = 70.0

            [log]
            format = "cbor"

            [scheduler]
            overrun_policy = "free_run"
            "#,
        )
        .unwrap();

        assert_eq!(config.device.kind, DeviceKind::Simulated);
        assert_eq!(config.device.simulated.interval, Duration::from_millis(250));
        assert_eq!(config.device.simulated.seed, Some(3));
        assert_eq!(config.reader.idle_backoff, Duration::from_millis(10));
        // Untouched sibling keeps its default
        assert_eq!(config.reader.error_backoff, Duration::from_secs(1));

        let logger = config.tasks.logger();
        assert_eq!(logger.rate_hz, 2.0);
        assert_eq!(logger.priority, TaskPriority::LOW);

        assert_eq!(config.alerts.humidity_pct, 70.0);
        assert_eq!(config.alerts.temperature_c, 30.0);
        assert_eq!(config.log.format, LogFormat::Cbor);
        assert_eq!(config.scheduler.overrun_policy, OverrunPolicy::FreeRun);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = HubConfig::from_toml("[channel]\nalert_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let err = HubConfig::from_toml("[tasks.heartbeat]\nrate_hz = 0.0").unwrap_err();
        assert!(err.to_string().contains("tasks.heartbeat.rate_hz"));

        let err = HubConfig::from_toml("[tasks.logger]\nrate_hz = 1e-19").unwrap_err();
        assert!(err.to_string().contains("too low"));
    }

    #[test]
    fn test_rejects_zero_device_intervals() {
        let err = HubConfig::from_toml("[device.simulated]\ninterval = \"0s\"").unwrap_err();
        assert!(err.to_string().contains("device.simulated.interval"));

        let err = HubConfig::from_toml("[device]\nreplay_interval = \"0ms\"").unwrap_err();
        assert!(err.to_string().contains("device.replay_interval"));

        let config = HubConfig::from_toml("[device]\nreplay_interval = \"100ms\"").unwrap();
        assert_eq!(config.device.replay_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_rejects_bad_duration() {
        assert!(HubConfig::from_toml("[reader]\nidle_backoff = \"soon\"").is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(&path, "[tasks.logger]\nrate_hz = 2.0\n[network]\nenabled = false\n").unwrap();

        let vars = config::Map::from([
            ("SENSORHUB_TASKS__LOGGER__RATE_HZ".to_string(), "4".to_string()),
            ("SENSORHUB_NETWORK__ENABLED".to_string(), "true".to_string()),
            ("SENSORHUB_READER__ERROR_BACKOFF".to_string(), "250ms".to_string()),
        ]);
        let env = environment().source(Some(vars));

        let config = HubConfig::load_with_env(Some(&path), env).unwrap();
        assert_eq!(config.tasks.logger().rate_hz, 4.0);
        assert!(config.network.enabled);
        assert_eq!(config.reader.error_backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = HubConfig::load_with_env(
            Some(Path::new("/nonexistent/hub.toml")),
            environment().source(Some(config::Map::new())),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_device_kind_from_str() {
        assert_eq!("sim".parse::<DeviceKind>(), Ok(DeviceKind::Simulated));
        assert_eq!("Replay".parse::<DeviceKind>(), Ok(DeviceKind::Replay));
        assert!("usb".parse::<DeviceKind>().is_err());
    }
}
