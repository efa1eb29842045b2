use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sensorhub::config::{format_duration, parse_duration, DeviceKind};
use sensorhub::{device, Hub, HubConfig};
use sensorhub_sinks::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "sensorhub")]
#[command(about = "Soft real-time sensor hub: reads a sensor device, logs, alerts and broadcasts")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sensor source: char, simulated or replay
    #[arg(short, long)]
    device: Option<DeviceKind>,

    /// Device node (char) or recording (replay)
    #[arg(long)]
    device_path: Option<PathBuf>,

    /// Restart a replay when it reaches the end
    #[arg(long = "loop")]
    looping: bool,

    /// Time between simulated or replayed samples (e.g., "2s", "500ms")
    #[arg(long, value_parser = parse_duration)]
    sample_interval: Option<Duration>,

    /// Seed for simulated readings
    #[arg(long)]
    seed: Option<u64>,

    /// Log file path
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Log record format: text, json_lines or cbor
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Broadcast snapshots over UDP to this address (host:port)
    #[arg(short, long)]
    broadcast: Option<String>,

    /// Temperature alert threshold in °C
    #[arg(long)]
    temp_threshold: Option<f32>,

    /// Humidity alert threshold in %
    #[arg(long)]
    humidity_threshold: Option<f32>,

    /// Stop after this long instead of waiting for a signal (e.g., "30s")
    #[arg(long, value_parser = parse_duration)]
    duration: Option<Duration>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Command-line flags win over every other configuration source.
    fn apply(&self, config: &mut HubConfig) {
        if let Some(kind) = self.device {
            config.device.kind = kind;
        }
        if let Some(path) = &self.device_path {
            config.device.path = path.clone();
        }
        if self.looping {
            config.device.looping = true;
        }
        if let Some(interval) = self.sample_interval {
            config.device.simulated.interval = interval;
            config.device.replay_interval = interval;
        }
        if let Some(seed) = self.seed {
            config.device.simulated.seed = Some(seed);
        }
        if let Some(path) = &self.log_file {
            config.log.path = path.clone();
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }
        if let Some(target) = &self.broadcast {
            config.network.enabled = true;
            config.network.target = target.clone();
        }
        if let Some(threshold) = self.temp_threshold {
            config.alerts.temperature_c = threshold;
        }
        if let Some(threshold) = self.humidity_threshold {
            config.alerts.humidity_pct = threshold;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config =
        HubConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let device = device::open(&config.device)
        .with_context(|| format!("Failed to open {:?} sensor device", config.device.kind))?;
    info!("Using {}", device.description());

    let mut hub = Hub::new(config, device).context("Failed to set up hub")?;
    hub.start().context("Failed to start hub")?;

    wait_for_shutdown(args.duration)?;

    info!("Shutting down");
    hub.stop();

    if let Some(stats) = hub.reader_stats() {
        info!(
            "Reader: {} samples, {} idle polls, {} device errors",
            stats.samples, stats.idle_polls, stats.device_errors
        );
    }
    for task in hub.task_stats() {
        info!(
            "Task '{}': {} runs, {} overruns, state {:?}",
            task.name, task.runs, task.overruns, task.state
        );
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

/// Block until Ctrl-C, SIGTERM, or `duration` elapses.
fn wait_for_shutdown(duration: Option<Duration>) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    rt.block_on(async {
        let timer = async {
            match duration {
                Some(d) => {
                    tokio::time::sleep(d).await;
                    info!("Ran for {}", format_duration(d));
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Received Ctrl-C");
            }
            _ = terminate() => info!("Received SIGTERM"),
            _ = timer => {}
        }
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "sensorhub",
            "--device",
            "simulated",
            "--sample-interval",
            "250ms",
            "--seed",
            "9",
            "--broadcast",
            "127.0.0.1:5005",
            "--temp-threshold",
            "28.5",
            "--log-format",
            "json_lines",
        ]);
        let mut config = HubConfig::default();
        args.apply(&mut config);

        assert_eq!(config.device.kind, DeviceKind::Simulated);
        assert_eq!(config.device.simulated.interval, Duration::from_millis(250));
        assert_eq!(config.device.replay_interval, Duration::from_millis(250));
        assert_eq!(config.device.simulated.seed, Some(9));
        assert!(config.network.enabled);
        assert_eq!(config.network.target, "127.0.0.1:5005");
        assert_eq!(config.alerts.temperature_c, 28.5);
        assert_eq!(config.log.format, LogFormat::JsonLines);
    }

    #[test]
    fn test_no_flags_leave_config_alone() {
        let args = Args::parse_from(["sensorhub"]);
        let mut config = HubConfig::default();
        args.apply(&mut config);
        assert_eq!(config, HubConfig::default());
    }

    #[test]
    fn test_bad_duration_flag_is_rejected() {
        assert!(Args::try_parse_from(["sensorhub", "--duration", "forever"]).is_err());
    }
}
