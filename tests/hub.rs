use std::fs;
use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};

use sensorhub::config::{DeviceKind, TaskConfig};
use sensorhub::device::{ReplayDevice, ScriptedDevice, ScriptedRead};
use sensorhub::{Hub, HubConfig, HubError};
use sensorhub_rt::{RecvTimeoutError, TaskPriority, TaskState};
use sensorhub_sinks::{LogFormat, NullSink};
use sensorhub_types::{Alert, SensorSnapshot};
use tempfile::tempdir;

fn fast_task(rate_hz: f64) -> TaskConfig {
    TaskConfig {
        rate_hz: Some(rate_hz),
        priority: Some(TaskPriority::BACKGROUND),
    }
}

/// Config with every task running fast enough for a test.
fn fast_config() -> HubConfig {
    let mut config = HubConfig::default();
    config.tasks.logger = fast_task(50.0);
    config.tasks.alerts = fast_task(50.0);
    config.tasks.broadcast = fast_task(50.0);
    config.tasks.heartbeat = fast_task(20.0);
    config.reader.idle_backoff = Duration::from_millis(5);
    config.reader.error_backoff = Duration::from_millis(5);
    config
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(Duration::from_millis(5));
    }
}

fn reading(temperature: f32, humidity: f32, ts: u64) -> SensorSnapshot {
    SensorSnapshot::new(temperature, humidity, false, false, ts)
}

#[test]
fn test_readings_reach_log_file() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("sensor_log.jsonl");

    let mut config = fast_config();
    config.log.path = log_path.clone();
    config.log.format = LogFormat::JsonLines;

    let device = ScriptedDevice::new([reading(22.5, 41.0, 1000)]);
    let mut hub = Hub::new(config, Box::new(device)).unwrap();
    hub.start().unwrap();

    wait_for(|| {
        fs::read_to_string(&log_path)
            .map(|c| c.lines().count() >= 1)
            .unwrap_or(false)
    });
    hub.stop();

    let content = fs::read_to_string(&log_path).unwrap();
    // One reading published once is logged once
    assert_eq!(content.lines().count(), 1);
    let logged: SensorSnapshot = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(logged, reading(22.5, 41.0, 1000));
}

#[test]
fn test_implausible_readings_are_not_logged() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("sensor_log.txt");

    let mut config = fast_config();
    config.log.path = log_path.clone();

    let device = ScriptedDevice::new([reading(-50.0, 40.0, 1)]);
    let mut hub = Hub::new(config, Box::new(device)).unwrap();
    hub.start().unwrap();
    let cell = hub.cell();
    wait_for(|| cell.read().is_some());
    thread::sleep(Duration::from_millis(100));
    hub.stop();

    assert_eq!(fs::read_to_string(&log_path).unwrap(), "");
}

#[test]
fn test_alert_boundary_end_to_end() {
    let device = ScriptedDevice::new([reading(30.0, 40.0, 1)]);
    let script = device.clone();
    let mut hub = Hub::with_sinks(
        fast_config(),
        Box::new(device),
        Box::new(NullSink),
        Box::new(NullSink),
    )
    .unwrap();
    hub.start().unwrap();
    let alerts = hub.alerts();
    let cell = hub.cell();

    wait_for(|| cell.read().is_some());
    // Exactly at the threshold: nothing
    assert_eq!(
        alerts.pop_timed(Duration::from_millis(150)),
        Err(RecvTimeoutError::Timeout)
    );

    script.push(reading(30.1, 40.0, 2));
    let event = alerts.pop_timed(Duration::from_secs(5)).unwrap();
    assert_eq!(event.timestamp_ms, 2);
    assert!(matches!(event.alert, Alert::HighTemperature { .. }));

    // The same reading is not re-evaluated on later ticks
    assert_eq!(
        alerts.pop_timed(Duration::from_millis(150)),
        Err(RecvTimeoutError::Timeout)
    );
    hub.stop();
}

#[test]
fn test_broadcast_over_udp() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let dir = tempdir().unwrap();
    let mut config = fast_config();
    config.log.path = dir.path().join("log.txt");
    config.network.enabled = true;
    config.network.target = receiver.local_addr().unwrap().to_string();

    let device = ScriptedDevice::new([reading(25.0, 55.0, 77)]);
    let mut hub = Hub::new(config, Box::new(device)).unwrap();
    hub.start().unwrap();

    let mut buf = [0u8; 512];
    let (len, _) = receiver.recv_from(&mut buf).unwrap();
    hub.stop();

    let received: SensorSnapshot = serde_json::from_slice(&buf[..len]).unwrap();
    assert_eq!(received, reading(25.0, 55.0, 77));
}

#[test]
fn test_hub_survives_device_errors() {
    let device = ScriptedDevice::new([
        ScriptedRead::Fail("bus error".into()),
        ScriptedRead::NoData,
        ScriptedRead::Fail("bus error".into()),
        ScriptedRead::Sample(reading(21.0, 40.0, 5)),
    ]);
    let mut hub = Hub::with_sinks(
        fast_config(),
        Box::new(device),
        Box::new(NullSink),
        Box::new(NullSink),
    )
    .unwrap();
    hub.start().unwrap();

    let cell = hub.cell();
    wait_for(|| cell.read().is_some());
    assert!(hub.is_running());
    thread::sleep(Duration::from_millis(100));
    hub.stop();

    let stats = hub.reader_stats().unwrap();
    assert_eq!(stats.device_errors, 2);
    assert_eq!(stats.samples, 1);
    assert!(hub
        .task_stats()
        .iter()
        .all(|t| t.state == TaskState::Joined && t.runs > 0));
}

#[test]
fn test_replayed_session_is_monotonic() {
    let dir = tempdir().unwrap();
    let recording = dir.path().join("session.jsonl");
    fs::write(
        &recording,
        [
            r#"{"temperature":20.0,"humidity":40.0,"timestamp_ms":100}"#,
            r#"{"temperature":20.5,"humidity":40.0,"timestamp_ms":90}"#,
            r#"{"temperature":21.0,"humidity":40.0,"timestamp_ms":300}"#,
        ]
        .join("\n"),
    )
    .unwrap();

    let mut config = fast_config();
    config.device.kind = DeviceKind::Replay;
    config.device.path = recording;
    config.device.replay_interval = Duration::from_millis(10);
    let device = sensorhub::device::open(&config.device).unwrap();

    let mut hub = Hub::with_sinks(config, device, Box::new(NullSink), Box::new(NullSink)).unwrap();
    hub.start().unwrap();
    let cell = hub.cell();
    wait_for(|| cell.sequence() == 3);
    hub.stop();

    assert_eq!(cell.read().unwrap().timestamp_ms, 300);
    assert_eq!(hub.reader_stats().unwrap().clamped_timestamps, 1);
}

#[test]
fn test_lifecycle_rules() {
    let mut hub = Hub::with_sinks(
        fast_config(),
        Box::new(ReplayDevice::from_recording("", false)),
        Box::new(NullSink),
        Box::new(NullSink),
    )
    .unwrap();

    hub.start().unwrap();
    assert!(matches!(hub.start(), Err(HubError::AlreadyStarted)));

    let started = Instant::now();
    hub.stop();
    hub.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!hub.is_running());
    assert!(matches!(hub.start(), Err(HubError::Stopped)));
    assert!(hub.stop_signal().is_triggered());
}

#[test]
fn test_stop_before_start() {
    let mut hub = Hub::with_sinks(
        HubConfig::default(),
        Box::new(ScriptedDevice::default()),
        Box::new(NullSink),
        Box::new(NullSink),
    )
    .unwrap();
    hub.stop();
    assert!(hub.reader_stats().is_none());
    assert!(!hub.stop_signal().is_triggered());

    hub.start().unwrap();
    assert!(hub.is_running());
    hub.stop();
    assert!(matches!(hub.start(), Err(HubError::Stopped)));
}

#[test]
fn test_zero_capacity_is_rejected() {
    let mut config = HubConfig::default();
    config.channel.broadcast_capacity = 0;
    let result = Hub::with_sinks(
        config,
        Box::new(ScriptedDevice::default()),
        Box::new(NullSink),
        Box::new(NullSink),
    );
    assert!(matches!(result, Err(HubError::Channel(_))));
}
