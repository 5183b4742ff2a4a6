use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use inverter::InverterModel;
use modbus_client::ClientConfig;
use poller_actor::ActorConfig;

const DEFAULT_MODEL: &str = "SPH3000";
const DEFAULT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_RESPAWN_DELAY_MS: u64 = 5_000;
const DEFAULT_MQTT_HOST: &str = "localhost";
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTT_CLIENT_ID: &str = "SOLARPI";
const DEFAULT_BASE_TOPIC: &str = "solarpi";
const DEFAULT_DISCOVERY_TOPIC: &str = "homeassistant";
const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_topic: String,
    pub discovery_topic: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MQTT_HOST.to_string(),
            port: DEFAULT_MQTT_PORT,
            client_id: DEFAULT_MQTT_CLIENT_ID.to_string(),
            username: None,
            password: None,
            base_topic: DEFAULT_BASE_TOPIC.to_string(),
            discovery_topic: DEFAULT_DISCOVERY_TOPIC.to_string(),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub model: String,
    pub modbus: ClientConfig,
    pub poller: ActorConfig,
    pub mqtt: MqttConfig,
    pub metrics_listen: Option<String>,
    pub channel_capacity: usize,
    pub respawn_delay_ms: u64,
}

impl BridgeConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path.as_deref())? {
            apply_file_config(&mut config, file_config)?;
        }

        apply_env_overrides(&mut config);
        Ok(config)
    }

    pub fn inverter_model(&self) -> Result<InverterModel> {
        self.model
            .parse::<InverterModel>()
            .map_err(|err| anyhow::anyhow!("inverter.model: {err}"))
    }

    pub fn validate(&self) -> Result<()> {
        self.inverter_model()?;
        if self.modbus.device.trim().is_empty() {
            anyhow::bail!("modbus.device must be non-empty");
        }
        if self.modbus.baud_rate == 0 {
            anyhow::bail!("modbus.baud_rate must be >= 1");
        }
        if self.modbus.unit_id == 0 || self.modbus.unit_id > 247 {
            anyhow::bail!("modbus.unit_id must be between 1 and 247");
        }
        if self.modbus.timeout_ms == 0 {
            anyhow::bail!("modbus.timeout_ms must be >= 1");
        }
        if self.poller.poll_interval.as_millis() == 0 {
            anyhow::bail!("poller.poll_interval_ms must be >= 1");
        }
        if self.mqtt.host.trim().is_empty() {
            anyhow::bail!("mqtt.host must be non-empty");
        }
        if self.mqtt.port == 0 {
            anyhow::bail!("mqtt.port must be between 1 and 65535");
        }
        if self.mqtt.client_id.trim().is_empty() {
            anyhow::bail!("mqtt.client_id must be non-empty");
        }
        validate_topic("mqtt.base_topic", &self.mqtt.base_topic)?;
        validate_topic("mqtt.discovery_topic", &self.mqtt.discovery_topic)?;
        if self.mqtt.keep_alive_secs < 5 {
            anyhow::bail!("mqtt.keep_alive_secs must be >= 5");
        }
        if let Some(ref listen) = self.metrics_listen {
            listen
                .parse::<SocketAddr>()
                .with_context(|| format!("metrics.listen must be host:port, got {listen}"))?;
        }
        if self.channel_capacity == 0 {
            anyhow::bail!("channel_capacity must be >= 1");
        }
        if self.respawn_delay_ms == 0 {
            anyhow::bail!("respawn_delay_ms must be >= 1");
        }

        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            modbus: ClientConfig::default(),
            poller: ActorConfig::default(),
            mqtt: MqttConfig::default(),
            metrics_listen: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            respawn_delay_ms: DEFAULT_RESPAWN_DELAY_MS,
        }
    }
}

fn apply_env_overrides(config: &mut BridgeConfig) {
    if let Ok(value) = env::var("SOLARPI_MODEL") {
        config.model = value;
    }

    if let Ok(value) = env::var("SOLARPI_DEVICE") {
        config.modbus.device = value;
    }

    if let Some(baud_rate) = parse_env("SOLARPI_BAUD_RATE") {
        config.modbus.baud_rate = baud_rate;
    }

    if let Some(unit_id) = parse_env("SOLARPI_UNIT_ID") {
        config.modbus.unit_id = unit_id;
    }

    if let Some(timeout_ms) = parse_env("SOLARPI_MODBUS_TIMEOUT_MS") {
        config.modbus.timeout_ms = timeout_ms;
    }

    if let Some(interval_ms) = parse_env("SOLARPI_POLL_INTERVAL_MS") {
        config.poller.poll_interval = Duration::from_millis(interval_ms);
    }

    if let Some(jitter_ms) = parse_env("SOLARPI_JITTER_MS") {
        config.poller.jitter_ms = jitter_ms;
    }

    if let Ok(value) = env::var("SOLARPI_MQTT_HOST") {
        config.mqtt.host = value;
    }

    if let Some(port) = parse_env("SOLARPI_MQTT_PORT") {
        config.mqtt.port = port;
    }

    config.mqtt.username = env::var("SOLARPI_MQTT_USERNAME")
        .ok()
        .or(config.mqtt.username.take());
    config.mqtt.password = env::var("SOLARPI_MQTT_PASSWORD")
        .ok()
        .or(config.mqtt.password.take());

    if let Ok(value) = env::var("SOLARPI_BASE_TOPIC") {
        config.mqtt.base_topic = value;
    }

    if let Ok(value) = env::var("SOLARPI_DISCOVERY_TOPIC") {
        config.mqtt.discovery_topic = value;
    }

    config.metrics_listen = env::var("SOLARPI_METRICS_LISTEN")
        .ok()
        .or(config.metrics_listen.take());
    config.channel_capacity =
        parse_env("SOLARPI_CHANNEL_CAPACITY").unwrap_or(config.channel_capacity);
    config.respawn_delay_ms =
        parse_env("SOLARPI_RESPAWN_DELAY_MS").unwrap_or(config.respawn_delay_ms);
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    inverter: Option<FileInverterConfig>,
    modbus: Option<FileModbusConfig>,
    poller: Option<FilePollerConfig>,
    mqtt: Option<FileMqttConfig>,
    metrics: Option<FileMetricsConfig>,
    channel_capacity: Option<usize>,
    respawn_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileInverterConfig {
    model: Option<String>,
    /// Poll interval in seconds, as older deployments spell it.
    interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileModbusConfig {
    device: Option<String>,
    baud_rate: Option<u32>,
    unit_id: Option<u8>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FilePollerConfig {
    poll_interval_ms: Option<u64>,
    jitter_ms: Option<u64>,
}

// camelCase aliases accept the `options.json` layout of older deployments.
#[derive(Debug, Deserialize)]
struct FileMqttConfig {
    #[serde(alias = "brokerUrl")]
    broker_url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    #[serde(alias = "clientId")]
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    #[serde(alias = "baseTopic")]
    base_topic: Option<String>,
    #[serde(alias = "discoveryTopic")]
    discovery_topic: Option<String>,
    #[serde(alias = "keepAliveSecs")]
    keep_alive_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileMetricsConfig {
    listen: Option<String>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("SOLARPI_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content =
        fs::read_to_string(&path).with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut BridgeConfig, file: FileConfig) -> Result<()> {
    if let Some(inverter) = file.inverter {
        if let Some(model) = inverter.model {
            config.model = model;
        }
        if let Some(secs) = inverter.interval {
            config.poller.poll_interval = Duration::from_secs(secs);
        }
    }

    if let Some(modbus) = file.modbus {
        if let Some(device) = modbus.device {
            config.modbus.device = device;
        }
        if let Some(baud_rate) = modbus.baud_rate {
            config.modbus.baud_rate = baud_rate;
        }
        if let Some(unit_id) = modbus.unit_id {
            config.modbus.unit_id = unit_id;
        }
        if let Some(timeout_ms) = modbus.timeout_ms {
            config.modbus.timeout_ms = timeout_ms;
        }
    }

    if let Some(poller) = file.poller {
        if let Some(interval_ms) = poller.poll_interval_ms {
            config.poller.poll_interval = Duration::from_millis(interval_ms);
        }
        if let Some(jitter_ms) = poller.jitter_ms {
            config.poller.jitter_ms = jitter_ms;
        }
    }

    if let Some(mqtt) = file.mqtt {
        if let Some(ref url) = mqtt.broker_url {
            let (host, port) = parse_broker_url(url)?;
            config.mqtt.host = host;
            if let Some(port) = port {
                config.mqtt.port = port;
            }
        }
        if let Some(host) = mqtt.host {
            config.mqtt.host = host;
        }
        if let Some(port) = mqtt.port {
            config.mqtt.port = port;
        }
        if let Some(client_id) = mqtt.client_id {
            config.mqtt.client_id = client_id;
        }
        if mqtt.username.is_some() {
            config.mqtt.username = mqtt.username;
        }
        if mqtt.password.is_some() {
            config.mqtt.password = mqtt.password;
        }
        if let Some(base_topic) = mqtt.base_topic {
            config.mqtt.base_topic = base_topic;
        }
        if let Some(discovery_topic) = mqtt.discovery_topic {
            config.mqtt.discovery_topic = discovery_topic;
        }
        if let Some(keep_alive) = mqtt.keep_alive_secs {
            config.mqtt.keep_alive_secs = keep_alive;
        }
    }

    if let Some(metrics) = file.metrics {
        config.metrics_listen = metrics.listen;
    }

    if let Some(capacity) = file.channel_capacity {
        config.channel_capacity = capacity;
    }
    if let Some(delay) = file.respawn_delay_ms {
        config.respawn_delay_ms = delay;
    }
    Ok(())
}

/// Splits `mqtt://user@host:port/path` into host and optional port.
fn parse_broker_url(url: &str) -> Result<(String, Option<u16>)> {
    let rest = match url.split_once("://") {
        Some(("mqtt" | "tcp", rest)) => rest,
        Some((scheme, _)) => anyhow::bail!("mqtt.brokerUrl: unsupported scheme {scheme}"),
        None => url,
    };
    let authority = rest.split('/').next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or_default();

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("mqtt.brokerUrl: invalid port in {url}"))?;
            (host, Some(port))
        }
        None => (authority, None),
    };
    if host.is_empty() {
        anyhow::bail!("mqtt.brokerUrl: missing host in {url}");
    }
    Ok((host.to_string(), port))
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn validate_topic(name: &str, topic: &str) -> Result<()> {
    if topic.trim().is_empty() {
        anyhow::bail!("{name} must be non-empty");
    }
    if topic.contains(['#', '+']) {
        anyhow::bail!("{name} must not contain MQTT wildcards");
    }
    if topic.starts_with('/') || topic.ends_with('/') {
        anyhow::bail!("{name} must not start or end with '/'");
    }
    Ok(())
}
