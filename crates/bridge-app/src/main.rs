use std::env;
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use bridge_app::{BridgeConfig, Mqtt};
use inverter::{Inverter, InverterModel};
use modbus_client::ClientConfig;
use poller_actor::{ActorConfig, PollerActor, PollerError, SensorSample};

const MQTT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = parse_config_arg();
    let config = BridgeConfig::load_with_path(config_path).context("load config failed")?;
    config.validate().context("config validation failed")?;
    let model = config.inverter_model()?;
    info!(%model, device = %config.modbus.device, "starting solarpi bridge");

    if let Some(ref listen) = config.metrics_listen {
        install_metrics(listen)?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let respawn_delay = Duration::from_millis(config.respawn_delay_ms);

    let mut shutdown_signal = pin!(tokio::signal::ctrl_c());
    let inverter = tokio::select! {
        inverter = connect_inverter(model, &config.modbus, respawn_delay) => inverter,
        _ = &mut shutdown_signal => {
            info!("shutdown signal received before the inverter was reachable");
            return Ok(());
        }
    };

    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let mqtt = Mqtt::new(config.mqtt.clone(), inverter.clone());
    let mqtt_shutdown = shutdown_rx.clone();
    let mut mqtt_handle = tokio::spawn(async move { mqtt.start(rx, mqtt_shutdown).await });

    let spec = PollerSpec {
        inverter,
        sender: tx,
        shutdown: shutdown_rx.clone(),
        config: config.poller.clone(),
    };
    let mut join_set = JoinSet::new();
    spawn_poller(spec.clone(), &mut join_set, Duration::ZERO);

    notify_ready();
    let watchdog_handle = start_watchdog(shutdown_rx.clone());

    let mut mqtt_finished = false;
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("shutdown signal received");
                break;
            }
            result = &mut mqtt_handle => {
                mqtt_finished = true;
                match result {
                    Ok(Ok(())) => warn!("mqtt bridge exited"),
                    Ok(Err(err)) => warn!(error = %err, "mqtt bridge failed"),
                    Err(err) => warn!(error = %err, "mqtt task failed"),
                }
                break;
            }
            maybe_result = join_set.join_next() => {
                match maybe_result {
                    Some(Ok(outcome)) => {
                        if let Err(err) = outcome {
                            warn!(error = %err, "poller exited with error");
                        } else {
                            info!("poller exited cleanly");
                        }
                        spawn_poller(spec.clone(), &mut join_set, respawn_delay);
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "poller task failed");
                        spawn_poller(spec.clone(), &mut join_set, respawn_delay);
                    }
                    None => break,
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);

    join_set.abort_all();
    while let Some(result) = join_set.join_next().await {
        if let Err(err) = result {
            if !err.is_cancelled() {
                warn!(error = %err, "poller task join failed");
            }
        }
    }

    if !mqtt_finished {
        match timeout(MQTT_SHUTDOWN_GRACE, &mut mqtt_handle).await {
            Ok(Ok(Err(err))) => warn!(error = %err, "mqtt bridge failed during shutdown"),
            Ok(_) => {}
            Err(_) => {
                warn!("mqtt bridge did not stop in time");
                mqtt_handle.abort();
            }
        }
    }
    if let Some(handle) = watchdog_handle {
        let _ = handle.await;
    }
    Ok(())
}

/// Retries until the serial port opens; a missing adapter is not fatal.
async fn connect_inverter(
    model: InverterModel,
    config: &ClientConfig,
    delay: Duration,
) -> Arc<dyn Inverter> {
    loop {
        match model.connect(config).await {
            Ok(inverter) => {
                info!(%model, device = %config.device, "inverter link ready");
                return inverter;
            }
            Err(err) => {
                warn!(
                    %model,
                    device = %config.device,
                    error = %err,
                    retry_ms = delay.as_millis(),
                    "inverter connect failed"
                );
                sleep(delay).await;
            }
        }
    }
}

fn install_metrics(listen: &str) -> Result<()> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid metrics listen address {listen}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus exporter install failed")?;
    info!(%addr, "prometheus exporter listening");
    Ok(())
}

#[derive(Clone)]
struct PollerSpec {
    inverter: Arc<dyn Inverter>,
    sender: mpsc::Sender<SensorSample>,
    shutdown: watch::Receiver<bool>,
    config: ActorConfig,
}

fn spawn_poller(
    spec: PollerSpec,
    join_set: &mut JoinSet<Result<(), PollerError>>,
    delay: Duration,
) {
    join_set.spawn(async move {
        if delay > Duration::ZERO {
            sleep(delay).await;
        }
        PollerActor::new(spec.inverter, spec.sender, spec.shutdown, spec.config)
            .run()
            .await
    });
}

fn parse_config_arg() -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn notify_ready() {
    if let Err(err) = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]) {
        warn!(error = %err, "systemd ready notify failed");
    }
}

#[cfg(not(target_os = "linux"))]
fn notify_ready() {}

#[cfg(target_os = "linux")]
fn start_watchdog(
    mut shutdown: watch::Receiver<bool>,
) -> Option<tokio::task::JoinHandle<()>> {
    let interval = watchdog_interval()?;
    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    if let Err(err) = sd_notify::notify(false, &[sd_notify::NotifyState::Watchdog]) {
                        warn!(error = %err, "systemd watchdog notify failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }))
}

#[cfg(not(target_os = "linux"))]
fn start_watchdog(_shutdown: watch::Receiver<bool>) -> Option<tokio::task::JoinHandle<()>> {
    None
}

#[cfg(target_os = "linux")]
fn watchdog_interval() -> Option<Duration> {
    let watchdog_usec = env::var("WATCHDOG_USEC").ok()?.parse::<u64>().ok()?;
    if let Some(pid) = env::var("WATCHDOG_PID")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
    {
        if pid != std::process::id() {
            return None;
        }
    }

    let interval = watchdog_usec.saturating_div(2).max(100_000);
    Some(Duration::from_micros(interval))
}
