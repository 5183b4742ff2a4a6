#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{info, warn};

use inverter::{Inverter, InverterError};
use types::SensorSnapshot;

#[derive(Debug, Clone)]
pub struct ActorConfig {
    pub poll_interval: Duration,
    pub jitter_ms: u64,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            jitter_ms: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("sensor channel closed")]
    ChannelClosed,
}

/// One successful read of the inverter's sensor blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub snapshot: SensorSnapshot,
    pub collected_at_ms: u64,
}

/// Periodically reads sensor data from one inverter and forwards it.
pub struct PollerActor {
    inverter: Arc<dyn Inverter>,
    sender: mpsc::Sender<SensorSample>,
    shutdown: watch::Receiver<bool>,
    config: ActorConfig,
}

impl PollerActor {
    pub fn new(
        inverter: Arc<dyn Inverter>,
        sender: mpsc::Sender<SensorSample>,
        shutdown: watch::Receiver<bool>,
        config: ActorConfig,
    ) -> Self {
        Self {
            inverter,
            sender,
            shutdown,
            config,
        }
    }

    /// Runs until shutdown is signalled or the receiving side goes away.
    /// Device errors are logged and counted; they never end the loop.
    pub async fn run(mut self) -> Result<(), PollerError> {
        let model = self.inverter.model();
        let mut iteration = 0u64;
        let mut failure_count = 0u64;

        loop {
            if *self.shutdown.borrow() {
                info!(%model, "poller shutdown requested");
                break;
            }

            let cycle_start = Instant::now();
            metrics::counter!("solarpi_poll_cycles_total").increment(1);

            match self.inverter.get_sensor_data().await {
                Ok(snapshot) => {
                    let sample = SensorSample {
                        snapshot,
                        collected_at_ms: unix_ms(),
                    };
                    if self.sender.send(sample).await.is_err() {
                        warn!(%model, "sensor channel closed");
                        return Err(PollerError::ChannelClosed);
                    }
                }
                Err(err) => {
                    failure_count = failure_count.saturating_add(1);
                    metrics::counter!("solarpi_poll_failures_total", "kind" => failure_kind(&err))
                        .increment(1);
                    warn!(%model, error = %err, failure_count, "sensor read failed");
                }
            }

            iteration = iteration.wrapping_add(1);
            let elapsed = cycle_start.elapsed();
            let lag = elapsed.saturating_sub(self.config.poll_interval);
            let delay = jittered_delay(self.config.poll_interval, self.config.jitter_ms, iteration);
            metrics::histogram!("solarpi_poll_duration_seconds").record(elapsed.as_secs_f64());
            info!(
                %model,
                elapsed_ms = elapsed.as_millis(),
                lag_ms = lag.as_millis(),
                failure_count,
                delay_ms = delay.as_millis(),
                "poll cycle complete"
            );

            tokio::select! {
                _ = sleep(delay) => {},
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!(%model, "poller shutdown requested");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

fn failure_kind(err: &InverterError) -> &'static str {
    match err {
        InverterError::Transport(_) => "transport",
        InverterError::Codec(_) => "codec",
        _ => "other",
    }
}

fn jittered_delay(base: Duration, jitter_ms: u64, iteration: u64) -> Duration {
    if jitter_ms == 0 {
        return base;
    }

    let jitter_window = jitter_ms.max(1);
    let seed = unix_ms().wrapping_add(iteration.wrapping_mul(1_664_525));
    let offset = seed % jitter_window;
    base + Duration::from_millis(offset)
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
