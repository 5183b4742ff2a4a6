use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rumqttc::{
    AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Outgoing, Publish, QoS,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use discovery::COMMAND_SUB_TOPIC;
use inverter::{CommandAck, CommandReply, ControlData, Inverter};
use poller_actor::SensorSample;
use types::SensorSnapshot;

use crate::config::MqttConfig;
use crate::home_assistant::{self, Entities, STATUS_SUB_TOPIC};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

impl Message {
    pub fn for_sensors(base_topic: &str, snapshot: &SensorSnapshot) -> serde_json::Result<Self> {
        Ok(Self {
            topic: format!("{base_topic}/{}/state", discovery::SENSOR_SUB_TOPIC),
            retain: true,
            payload: serde_json::to_string(snapshot)?,
        })
    }

    pub fn for_controls(
        base_topic: &str,
        controls: &[ControlData],
    ) -> serde_json::Result<Vec<Self>> {
        controls
            .iter()
            .map(|control| {
                Ok(Self {
                    topic: format!("{base_topic}/{}/state", control.sub_topic()),
                    retain: true,
                    payload: serde_json::to_string(&control.values)?,
                })
            })
            .collect()
    }

    pub fn for_ack(base_topic: &str, ack: &CommandAck) -> serde_json::Result<Self> {
        Ok(Self {
            topic: format!("{base_topic}/{STATUS_SUB_TOPIC}/state"),
            retain: false,
            payload: serde_json::to_string(ack)?,
        })
    }

    /// Everything a command reply asks to be published, acknowledgement last.
    pub fn for_reply(base_topic: &str, reply: &CommandReply) -> serde_json::Result<Vec<Self>> {
        let mut messages = Vec::new();
        if let Some(ref snapshot) = reply.sensors {
            messages.push(Self::for_sensors(base_topic, snapshot)?);
        }
        if let Some(ref controls) = reply.controls {
            messages.extend(Self::for_controls(base_topic, controls)?);
        }
        messages.push(Self::for_ack(base_topic, &reply.ack)?);
        Ok(messages)
    }
}

/// Where an inbound publish should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Command,
    Control(String),
}

/// Maps `{base}/command/set` and `{base}/{scope}/set` to a route; anything
/// else under the base topic is ignored.
pub fn route(base_topic: &str, topic: &str) -> Option<Route> {
    let rest = topic.strip_prefix(base_topic)?.strip_prefix('/')?;
    let sub_topic = rest.strip_suffix("/set")?;
    if sub_topic.is_empty() || sub_topic.contains('/') {
        return None;
    }
    if sub_topic == COMMAND_SUB_TOPIC {
        Some(Route::Command)
    } else {
        Some(Route::Control(sub_topic.to_string()))
    }
}

#[derive(Clone)]
pub struct Mqtt {
    config: MqttConfig,
    inverter: Arc<dyn Inverter>,
}

impl Mqtt {
    pub fn new(config: MqttConfig, inverter: Arc<dyn Inverter>) -> Self {
        Self { config, inverter }
    }

    fn availability_topic(&self) -> String {
        home_assistant::Config::new(&self.config, self.inverter.model()).availability_topic()
    }

    fn options(&self) -> MqttOptions {
        let c = &self.config;
        let mut options = MqttOptions::new(&c.client_id, &c.host, c.port);
        options.set_last_will(LastWill::new(
            self.availability_topic(),
            "offline",
            QoS::AtLeastOnce,
            true,
        ));
        options.set_keep_alive(Duration::from_secs(c.keep_alive_secs));
        if let Some(ref username) = c.username {
            options.set_credentials(username, c.password.clone().unwrap_or_default());
        }
        options
    }

    /// Runs the event loop, forwards sensor samples and answers inbound
    /// messages until shutdown.
    pub async fn start(
        &self,
        samples: mpsc::Receiver<SensorSample>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!(host = %self.config.host, port = self.config.port, "initializing mqtt");
        let (client, eventloop) = AsyncClient::new(self.options(), 64);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::try_join!(
            self.receiver(client.clone(), eventloop, inbound_tx, shutdown.clone()),
            async {
                self.handle_inbound(&client, inbound_rx).await;
                Ok::<_, anyhow::Error>(())
            },
            self.sender(client.clone(), samples, shutdown),
        )?;

        info!("mqtt stopped");
        Ok(())
    }

    /// Marks the bridge offline and flushes the disconnect. The request
    /// queue is only drained by `eventloop`, so nothing here may block on it.
    async fn go_offline(&self, client: &AsyncClient, eventloop: &mut EventLoop) {
        if let Err(err) =
            client.try_publish(self.availability_topic(), QoS::AtLeastOnce, true, "offline")
        {
            warn!(error = %err, "offline publish failed");
        }
        if let Err(err) = client.try_disconnect() {
            warn!(error = %err, "mqtt disconnect failed");
        }
        let flush = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(Duration::from_secs(2), flush).await.is_err() {
            warn!("timed out flushing mqtt disconnect");
        }
    }

    /// Announces the bridge after every (re)connect: availability, discovery
    /// configs, subscriptions, then the current control state.
    async fn setup(&self, client: AsyncClient) -> Result<()> {
        let base = &self.config.base_topic;
        let ha = home_assistant::Config::new(&self.config, self.inverter.model());

        client
            .publish(ha.availability_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        let sensors = self.inverter.sensor_entities();
        let commands = self.inverter.command_entities();
        let controls = self.inverter.control_entities();
        let discovery = ha.all(&Entities {
            sensors: &sensors,
            commands: &commands,
            controls: &controls,
        })?;
        let announced = discovery.len();
        publish_all(&client, discovery).await;

        client
            .subscribe(format!("{base}/{}/set", commands.sub_topic), QoS::AtLeastOnce)
            .await?;
        for group in &controls {
            client
                .subscribe(format!("{base}/{}/set", group.sub_topic), QoS::AtLeastOnce)
                .await?;
        }

        publish_all(
            &client,
            Message::for_controls(base, &self.inverter.control_values())?,
        )
        .await;

        info!(entities = announced, "home assistant discovery published");
        Ok(())
    }

    // mqtt -> inverter
    async fn receiver(
        &self,
        client: AsyncClient,
        mut eventloop: EventLoop,
        inbound: mpsc::UnboundedSender<Publish>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("connected to mqtt broker");
                        let this = self.clone();
                        let client = client.clone();
                        tokio::spawn(async move {
                            if let Err(err) = this.setup(client).await {
                                warn!(error = %err, "mqtt setup failed");
                            }
                        });
                    }
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        if inbound.send(publish).is_err() {
                            warn!("inbound handler gone, dropping message");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, delay_s = RECONNECT_DELAY.as_secs(), "mqtt connection error");
                        tokio::select! {
                            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                },
                _ = shutdown.changed() => {}
            }

            if *shutdown.borrow() {
                info!("mqtt receiver shutdown requested");
                break;
            }
        }

        self.go_offline(&client, &mut eventloop).await;
        Ok(())
    }

    /// Handles inbound messages one at a time, in arrival order. Returns once
    /// the sending side is dropped.
    pub async fn handle_inbound(
        &self,
        client: &AsyncClient,
        mut inbound: mpsc::UnboundedReceiver<Publish>,
    ) {
        while let Some(publish) = inbound.recv().await {
            self.handle_message(client, publish).await;
        }
        debug!("inbound handler stopped");
    }

    async fn handle_message(&self, client: &AsyncClient, publish: Publish) {
        let base = &self.config.base_topic;
        let payload = match String::from_utf8(publish.payload.to_vec()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(topic = %publish.topic, error = %err, "non-utf8 payload ignored");
                return;
            }
        };
        debug!(topic = %publish.topic, payload = %payload, "mqtt message received");

        let messages = match route(base, &publish.topic) {
            Some(Route::Command) => {
                let reply = self.inverter.send_command(&payload).await;
                Message::for_reply(base, &reply)
            }
            Some(Route::Control(sub_topic)) => {
                match self.inverter.update_control(&sub_topic, &payload) {
                    Ok(controls) => Message::for_controls(base, &controls),
                    Err(err) => {
                        warn!(sub_topic = %sub_topic, error = %err, "control update rejected");
                        return;
                    }
                }
            }
            None => {
                debug!(topic = %publish.topic, "ignoring message on unrouted topic");
                return;
            }
        };

        match messages {
            Ok(messages) => publish_all(client, messages).await,
            Err(err) => warn!(error = %err, "reply serialization failed"),
        }
    }

    // poller -> mqtt
    async fn sender(
        &self,
        client: AsyncClient,
        mut samples: mpsc::Receiver<SensorSample>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                maybe_sample = samples.recv() => {
                    let Some(sample) = maybe_sample else {
                        break;
                    };
                    match Message::for_sensors(&self.config.base_topic, &sample.snapshot) {
                        Ok(message) => {
                            debug!(collected_at_ms = sample.collected_at_ms, "publishing sensor data");
                            publish_all(&client, vec![message]).await;
                        }
                        Err(err) => warn!(error = %err, "sensor serialization failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("mqtt sender shutdown requested");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn publish_all(client: &AsyncClient, messages: Vec<Message>) {
    for message in messages {
        if let Err(err) = client
            .publish(&message.topic, QoS::AtLeastOnce, message.retain, message.payload)
            .await
        {
            warn!(topic = %message.topic, error = %err, "mqtt publish failed");
        }
    }
}
