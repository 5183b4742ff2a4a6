//! Home Assistant MQTT discovery: every entity descriptor becomes one retained
//! config message under `{discovery_topic}/{component}/{unique_id}/config`.

use serde::Serialize;
use serde_json::{json, Value};

use discovery::{Component, EntityDescriptor, EntityGroup};
use inverter::InverterModel;

use crate::config::MqttConfig;
use crate::mqtt::Message;

pub const STATUS_SUB_TOPIC: &str = "status";
pub const AVAILABILITY_SUB_TOPIC: &str = "bridge/availability";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceConfig {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

impl DeviceConfig {
    pub fn new(model: InverterModel) -> Self {
        Self {
            identifiers: vec!["solarpi".to_string()],
            name: "SOLARPI".to_string(),
            manufacturer: model.manufacturer().to_string(),
            model: format!("{model} via SOLARPI bridge"),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The entity groups announced for one inverter.
pub struct Entities<'a> {
    pub sensors: &'a EntityGroup,
    pub commands: &'a EntityGroup,
    pub controls: &'a [EntityGroup],
}

pub struct Config<'a> {
    mqtt: &'a MqttConfig,
    device: DeviceConfig,
}

impl<'a> Config<'a> {
    pub fn new(mqtt: &'a MqttConfig, model: InverterModel) -> Self {
        Self {
            mqtt,
            device: DeviceConfig::new(model),
        }
    }

    pub fn availability_topic(&self) -> String {
        format!("{}/{AVAILABILITY_SUB_TOPIC}", self.mqtt.base_topic)
    }

    fn topic(&self, sub_topic: &str, leaf: &str) -> String {
        format!("{}/{sub_topic}/{leaf}", self.mqtt.base_topic)
    }

    /// Discovery configs for every entity plus the command status sensor.
    pub fn all(&self, entities: &Entities<'_>) -> serde_json::Result<Vec<Message>> {
        let mut messages = Vec::new();

        for entity in &entities.sensors.entities {
            let state_topic = self.topic(entities.sensors.sub_topic, "state");
            messages.push(self.announce(
                entity,
                json!({
                    "state_topic": state_topic,
                    "json_attributes_topic": state_topic,
                    "force_update": true,
                }),
            )?);
        }

        for entity in &entities.commands.entities {
            messages.push(self.announce(
                entity,
                json!({
                    "state_topic": self.topic(entities.commands.sub_topic, "state"),
                    "command_topic": self.topic(entities.commands.sub_topic, "set"),
                }),
            )?);
        }

        for group in entities.controls {
            for entity in &group.entities {
                messages.push(self.announce(
                    entity,
                    json!({
                        "state_topic": self.topic(group.sub_topic, "state"),
                        "command_topic": self.topic(group.sub_topic, "set"),
                    }),
                )?);
            }
        }

        let status = EntityDescriptor::sensor("Command Status", "solarpi_command_status", "message")
            .with_icon("mdi:message-reply-text");
        messages.push(self.announce(
            &status,
            json!({ "state_topic": self.topic(STATUS_SUB_TOPIC, "state") }),
        )?);

        Ok(messages)
    }

    fn announce(&self, entity: &EntityDescriptor, topics: Value) -> serde_json::Result<Message> {
        let mut payload = json!({
            "availability": [{ "topic": self.availability_topic() }],
            "device": self.device,
            "object_id": entity.unique_id,
        });
        merge(&mut payload, topics);
        merge(&mut payload, serde_json::to_value(entity)?);

        Ok(Message {
            topic: discovery_topic(&self.mqtt.discovery_topic, entity.component, &entity.unique_id),
            retain: true,
            payload: serde_json::to_string(&payload)?,
        })
    }
}

pub fn discovery_topic(prefix: &str, component: Component, unique_id: &str) -> String {
    format!("{prefix}/{}/{unique_id}/config", component.as_str())
}

fn merge(target: &mut Value, source: Value) {
    if let (Value::Object(target), Value::Object(source)) = (target, source) {
        target.extend(source);
    }
}
