#![allow(dead_code)]

//! Static Home Assistant entity descriptors.
//!
//! Pure data: the MQTT layer merges each descriptor with topics, availability
//! and device information before publishing it as a discovery config.

use serde::Serialize;

mod sph3000;

pub use sph3000::{
    command_entities, control_entities, sensor_entities, COMMAND_SUB_TOPIC, SENSOR_SUB_TOPIC,
};

/// Home Assistant integration the entity is announced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Sensor,
    Button,
    Number,
    Select,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Button => "button",
            Self::Number => "number",
            Self::Select => "select",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDescriptor {
    pub name: String,
    #[serde(skip)]
    pub component: Component,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_press: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
}

impl EntityDescriptor {
    fn new(component: Component, name: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component,
            unique_id: unique_id.into(),
            device_class: None,
            state_class: None,
            unit_of_measurement: None,
            value_template: None,
            command_template: None,
            payload_press: None,
            min: None,
            max: None,
            step: None,
            mode: None,
            options: None,
            icon: None,
        }
    }

    /// A read-only value taken from `key` of the group's JSON state.
    pub fn sensor(name: impl Into<String>, unique_id: impl Into<String>, key: &str) -> Self {
        let mut entity = Self::new(Component::Sensor, name, unique_id);
        entity.value_template = Some(value_template(key));
        entity
    }

    /// A button that publishes `payload` to the group's command topic.
    pub fn button(name: impl Into<String>, unique_id: impl Into<String>, payload: String) -> Self {
        let mut entity = Self::new(Component::Button, name, unique_id);
        entity.payload_press = Some(payload);
        entity
    }

    /// A bounded number input that patches a single field.
    pub fn number(
        name: impl Into<String>,
        unique_id: impl Into<String>,
        key: &str,
        min: u16,
        max: u16,
    ) -> Self {
        let mut entity = Self::new(Component::Number, name, unique_id);
        entity.value_template = Some(value_template(key));
        entity.command_template = Some(format!("{{\"{key}\": {{{{ value }}}}}}"));
        entity.min = Some(min);
        entity.max = Some(max);
        entity.step = Some(1);
        entity.mode = Some("box");
        entity
    }

    /// An ON/OFF selector that patches a single field.
    pub fn switch(name: impl Into<String>, unique_id: impl Into<String>, key: &str) -> Self {
        let mut entity = Self::new(Component::Select, name, unique_id);
        entity.value_template = Some(value_template(key));
        entity.command_template = Some(format!("{{'{key}': '{{{{ value }}}}'}}"));
        entity.options = Some(vec!["ON", "OFF"]);
        entity
    }

    pub fn power(mut self) -> Self {
        self.device_class = Some("power");
        self.state_class = Some("measurement");
        self.unit_of_measurement = Some("W");
        self.icon = Some("mdi:lightning-bolt");
        self
    }

    pub fn energy(mut self) -> Self {
        self.device_class = Some("energy");
        self.state_class = Some("total");
        self.unit_of_measurement = Some("kWh");
        self.icon = Some("mdi:lightning-bolt");
        self
    }

    pub fn voltage(mut self) -> Self {
        self.device_class = Some("voltage");
        self.unit_of_measurement = Some("V");
        self.icon = Some("mdi:lightning-bolt");
        self
    }

    pub fn temperature(mut self) -> Self {
        self.device_class = Some("temperature");
        self.state_class = Some("measurement");
        self.unit_of_measurement = Some("°C");
        self
    }

    pub fn percent(mut self) -> Self {
        self.state_class = Some("measurement");
        self.unit_of_measurement = Some("%");
        self
    }

    pub fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit_of_measurement = Some(unit);
        self
    }

    pub fn with_icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }
}

fn value_template(key: &str) -> String {
    format!("{{{{ value_json.{key} }}}}")
}

/// Entities that share one state topic (and, for controls and commands, one set topic).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityGroup {
    pub sub_topic: &'static str,
    pub entities: Vec<EntityDescriptor>,
}
