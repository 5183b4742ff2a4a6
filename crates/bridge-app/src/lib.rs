pub mod config;
pub mod home_assistant;
pub mod mqtt;

pub use config::{BridgeConfig, MqttConfig};
pub use mqtt::{Message, Mqtt, Route};
