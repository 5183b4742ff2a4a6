use std::time::Duration;

use bridge_app::home_assistant::{discovery_topic, Config, Entities};
use bridge_app::mqtt::{route, Message, Route};
use bridge_app::MqttConfig;
use discovery::Component;
use inverter::{CommandAck, CommandReply, Inverter, InverterModel, Sph3000, TouState};
use modbus_client::mock::MockTransport;
use modbus_client::ModbusClient;
use serde_json::Value;

fn discovery_messages(mqtt: &MqttConfig) -> Vec<Message> {
    let sensors = discovery::sensor_entities();
    let commands = discovery::command_entities();
    let controls = discovery::control_entities();
    Config::new(mqtt, InverterModel::Sph3000)
        .all(&Entities {
            sensors: &sensors,
            commands: &commands,
            controls: &controls,
        })
        .expect("discovery messages")
}

fn payload_for(messages: &[Message], topic: &str) -> Value {
    let message = messages
        .iter()
        .find(|message| message.topic == topic)
        .unwrap_or_else(|| panic!("no message on {topic}"));
    assert!(message.retain);
    serde_json::from_str(&message.payload).expect("json payload")
}

#[test]
fn sensor_config_points_at_sensor_state() {
    let messages = discovery_messages(&MqttConfig::default());

    let payload = payload_for(
        &messages,
        "homeassistant/sensor/solarpi_power_pv/config",
    );
    assert_eq!(payload["state_topic"], "solarpi/sensor/state");
    assert_eq!(payload["json_attributes_topic"], "solarpi/sensor/state");
    assert_eq!(payload["value_template"], "{{ value_json.ppv }}");
    assert_eq!(payload["object_id"], "solarpi_power_pv");
    assert_eq!(payload["availability"][0]["topic"], "solarpi/bridge/availability");
    assert_eq!(payload["device"]["identifiers"][0], "solarpi");
    assert_eq!(payload["unit_of_measurement"], "W");
    assert!(payload.get("command_topic").is_none());
}

#[test]
fn commands_and_controls_carry_command_topics() {
    let mqtt = MqttConfig {
        base_topic: "garage/solarpi".to_string(),
        ..MqttConfig::default()
    };
    let messages = discovery_messages(&mqtt);

    let button = payload_for(
        &messages,
        "homeassistant/button/solarpi_set_tou_charging/config",
    );
    assert_eq!(button["command_topic"], "garage/solarpi/command/set");
    assert_eq!(button["payload_press"], "{\"command\": \"setTouCharging\"}");

    let number = payload_for(
        &messages,
        "homeassistant/number/solarpi_tou_discharging_stop_soc/config",
    );
    assert_eq!(number["command_topic"], "garage/solarpi/touDischarging/set");
    assert_eq!(number["state_topic"], "garage/solarpi/touDischarging/state");
    assert_eq!(number["max"], 100);

    let select = payload_for(
        &messages,
        "homeassistant/select/solarpi_tou_charging_period1_enabled/config",
    );
    assert_eq!(select["options"], serde_json::json!(["ON", "OFF"]));
}

#[test]
fn status_sensor_shows_the_last_acknowledgement() {
    let messages = discovery_messages(&MqttConfig::default());

    let status = payload_for(
        &messages,
        "homeassistant/sensor/solarpi_command_status/config",
    );
    assert_eq!(status["state_topic"], "solarpi/status/state");
    assert_eq!(status["value_template"], "{{ value_json.message }}");

    let expected = 27 + 5 + 18 + 17 + 1;
    assert_eq!(messages.len(), expected);
}

#[test]
fn discovery_topic_uses_component_and_unique_id() {
    assert_eq!(
        discovery_topic("ha", Component::Select, "solarpi_x"),
        "ha/select/solarpi_x/config"
    );
}

#[test]
fn inbound_topics_route_by_sub_topic() {
    assert_eq!(route("solarpi", "solarpi/command/set"), Some(Route::Command));
    assert_eq!(
        route("solarpi", "solarpi/touCharging/set"),
        Some(Route::Control("touCharging".to_string()))
    );
    assert_eq!(route("solarpi", "solarpi/touCharging/state"), None);
    assert_eq!(route("solarpi", "other/command/set"), None);
    assert_eq!(route("solarpi", "solarpix/command/set"), None);
    assert_eq!(route("solarpi", "solarpi/a/b/set"), None);
}

#[test]
fn failed_command_reply_publishes_controls_then_ack() {
    let reply = CommandReply {
        ack: CommandAck::failed("unknown command: unknownFoo"),
        sensors: None,
        controls: Some(TouState::default().snapshot()),
    };

    let messages = Message::for_reply("solarpi", &reply).expect("messages");

    let topics: Vec<&str> = messages.iter().map(|m| m.topic.as_str()).collect();
    assert_eq!(
        topics,
        vec![
            "solarpi/touCharging/state",
            "solarpi/touDischarging/state",
            "solarpi/status/state",
        ]
    );
    let ack: Value = serde_json::from_str(&messages[2].payload).expect("ack json");
    assert_eq!(ack["error"], true);
    assert_eq!(ack["message"], "unknown command: unknownFoo");
    let charging: Value = serde_json::from_str(&messages[0].payload).expect("state json");
    assert_eq!(charging["chargePower"], 100);
    assert!(messages[0].retain);
    assert!(!messages[2].retain);
}

#[tokio::test]
async fn sensor_state_is_a_flat_snapshot() {
    let mock = MockTransport::new();
    let device = Sph3000::new(
        ModbusClient::with_link(mock, Duration::from_secs(1)),
        TouState::default(),
    );
    let snapshot = device.get_sensor_data().await.expect("snapshot");

    let message = Message::for_sensors("solarpi", &snapshot).expect("message");

    assert_eq!(message.topic, "solarpi/sensor/state");
    assert!(message.retain);
    let payload: Value = serde_json::from_str(&message.payload).expect("json");
    assert_eq!(payload["inverterStatus"], "Waiting");
    assert_eq!(payload["soc"], 0);
    assert!(payload.get("eLoadTotal").is_some());
}
