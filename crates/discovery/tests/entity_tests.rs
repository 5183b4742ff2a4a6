use std::collections::HashSet;

use discovery::{command_entities, control_entities, sensor_entities, Component};

#[test]
fn sensor_templates_point_at_snapshot_keys() {
    let group = sensor_entities();
    assert_eq!(group.sub_topic, "sensor");

    let pv2_voltage = group
        .entities
        .iter()
        .find(|entity| entity.unique_id == "solarpi_voltage_pv2")
        .expect("pv2 voltage");
    assert_eq!(
        pv2_voltage.value_template.as_deref(),
        Some("{{ value_json.vpv2 }}")
    );
    assert_eq!(pv2_voltage.unit_of_measurement, Some("V"));
    assert!(group
        .entities
        .iter()
        .all(|entity| entity.component == Component::Sensor));
}

#[test]
fn unique_ids_are_unique_across_groups() {
    let mut seen = HashSet::new();
    let groups = std::iter::once(sensor_entities())
        .chain(std::iter::once(command_entities()))
        .chain(control_entities());
    for group in groups {
        for entity in group.entities {
            assert!(seen.insert(entity.unique_id.clone()), "{}", entity.unique_id);
        }
    }
}

#[test]
fn command_buttons_press_command_payloads() {
    let group = command_entities();
    assert_eq!(group.sub_topic, "command");
    let set_charging = group
        .entities
        .iter()
        .find(|entity| entity.unique_id == "solarpi_set_tou_charging")
        .expect("button");
    assert_eq!(set_charging.component, Component::Button);

    let payload: serde_json::Value =
        serde_json::from_str(set_charging.payload_press.as_deref().expect("payload"))
            .expect("json payload");
    assert_eq!(payload["command"], "setTouCharging");
}

#[test]
fn control_entities_carry_field_bounds() {
    let groups = control_entities();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].sub_topic, "touCharging");
    assert_eq!(groups[0].entities.len(), 18);
    assert_eq!(groups[1].sub_topic, "touDischarging");
    assert_eq!(groups[1].entities.len(), 17);

    let start_hour = groups[0]
        .entities
        .iter()
        .find(|entity| entity.unique_id == "solarpi_tou_charging_period1_start_hour")
        .expect("start hour");
    assert_eq!(start_hour.component, Component::Number);
    assert_eq!((start_hour.min, start_hour.max), (Some(0), Some(23)));
    assert_eq!(
        start_hour.command_template.as_deref(),
        Some("{\"period1StartHour\": {{ value }}}")
    );

    let ac = groups[0]
        .entities
        .iter()
        .find(|entity| entity.unique_id == "solarpi_tou_charging_ac")
        .expect("ac");
    assert_eq!(ac.component, Component::Select);
    assert_eq!(ac.options, Some(vec!["ON", "OFF"]));
    assert_eq!(ac.command_template.as_deref(), Some("{'ac': '{{ value }}'}"));
}

#[test]
fn descriptors_serialize_without_empty_fields() {
    let group = sensor_entities();
    let status = serde_json::to_value(&group.entities[0]).expect("serialize");
    let object = status.as_object().expect("object");
    assert_eq!(object["name"], "Inverter Status");
    assert!(!object.contains_key("device_class"));
    assert!(!object.contains_key("component"));
}
