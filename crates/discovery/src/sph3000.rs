use types::{FieldKind, TouScope};

use crate::{EntityDescriptor, EntityGroup};

pub const SENSOR_SUB_TOPIC: &str = "sensor";
pub const COMMAND_SUB_TOPIC: &str = "command";

pub fn sensor_entities() -> EntityGroup {
    type E = EntityDescriptor;
    let entities = vec![
        E::sensor("Inverter Status", "solarpi_inverter_status", "inverterStatus"),
        E::sensor("PV Power", "solarpi_power_pv", "ppv").power(),
        E::sensor("PV1 Voltage", "solarpi_voltage_pv1", "vpv1").voltage(),
        E::sensor("PV1 Power", "solarpi_power_pv1", "ppv1").power(),
        E::sensor("PV2 Voltage", "solarpi_voltage_pv2", "vpv2").voltage(),
        E::sensor("PV2 Power", "solarpi_power_pv2", "ppv2").power(),
        E::sensor("Grid Voltage", "solarpi_voltage_grid", "vac").voltage(),
        E::sensor("PV Energy Today", "solarpi_energy_pv_today", "epvToday").energy(),
        E::sensor("PV Energy Total", "solarpi_energy_pv_total", "epvTotal").energy(),
        E::sensor("Inverter Temperature", "solarpi_temperature_inverter", "inverterTemperature")
            .temperature(),
        E::sensor("Inverter Error", "solarpi_inverter_error", "inverterError"),
        E::sensor("Battery Discharge Power", "solarpi_power_discharge", "pDischarge").power(),
        E::sensor("Battery Charge Power", "solarpi_power_charge", "pCharge").power(),
        E::sensor("State of Charge", "solarpi_state_of_charge", "soc")
            .percent()
            .with_icon("mdi:battery"),
        E::sensor("Import Power", "solarpi_power_import", "pImport").power(),
        E::sensor("Export Power", "solarpi_power_export", "pExport").power(),
        E::sensor("Load Power", "solarpi_power_to_load", "pLoad").power(),
        E::sensor("Import Energy Today", "solarpi_energy_import_today", "eImportToday").energy(),
        E::sensor("Import Energy Total", "solarpi_energy_import_total", "eImportTotal").energy(),
        E::sensor("Export Energy Today", "solarpi_energy_export_today", "eExportToday").energy(),
        E::sensor("Export Energy Total", "solarpi_energy_export_total", "eExportTotal").energy(),
        E::sensor(
            "Battery Discharge Energy Today",
            "solarpi_energy_discharge_today",
            "eDischargeToday",
        )
        .energy(),
        E::sensor(
            "Battery Discharge Energy Total",
            "solarpi_energy_discharge_total",
            "eDischargeTotal",
        )
        .energy(),
        E::sensor("Battery Charge Energy Today", "solarpi_energy_charge_today", "eChargeToday")
            .energy(),
        E::sensor("Battery Charge Energy Total", "solarpi_energy_charge_total", "eChargeTotal")
            .energy(),
        E::sensor("Load Energy Today", "solarpi_energy_to_load_today", "eLoadToday").energy(),
        E::sensor("Load Energy Total", "solarpi_energy_to_load_total", "eLoadTotal").energy(),
    ];

    EntityGroup {
        sub_topic: SENSOR_SUB_TOPIC,
        entities,
    }
}

pub fn command_entities() -> EntityGroup {
    let button = |name: &str, unique_id: &str, command: &str| {
        EntityDescriptor::button(name, unique_id, format!("{{\"command\": \"{command}\"}}"))
    };

    EntityGroup {
        sub_topic: COMMAND_SUB_TOPIC,
        entities: vec![
            button("Get TOU Charging", "solarpi_get_tou_charging", "getTouCharging")
                .with_icon("mdi:download"),
            button("Set TOU Charging", "solarpi_set_tou_charging", "setTouCharging")
                .with_icon("mdi:upload"),
            button("Get TOU Discharging", "solarpi_get_tou_discharging", "getTouDischarging")
                .with_icon("mdi:download"),
            button("Set TOU Discharging", "solarpi_set_tou_discharging", "setTouDischarging")
                .with_icon("mdi:upload"),
            button("Get Inverter Time", "solarpi_get_time", "getTime").with_icon("mdi:clock"),
        ],
    }
}

/// One group per TOU scope: a number input per bounded field, a selector per ON/OFF field.
pub fn control_entities() -> Vec<EntityGroup> {
    TouScope::ALL
        .into_iter()
        .map(|scope| {
            let title = match scope {
                TouScope::Charging => "TOU Charging",
                TouScope::Discharging => "TOU Discharging",
            };
            let prefix = match scope {
                TouScope::Charging => "solarpi_tou_charging",
                TouScope::Discharging => "solarpi_tou_discharging",
            };

            let entities = scope
                .fields()
                .iter()
                .map(|field| {
                    let name = format!("{title} {}", field.label);
                    let unique_id = format!("{prefix}_{}", snake_case(field.key));
                    match field.kind.bounds() {
                        Some((min, max)) => {
                            let entity =
                                EntityDescriptor::number(name, unique_id, field.key, min, max);
                            if field.kind == FieldKind::Percent {
                                entity.with_unit("%")
                            } else {
                                entity
                            }
                        }
                        None => EntityDescriptor::switch(name, unique_id, field.key),
                    }
                })
                .collect();

            EntityGroup {
                sub_topic: scope.sub_topic(),
                entities,
            }
        })
        .collect()
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut previous_lower = false;
    for ch in key.chars() {
        if ch.is_ascii_uppercase() && previous_lower {
            out.push('_');
        }
        previous_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_lowercase());
    }
    out
}
