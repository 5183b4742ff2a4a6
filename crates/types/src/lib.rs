#![allow(dead_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of independent time periods in each TOU schedule.
pub const TOU_PERIODS: usize = 3;

/// ON/OFF flag as the inverter and the control channel spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Switch {
    #[serde(rename = "ON")]
    On,
    #[default]
    #[serde(rename = "OFF")]
    Off,
}

impl Switch {
    /// Registers hold 1 for ON; any other value reads as OFF.
    pub fn from_register(value: u16) -> Self {
        if value == 1 {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn to_register(self) -> u16 {
        match self {
            Self::On => 1,
            Self::Off => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Switch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON" => Ok(Self::On),
            "OFF" => Ok(Self::Off),
            other => Err(format!("expected ON or OFF, got {other:?}")),
        }
    }
}

/// One start/stop window of a TOU schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TouPeriod {
    pub start_hour: u8,
    pub start_minute: u8,
    pub stop_hour: u8,
    pub stop_minute: u8,
    pub enabled: Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouChargingValues {
    /// Charge power limit in percent.
    pub charge_power: u16,
    /// Stop charging at this state of charge, in percent.
    pub stop_soc: u16,
    /// Allow charging from the grid.
    pub ac: Switch,
    pub periods: [TouPeriod; TOU_PERIODS],
}

impl Default for TouChargingValues {
    fn default() -> Self {
        Self {
            charge_power: 100,
            stop_soc: 100,
            ac: Switch::Off,
            periods: [TouPeriod::default(); TOU_PERIODS],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouDischargingValues {
    /// Discharge power limit in percent.
    pub discharge_power: u16,
    /// Stop discharging at this state of charge, in percent.
    pub stop_soc: u16,
    pub periods: [TouPeriod; TOU_PERIODS],
}

impl Default for TouDischargingValues {
    fn default() -> Self {
        Self {
            discharge_power: 100,
            stop_soc: 10,
            periods: [TouPeriod::default(); TOU_PERIODS],
        }
    }
}

/// The two independent schedule categories, each with its own cache and registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TouScope {
    #[serde(rename = "touCharging")]
    Charging,
    #[serde(rename = "touDischarging")]
    Discharging,
}

impl TouScope {
    pub const ALL: [TouScope; 2] = [TouScope::Charging, TouScope::Discharging];

    /// MQTT sub-topic that carries this scope's state and patches.
    pub fn sub_topic(self) -> &'static str {
        match self {
            Self::Charging => "touCharging",
            Self::Discharging => "touDischarging",
        }
    }
}

impl fmt::Display for TouScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sub_topic())
    }
}

impl FromStr for TouScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.sub_topic() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Device clock as read from the holding registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeValues {
    pub year: u16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

impl fmt::Display for TimeValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// A status or error code, published as its label when the code is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeLabel {
    Label(String),
    Code(u16),
}

impl CodeLabel {
    pub fn lookup(code: u16, table: &[(u16, &str)]) -> Self {
        table
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, label)| Self::Label((*label).to_string()))
            .unwrap_or(Self::Code(code))
    }
}

/// Values decoded from input registers 0..106.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvReadings {
    pub inverter_status: CodeLabel,
    pub ppv: f64,
    pub vpv1: f64,
    pub ppv1: f64,
    pub vpv2: f64,
    pub ppv2: f64,
    pub vac: f64,
    pub epv_today: f64,
    pub epv_total: f64,
    pub inverter_temperature: f64,
    pub inverter_error: CodeLabel,
}

/// Values decoded from input registers 1000..1064.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryReadings {
    pub p_discharge: f64,
    pub p_charge: f64,
    pub soc: u16,
    pub p_import: f64,
    pub p_export: f64,
    pub p_load: f64,
    pub e_import_today: f64,
    pub e_import_total: f64,
    pub e_export_today: f64,
    pub e_export_total: f64,
    pub e_discharge_today: f64,
    pub e_discharge_total: f64,
    pub e_charge_today: f64,
    pub e_charge_total: f64,
    pub e_load_today: f64,
    pub e_load_total: f64,
}

/// One poll's worth of sensor values, published as a single flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    #[serde(flatten)]
    pub pv: PvReadings,
    #[serde(flatten)]
    pub battery: BatteryReadings,
}

/// Value domain of one flat TOU field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Percent,
    Hour,
    Minute,
    Switch,
}

impl FieldKind {
    /// Inclusive numeric bounds; `None` for ON/OFF fields.
    pub fn bounds(self) -> Option<(u16, u16)> {
        match self {
            Self::Percent => Some((0, 100)),
            Self::Hour => Some((0, 23)),
            Self::Minute => Some((0, 59)),
            Self::Switch => None,
        }
    }
}

/// A named field of a TOU schedule as it appears in control patches and published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> TouField {
    TouField { key, label, kind }
}

pub const TOU_CHARGING_FIELDS: [TouField; 18] = [
    field("chargePower", "Charge Power", FieldKind::Percent),
    field("stopSOC", "Stop SOC", FieldKind::Percent),
    field("ac", "AC Charge", FieldKind::Switch),
    field("period1StartHour", "Period 1 Start Hour", FieldKind::Hour),
    field("period1StartMinute", "Period 1 Start Minute", FieldKind::Minute),
    field("period1StopHour", "Period 1 Stop Hour", FieldKind::Hour),
    field("period1StopMinute", "Period 1 Stop Minute", FieldKind::Minute),
    field("period1Enabled", "Period 1 Enabled", FieldKind::Switch),
    field("period2StartHour", "Period 2 Start Hour", FieldKind::Hour),
    field("period2StartMinute", "Period 2 Start Minute", FieldKind::Minute),
    field("period2StopHour", "Period 2 Stop Hour", FieldKind::Hour),
    field("period2StopMinute", "Period 2 Stop Minute", FieldKind::Minute),
    field("period2Enabled", "Period 2 Enabled", FieldKind::Switch),
    field("period3StartHour", "Period 3 Start Hour", FieldKind::Hour),
    field("period3StartMinute", "Period 3 Start Minute", FieldKind::Minute),
    field("period3StopHour", "Period 3 Stop Hour", FieldKind::Hour),
    field("period3StopMinute", "Period 3 Stop Minute", FieldKind::Minute),
    field("period3Enabled", "Period 3 Enabled", FieldKind::Switch),
];

pub const TOU_DISCHARGING_FIELDS: [TouField; 17] = [
    field("dischargePower", "Discharge Power", FieldKind::Percent),
    field("stopSOC", "Stop SOC", FieldKind::Percent),
    field("period1StartHour", "Period 1 Start Hour", FieldKind::Hour),
    field("period1StartMinute", "Period 1 Start Minute", FieldKind::Minute),
    field("period1StopHour", "Period 1 Stop Hour", FieldKind::Hour),
    field("period1StopMinute", "Period 1 Stop Minute", FieldKind::Minute),
    field("period1Enabled", "Period 1 Enabled", FieldKind::Switch),
    field("period2StartHour", "Period 2 Start Hour", FieldKind::Hour),
    field("period2StartMinute", "Period 2 Start Minute", FieldKind::Minute),
    field("period2StopHour", "Period 2 Stop Hour", FieldKind::Hour),
    field("period2StopMinute", "Period 2 Stop Minute", FieldKind::Minute),
    field("period2Enabled", "Period 2 Enabled", FieldKind::Switch),
    field("period3StartHour", "Period 3 Start Hour", FieldKind::Hour),
    field("period3StartMinute", "Period 3 Start Minute", FieldKind::Minute),
    field("period3StopHour", "Period 3 Stop Hour", FieldKind::Hour),
    field("period3StopMinute", "Period 3 Stop Minute", FieldKind::Minute),
    field("period3Enabled", "Period 3 Enabled", FieldKind::Switch),
];

impl TouScope {
    pub fn fields(self) -> &'static [TouField] {
        match self {
            Self::Charging => &TOU_CHARGING_FIELDS,
            Self::Discharging => &TOU_DISCHARGING_FIELDS,
        }
    }

    pub fn field(self, key: &str) -> Option<&'static TouField> {
        self.fields().iter().find(|field| field.key == key)
    }
}
