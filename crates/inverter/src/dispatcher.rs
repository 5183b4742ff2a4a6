use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use types::{SensorSnapshot, TimeValues, TouScope};

use crate::error::InverterError;
use crate::tou::{parse_object, ControlData, TouValues};

/// Command names accepted on `{base}/command/set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetSensorData,
    SetTouCharging,
    SetTouDischarging,
    GetTouCharging,
    GetTouDischarging,
    GetTime,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::GetSensorData,
        Command::SetTouCharging,
        Command::SetTouDischarging,
        Command::GetTouCharging,
        Command::GetTouDischarging,
        Command::GetTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetSensorData => "getSensorData",
            Self::SetTouCharging => "setTouCharging",
            Self::SetTouDischarging => "setTouDischarging",
            Self::GetTouCharging => "getTouCharging",
            Self::GetTouDischarging => "getTouDischarging",
            Self::GetTime => "getTime",
        }
    }

    /// The scope a set command commits, if any.
    pub fn commits(self) -> Option<TouScope> {
        match self {
            Self::SetTouCharging => Some(TouScope::Charging),
            Self::SetTouDischarging => Some(TouScope::Discharging),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = InverterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| InverterError::UnknownCommand(s.to_string()))
    }
}

/// What a successfully executed command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Sensors(SensorSnapshot),
    Committed(TouScope),
    Schedule(TouValues),
    Time(TimeValues),
}

impl CommandOutput {
    pub fn message(&self) -> String {
        match self {
            Self::Sensors(_) => "sensor data read".to_string(),
            Self::Committed(scope) => format!("{scope} values written"),
            Self::Schedule(values) => format!("{} values read", values.scope()),
            Self::Time(time) => format!("inverter time is {time}"),
        }
    }
}

/// Payload of `{base}/status/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandAck {
    pub error: bool,
    pub message: String,
}

impl CommandAck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}

/// Everything the MQTT layer has to publish after one command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub ack: CommandAck,
    pub sensors: Option<SensorSnapshot>,
    pub controls: Option<Vec<ControlData>>,
}

impl CommandReply {
    pub fn ack(ack: CommandAck) -> Self {
        Self {
            ack,
            sensors: None,
            controls: None,
        }
    }
}

/// Extracts the command name from `{"command": name}`.
pub fn parse_command(payload: &str) -> Result<String, InverterError> {
    let object = parse_object(payload)?;
    match object.get("command") {
        Some(serde_json::Value::String(name)) => Ok(name.clone()),
        Some(other) => Err(InverterError::Parse(format!(
            "command must be a string, got {other}"
        ))),
        None => Err(InverterError::Parse("missing \"command\" field".to_string())),
    }
}
