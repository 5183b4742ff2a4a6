//! Cached TOU schedules as the control channel sees them.
//!
//! Each scope is kept as a flat JSON field map so partial patches can be
//! merged in one field at a time. The typed values only exist after
//! [`TouState::validate`] succeeds, which is the gate for every write.

use serde_json::{Map, Value};
use tracing::debug;
use types::{
    FieldKind, Switch, TouChargingValues, TouDischargingValues, TouPeriod, TouScope, TOU_PERIODS,
};

use crate::error::{FieldViolation, InverterError, ValidationError};

pub type Fields = Map<String, Value>;

/// Published state of one scope: `{base}/{scope}/state` carries `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlData {
    pub scope: TouScope,
    pub values: Fields,
}

impl ControlData {
    pub fn sub_topic(&self) -> &'static str {
        self.scope.sub_topic()
    }
}

/// A validated schedule of either scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouValues {
    Charging(TouChargingValues),
    Discharging(TouDischargingValues),
}

impl TouValues {
    pub fn scope(&self) -> TouScope {
        match self {
            Self::Charging(_) => TouScope::Charging,
            Self::Discharging(_) => TouScope::Discharging,
        }
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        match self {
            Self::Charging(values) => {
                fields.insert("chargePower".into(), values.charge_power.into());
                fields.insert("stopSOC".into(), values.stop_soc.into());
                fields.insert("ac".into(), values.ac.as_str().into());
                insert_periods(&mut fields, &values.periods);
            }
            Self::Discharging(values) => {
                fields.insert("dischargePower".into(), values.discharge_power.into());
                fields.insert("stopSOC".into(), values.stop_soc.into());
                insert_periods(&mut fields, &values.periods);
            }
        }
        fields
    }
}

fn insert_periods(fields: &mut Fields, periods: &[TouPeriod; TOU_PERIODS]) {
    for (i, period) in periods.iter().enumerate() {
        let n = i + 1;
        fields.insert(format!("period{n}StartHour"), period.start_hour.into());
        fields.insert(format!("period{n}StartMinute"), period.start_minute.into());
        fields.insert(format!("period{n}StopHour"), period.stop_hour.into());
        fields.insert(format!("period{n}StopMinute"), period.stop_minute.into());
        fields.insert(format!("period{n}Enabled"), period.enabled.as_str().into());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TouState {
    charging: Fields,
    discharging: Fields,
}

impl Default for TouState {
    fn default() -> Self {
        Self::new(TouChargingValues::default(), TouDischargingValues::default())
    }
}

impl TouState {
    pub fn new(charging: TouChargingValues, discharging: TouDischargingValues) -> Self {
        Self {
            charging: TouValues::Charging(charging).to_fields(),
            discharging: TouValues::Discharging(discharging).to_fields(),
        }
    }

    pub fn fields(&self, scope: TouScope) -> &Fields {
        match scope {
            TouScope::Charging => &self.charging,
            TouScope::Discharging => &self.discharging,
        }
    }

    fn fields_mut(&mut self, scope: TouScope) -> &mut Fields {
        match scope {
            TouScope::Charging => &mut self.charging,
            TouScope::Discharging => &mut self.discharging,
        }
    }

    /// Replaces a scope wholesale with values read back from the device.
    pub fn overwrite(&mut self, values: &TouValues) {
        *self.fields_mut(values.scope()) = values.to_fields();
    }

    /// Merges a JSON object into one scope. Keys that are not fields of the
    /// scope are dropped; values are stored as given and only checked by
    /// [`TouState::validate`].
    pub fn apply_control_patch(
        &mut self,
        scope: TouScope,
        payload: &str,
    ) -> Result<Vec<ControlData>, InverterError> {
        let patch = parse_object(payload)?;
        let fields = self.fields_mut(scope);
        for (key, value) in patch {
            if scope.field(&key).is_some() {
                fields.insert(key, value);
            } else {
                debug!(%scope, key = %key, "ignoring unknown control field");
            }
        }
        Ok(self.snapshot())
    }

    /// Current state of both scopes, charging first.
    pub fn snapshot(&self) -> Vec<ControlData> {
        TouScope::ALL
            .into_iter()
            .map(|scope| ControlData {
                scope,
                values: self.fields(scope).clone(),
            })
            .collect()
    }

    pub fn validate(&self, scope: TouScope) -> Result<TouValues, ValidationError> {
        let fields = self.fields(scope);
        let mut reader = FieldReader {
            scope,
            fields,
            violations: fields
                .keys()
                .filter(|key| scope.field(key).is_none())
                .map(|key| FieldViolation::Unknown(key.clone()))
                .collect(),
        };

        let values = match scope {
            TouScope::Charging => TouValues::Charging(TouChargingValues {
                charge_power: reader.number("chargePower"),
                stop_soc: reader.number("stopSOC"),
                ac: reader.switch("ac"),
                periods: reader.periods(),
            }),
            TouScope::Discharging => TouValues::Discharging(TouDischargingValues {
                discharge_power: reader.number("dischargePower"),
                stop_soc: reader.number("stopSOC"),
                periods: reader.periods(),
            }),
        };

        if reader.violations.is_empty() {
            Ok(values)
        } else {
            Err(ValidationError {
                scope,
                violations: reader.violations,
            })
        }
    }
}

/// Parses control and command payloads. Home Assistant templates are allowed
/// to use single quotes, so they are swapped for double quotes first.
pub(crate) fn parse_object(payload: &str) -> Result<Fields, InverterError> {
    let text = payload.replace('\'', "\"");
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(InverterError::Parse(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(err) => Err(InverterError::Parse(err.to_string())),
    }
}

/// Pulls typed values out of a field map, collecting every violation instead
/// of stopping at the first. Failed fields read as zero.
struct FieldReader<'a> {
    scope: TouScope,
    fields: &'a Fields,
    violations: Vec<FieldViolation>,
}

impl<'a> FieldReader<'a> {
    fn get(&mut self, key: &str) -> Option<(&'static str, FieldKind, &'a Value)> {
        let field = self.scope.field(key)?;
        let fields: &'a Fields = self.fields;
        match fields.get(key) {
            Some(value) => Some((field.key, field.kind, value)),
            None => {
                self.violations.push(FieldViolation::Missing(field.key));
                None
            }
        }
    }

    fn number(&mut self, key: &str) -> u16 {
        let Some((field, kind, value)) = self.get(key) else {
            return 0;
        };
        let (min, max) = kind.bounds().unwrap_or((0, u16::MAX));
        match as_integer(value) {
            Some(n) if (min..=max).contains(&n) => n,
            _ => {
                self.violations.push(FieldViolation::OutOfRange {
                    field,
                    value: value.clone(),
                    min,
                    max,
                });
                0
            }
        }
    }

    fn small(&mut self, key: &str) -> u8 {
        u8::try_from(self.number(key)).unwrap_or_default()
    }

    fn switch(&mut self, key: &str) -> Switch {
        let Some((field, _, value)) = self.get(key) else {
            return Switch::Off;
        };
        match value.as_str().map(str::parse::<Switch>) {
            Some(Ok(switch)) => switch,
            _ => {
                self.violations.push(FieldViolation::NotOnOff {
                    field,
                    value: value.clone(),
                });
                Switch::Off
            }
        }
    }

    fn periods(&mut self) -> [TouPeriod; TOU_PERIODS] {
        let mut periods = [TouPeriod::default(); TOU_PERIODS];
        for (i, period) in periods.iter_mut().enumerate() {
            let n = i + 1;
            *period = TouPeriod {
                start_hour: self.small(&format!("period{n}StartHour")),
                start_minute: self.small(&format!("period{n}StartMinute")),
                stop_hour: self.small(&format!("period{n}StopHour")),
                stop_minute: self.small(&format!("period{n}StopMinute")),
                enabled: self.switch(&format!("period{n}Enabled")),
            };
        }
        periods
    }
}

/// Whole numbers only: `50`, `50.0` and `"50"` are accepted, `50.5` is not.
fn as_integer(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(n) => u16::try_from(n).ok(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(f))
                .map(|f| f as u16),
        },
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
