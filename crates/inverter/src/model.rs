use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use modbus_client::{ClientConfig, ModbusClient};

use crate::error::InverterError;
use crate::sph3000::Sph3000;
use crate::tou::TouState;
use crate::Inverter;

/// Supported inverter models, keyed by the tag used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverterModel {
    Sph3000,
}

impl InverterModel {
    pub const ALL: [InverterModel; 1] = [InverterModel::Sph3000];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sph3000 => "SPH3000",
        }
    }

    pub fn manufacturer(self) -> &'static str {
        match self {
            Self::Sph3000 => "Growatt",
        }
    }

    /// Opens the serial link and builds the model's driver with the safe
    /// default schedules cached.
    pub async fn connect(self, config: &ClientConfig) -> Result<Arc<dyn Inverter>, InverterError> {
        match self {
            Self::Sph3000 => {
                let client = ModbusClient::connect(config).await?;
                Ok(Arc::new(Sph3000::new(client, TouState::default())))
            }
        }
    }
}

impl fmt::Display for InverterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InverterModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unsupported inverter model: {s}"))
    }
}
