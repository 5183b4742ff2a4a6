use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use discovery::EntityGroup;
use modbus_client::{ModbusClient, RegisterIo};
use register_codec::{
    block, decode_input_block1, decode_input_block2, decode_time, decode_tou_charging,
    decode_tou_discharging, encode_tou_charging, encode_tou_discharging, CLOCK_LEN, CLOCK_START,
    INPUT_BLOCK1_LEN, INPUT_BLOCK1_START, INPUT_BLOCK2_LEN, INPUT_BLOCK2_START, TOU_CHARGING_LEN,
    TOU_CHARGING_PERIODS_START, TOU_CHARGING_START, TOU_DISCHARGING_LEN,
    TOU_DISCHARGING_PERIODS_START, TOU_DISCHARGING_START, TOU_PERIODS_LEN,
};
use tracing::{info, warn};
use types::{SensorSnapshot, TimeValues, TouScope};

use crate::dispatcher::{parse_command, Command, CommandAck, CommandOutput, CommandReply};
use crate::error::InverterError;
use crate::model::InverterModel;
use crate::tou::{ControlData, TouState, TouValues};
use crate::Inverter;

/// Growatt SPH3000 hybrid inverter behind one serialized Modbus link.
pub struct Sph3000<T> {
    client: ModbusClient<T>,
    tou: Mutex<TouState>,
}

impl<T: RegisterIo> Sph3000<T> {
    pub fn new(client: ModbusClient<T>, tou: TouState) -> Self {
        Self {
            client,
            tou: Mutex::new(tou),
        }
    }

    fn tou(&self) -> MutexGuard<'_, TouState> {
        self.tou.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn control_snapshot(&self) -> Vec<ControlData> {
        self.tou().snapshot()
    }

    async fn read_input_block<const N: usize>(
        &self,
        address: u16,
    ) -> Result<[u16; N], InverterError> {
        let registers = self.client.read_input(address, N as u16).await?;
        Ok(*block::<N>(&registers)?)
    }

    async fn read_holding_block<const N: usize>(
        &self,
        address: u16,
    ) -> Result<[u16; N], InverterError> {
        let registers = self.client.read_holding(address, N as u16).await?;
        Ok(*block::<N>(&registers)?)
    }

    pub async fn read_sensor_data(&self) -> Result<SensorSnapshot, InverterError> {
        let block1 = self
            .read_input_block::<INPUT_BLOCK1_LEN>(INPUT_BLOCK1_START)
            .await?;
        let block2 = self
            .read_input_block::<INPUT_BLOCK2_LEN>(INPUT_BLOCK2_START)
            .await?;
        Ok(SensorSnapshot {
            pv: decode_input_block1(&block1),
            battery: decode_input_block2(&block2),
        })
    }

    pub async fn read_time(&self) -> Result<TimeValues, InverterError> {
        let clock = self.read_holding_block::<CLOCK_LEN>(CLOCK_START).await?;
        Ok(decode_time(&clock))
    }

    /// Reads a schedule back from the device and replaces the cached scope.
    pub async fn refresh_from_device(&self, scope: TouScope) -> Result<TouValues, InverterError> {
        let values = match scope {
            TouScope::Charging => {
                let settings = self
                    .read_holding_block::<TOU_CHARGING_LEN>(TOU_CHARGING_START)
                    .await?;
                let periods = self
                    .read_holding_block::<TOU_PERIODS_LEN>(TOU_CHARGING_PERIODS_START)
                    .await?;
                TouValues::Charging(decode_tou_charging(&settings, &periods))
            }
            TouScope::Discharging => {
                let settings = self
                    .read_holding_block::<TOU_DISCHARGING_LEN>(TOU_DISCHARGING_START)
                    .await?;
                let periods = self
                    .read_holding_block::<TOU_PERIODS_LEN>(TOU_DISCHARGING_PERIODS_START)
                    .await?;
                TouValues::Discharging(decode_tou_discharging(&settings, &periods))
            }
        };
        self.tou().overwrite(&values);
        info!(%scope, "tou schedule refreshed from device");
        Ok(values)
    }

    /// Writes the cached schedule: settings block first, then the periods.
    /// Nothing is written unless the whole scope validates.
    pub async fn commit_to_device(&self, scope: TouScope) -> Result<(), InverterError> {
        let values = self.tou().validate(scope)?;
        match values {
            TouValues::Charging(values) => {
                let (settings, periods) = encode_tou_charging(&values);
                self.client
                    .write_holding(TOU_CHARGING_START, &settings)
                    .await?;
                self.client
                    .write_holding(TOU_CHARGING_PERIODS_START, &periods)
                    .await?;
            }
            TouValues::Discharging(values) => {
                let (settings, periods) = encode_tou_discharging(&values);
                self.client
                    .write_holding(TOU_DISCHARGING_START, &settings)
                    .await?;
                self.client
                    .write_holding(TOU_DISCHARGING_PERIODS_START, &periods)
                    .await?;
            }
        }
        info!(%scope, "tou schedule written to device");
        Ok(())
    }

    pub async fn execute(&self, command: Command) -> Result<CommandOutput, InverterError> {
        match command {
            Command::GetSensorData => self.read_sensor_data().await.map(CommandOutput::Sensors),
            Command::SetTouCharging => {
                self.commit_to_device(TouScope::Charging).await?;
                Ok(CommandOutput::Committed(TouScope::Charging))
            }
            Command::SetTouDischarging => {
                self.commit_to_device(TouScope::Discharging).await?;
                Ok(CommandOutput::Committed(TouScope::Discharging))
            }
            Command::GetTouCharging => self
                .refresh_from_device(TouScope::Charging)
                .await
                .map(CommandOutput::Schedule),
            Command::GetTouDischarging => self
                .refresh_from_device(TouScope::Discharging)
                .await
                .map(CommandOutput::Schedule),
            Command::GetTime => self.read_time().await.map(CommandOutput::Time),
        }
    }

    /// Runs a command by name. Unknown names fail before any device I/O.
    pub async fn dispatch(&self, name: &str) -> Result<CommandOutput, InverterError> {
        let command = name.parse::<Command>()?;
        self.execute(command).await
    }

    /// Best effort: re-reads a scope after a failed write so the published
    /// state matches what the device actually holds.
    async fn resync(&self, scope: TouScope) -> Vec<ControlData> {
        if let Err(err) = self.refresh_from_device(scope).await {
            warn!(%scope, error = %err, "tou resync failed");
        }
        self.control_snapshot()
    }

    pub async fn handle_command(&self, payload: &str) -> CommandReply {
        let name = match parse_command(payload) {
            Ok(name) => name,
            Err(err) => {
                warn!(payload, error = %err, "rejected command payload");
                return CommandReply::ack(CommandAck::failed(err.to_string()));
            }
        };

        let command = match name.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                warn!(command = %name, "unknown command");
                return CommandReply {
                    ack: CommandAck::failed(err.to_string()),
                    sensors: None,
                    controls: Some(self.control_snapshot()),
                };
            }
        };

        match self.execute(command).await {
            Ok(output) => {
                info!(%command, "command completed");
                let ack = CommandAck::ok(output.message());
                match output {
                    CommandOutput::Sensors(snapshot) => CommandReply {
                        ack,
                        sensors: Some(snapshot),
                        controls: None,
                    },
                    CommandOutput::Committed(_) | CommandOutput::Schedule(_) => CommandReply {
                        ack,
                        sensors: None,
                        controls: Some(self.control_snapshot()),
                    },
                    CommandOutput::Time(_) => CommandReply::ack(ack),
                }
            }
            Err(err) => {
                warn!(%command, error = %err, "command failed");
                // Pending edits stay cached unless a write actually reached the link.
                let rejected = matches!(err, InverterError::Validation(_));
                let controls = match command.commits() {
                    None => None,
                    Some(_) if rejected => Some(self.control_snapshot()),
                    Some(scope) => Some(self.resync(scope).await),
                };
                CommandReply {
                    ack: CommandAck::failed(err.to_string()),
                    sensors: None,
                    controls,
                }
            }
        }
    }
}

#[async_trait]
impl<T: RegisterIo + 'static> Inverter for Sph3000<T> {
    fn model(&self) -> InverterModel {
        InverterModel::Sph3000
    }

    fn sensor_entities(&self) -> EntityGroup {
        discovery::sensor_entities()
    }

    fn command_entities(&self) -> EntityGroup {
        discovery::command_entities()
    }

    fn control_entities(&self) -> Vec<EntityGroup> {
        discovery::control_entities()
    }

    async fn get_sensor_data(&self) -> Result<SensorSnapshot, InverterError> {
        self.read_sensor_data().await
    }

    async fn send_command(&self, payload: &str) -> CommandReply {
        self.handle_command(payload).await
    }

    fn update_control(
        &self,
        sub_topic: &str,
        payload: &str,
    ) -> Result<Vec<ControlData>, InverterError> {
        let scope = sub_topic
            .parse::<TouScope>()
            .map_err(InverterError::UnknownScope)?;
        self.tou().apply_control_patch(scope, payload)
    }

    fn control_values(&self) -> Vec<ControlData> {
        self.control_snapshot()
    }
}
