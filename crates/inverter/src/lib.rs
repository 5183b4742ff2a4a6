#![allow(dead_code)]

//! Inverter drivers: register I/O, TOU schedule cache and command handling
//! behind one object-safe [`Inverter`] trait.

use async_trait::async_trait;
use discovery::EntityGroup;
use types::SensorSnapshot;

pub mod dispatcher;
pub mod error;
pub mod model;
pub mod sph3000;
pub mod tou;

pub use dispatcher::{Command, CommandAck, CommandOutput, CommandReply};
pub use error::{FieldViolation, InverterError, ValidationError};
pub use model::InverterModel;
pub use sph3000::Sph3000;
pub use tou::{ControlData, Fields, TouState, TouValues};

/// What the bridge needs from a connected inverter, whatever the model.
#[async_trait]
pub trait Inverter: Send + Sync {
    fn model(&self) -> InverterModel;

    fn sensor_entities(&self) -> EntityGroup;

    fn command_entities(&self) -> EntityGroup;

    fn control_entities(&self) -> Vec<EntityGroup>;

    async fn get_sensor_data(&self) -> Result<SensorSnapshot, InverterError>;

    /// Handles a raw `{"command": ...}` payload. Never fails: every outcome is
    /// reported through the acknowledgement.
    async fn send_command(&self, payload: &str) -> CommandReply;

    /// Patches the cached schedule named by `sub_topic`; no device I/O.
    fn update_control(
        &self,
        sub_topic: &str,
        payload: &str,
    ) -> Result<Vec<ControlData>, InverterError>;

    fn control_values(&self) -> Vec<ControlData>;
}
