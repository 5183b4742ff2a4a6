use std::fmt;

use modbus_client::ClientError;
use register_codec::CodecError;
use serde_json::Value;
use thiserror::Error;
use types::TouScope;

#[derive(Debug, Error)]
pub enum InverterError {
    #[error("transport error: {0}")]
    Transport(#[from] ClientError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("malformed payload: {0}")]
    Parse(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown control scope: {0}")]
    UnknownScope(String),
}

/// One reason a cached schedule cannot be written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldViolation {
    #[error("{0} is not a field of this schedule")]
    Unknown(String),
    #[error("{0} is missing")]
    Missing(&'static str),
    #[error("{field} must be an integer between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: Value,
        min: u16,
        max: u16,
    },
    #[error("{field} must be ON or OFF, got {value}")]
    NotOnOff { field: &'static str, value: Value },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub struct ValidationError {
    pub scope: TouScope,
    pub violations: Vec<FieldViolation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} values: ", self.scope)?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}
