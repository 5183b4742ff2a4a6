#![allow(dead_code)]

//! Register map and codec for the Growatt SPH3000 (Modbus protocol 3.05).
//!
//! Everything here is pure: raw register blocks in, typed values out, and
//! back again for the writable TOU schedules.

use thiserror::Error;
use types::TimeValues;

mod sensors;
mod tou;

pub use sensors::{decode_input_block1, decode_input_block2, ERROR_CODES, STATUS_CODES};
pub use tou::{
    decode_tou_charging, decode_tou_discharging, encode_tou_charging, encode_tou_discharging,
    pack_time, unpack_time,
};

/// Input registers 0..106: PV, grid and inverter state.
pub const INPUT_BLOCK1_START: u16 = 0;
pub const INPUT_BLOCK1_LEN: usize = 106;
/// Input registers 1000..1064: battery, grid exchange and load.
pub const INPUT_BLOCK2_START: u16 = 1000;
pub const INPUT_BLOCK2_LEN: usize = 64;

/// Holding registers 45..51: device clock.
pub const CLOCK_START: u16 = 45;
pub const CLOCK_LEN: usize = 6;

/// Holding registers 1090..1093: charge power, stop SOC, AC charge flag.
pub const TOU_CHARGING_START: u16 = 1090;
pub const TOU_CHARGING_LEN: usize = 3;
/// Holding registers 1100..1109: three charging periods.
pub const TOU_CHARGING_PERIODS_START: u16 = 1100;
/// Holding registers 1070..1072: discharge power, stop SOC.
pub const TOU_DISCHARGING_START: u16 = 1070;
pub const TOU_DISCHARGING_LEN: usize = 2;
/// Holding registers 1080..1089: three discharging periods.
pub const TOU_DISCHARGING_PERIODS_START: u16 = 1080;
/// Start, stop and enable register for each of the three periods.
pub const TOU_PERIODS_LEN: usize = 9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("register block too short: expected {expected}, got {actual}")]
    ShortBlock { expected: usize, actual: usize },
}

/// Views the front of a transport result as the fixed-size block a decoder expects.
pub fn block<const N: usize>(registers: &[u16]) -> Result<&[u16; N], CodecError> {
    registers
        .get(..N)
        .and_then(|head| head.try_into().ok())
        .ok_or(CodecError::ShortBlock {
            expected: N,
            actual: registers.len(),
        })
}

/// Joins a high/low register pair into one unsigned 32-bit magnitude.
pub fn combine_u32(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

/// Inverse of [`combine_u32`]: returns `(high, low)`.
pub fn split_u32(value: u32) -> (u16, u16) {
    ((value >> 16) as u16, (value & 0xFFFF) as u16)
}

/// Registers carry tenths of the physical unit.
pub fn scale_tenths(raw: u32) -> f64 {
    f64::from(raw) / 10.0
}

/// Inverse of [`scale_tenths`], rounding to the nearest tenth.
pub fn unscale_tenths(value: f64) -> u32 {
    (value * 10.0).round() as u32
}

pub fn decode_time(data: &[u16; CLOCK_LEN]) -> TimeValues {
    TimeValues {
        year: data[0],
        month: data[1],
        day: data[2],
        hour: data[3],
        minute: data[4],
        second: data[5],
    }
}
