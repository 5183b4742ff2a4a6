use types::{Switch, TouChargingValues, TouDischargingValues, TouPeriod, TOU_PERIODS};

use crate::{TOU_CHARGING_LEN, TOU_DISCHARGING_LEN, TOU_PERIODS_LEN};

/// Splits a packed time register into `(hour, minute)`: hour in the high byte.
pub fn unpack_time(register: u16) -> (u8, u8) {
    ((register >> 8) as u8, (register & 0xFF) as u8)
}

pub fn pack_time(hour: u8, minute: u8) -> u16 {
    (u16::from(hour) << 8) | u16::from(minute)
}

fn decode_periods(data: &[u16; TOU_PERIODS_LEN]) -> [TouPeriod; TOU_PERIODS] {
    let mut periods = [TouPeriod::default(); TOU_PERIODS];
    for (period, regs) in periods.iter_mut().zip(data.chunks_exact(3)) {
        let (start_hour, start_minute) = unpack_time(regs[0]);
        let (stop_hour, stop_minute) = unpack_time(regs[1]);
        *period = TouPeriod {
            start_hour,
            start_minute,
            stop_hour,
            stop_minute,
            enabled: Switch::from_register(regs[2]),
        };
    }
    periods
}

fn encode_periods(periods: &[TouPeriod; TOU_PERIODS]) -> [u16; TOU_PERIODS_LEN] {
    let mut data = [0u16; TOU_PERIODS_LEN];
    for (regs, period) in data.chunks_exact_mut(3).zip(periods) {
        regs[0] = pack_time(period.start_hour, period.start_minute);
        regs[1] = pack_time(period.stop_hour, period.stop_minute);
        regs[2] = period.enabled.to_register();
    }
    data
}

pub fn decode_tou_charging(
    settings: &[u16; TOU_CHARGING_LEN],
    periods: &[u16; TOU_PERIODS_LEN],
) -> TouChargingValues {
    TouChargingValues {
        charge_power: settings[0],
        stop_soc: settings[1],
        ac: Switch::from_register(settings[2]),
        periods: decode_periods(periods),
    }
}

pub fn encode_tou_charging(
    values: &TouChargingValues,
) -> ([u16; TOU_CHARGING_LEN], [u16; TOU_PERIODS_LEN]) {
    (
        [values.charge_power, values.stop_soc, values.ac.to_register()],
        encode_periods(&values.periods),
    )
}

pub fn decode_tou_discharging(
    settings: &[u16; TOU_DISCHARGING_LEN],
    periods: &[u16; TOU_PERIODS_LEN],
) -> TouDischargingValues {
    TouDischargingValues {
        discharge_power: settings[0],
        stop_soc: settings[1],
        periods: decode_periods(periods),
    }
}

pub fn encode_tou_discharging(
    values: &TouDischargingValues,
) -> ([u16; TOU_DISCHARGING_LEN], [u16; TOU_PERIODS_LEN]) {
    (
        [values.discharge_power, values.stop_soc],
        encode_periods(&values.periods),
    )
}
