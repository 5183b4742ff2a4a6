use types::{BatteryReadings, CodeLabel, PvReadings};

use crate::{combine_u32, scale_tenths, INPUT_BLOCK1_LEN, INPUT_BLOCK2_LEN};

pub const STATUS_CODES: [(u16, &str); 9] = [
    (0, "Waiting"),
    (1, "Self Test"),
    (2, "Reserved"),
    (3, "Fault"),
    (4, "Flash"),
    (5, "Normal"),
    (6, "Normal"),
    (7, "Normal"),
    (8, "Normal"),
];

pub const ERROR_CODES: [(u16, &str); 8] = [
    (201, "Leakage current too high"),
    (202, "The DC input voltage is exceeding the maximum tolerable value."),
    (203, "Insulation problem"),
    (300, "Utility grid voltage is out of permissible range."),
    (302, "No AC connection"),
    (303, "Utility grid frequency out of permissible range."),
    (304, "Voltage of Neutral and PE above 30V."),
    (407, "Auto test didn't pass."),
];

fn tenths_u32(data: &[u16], high: usize) -> f64 {
    scale_tenths(combine_u32(data[high], data[high + 1]))
}

fn tenths_u16(value: u16) -> f64 {
    scale_tenths(u32::from(value))
}

pub fn decode_input_block1(data: &[u16; INPUT_BLOCK1_LEN]) -> PvReadings {
    // PV1 and PV2 each keep their own daily total; the inverter has no combined register.
    let epv1_today = u64::from(combine_u32(data[59], data[60]));
    let epv2_today = u64::from(combine_u32(data[63], data[64]));

    PvReadings {
        inverter_status: CodeLabel::lookup(data[0], &STATUS_CODES),
        ppv: tenths_u32(data, 1),
        vpv1: tenths_u16(data[3]),
        ppv1: tenths_u32(data, 5),
        vpv2: tenths_u16(data[7]),
        ppv2: tenths_u32(data, 9),
        vac: tenths_u16(data[38]),
        epv_today: (epv1_today + epv2_today) as f64 / 10.0,
        epv_total: tenths_u32(data, 91),
        inverter_temperature: tenths_u16(data[93]),
        inverter_error: CodeLabel::lookup(data[105], &ERROR_CODES),
    }
}

pub fn decode_input_block2(data: &[u16; INPUT_BLOCK2_LEN]) -> BatteryReadings {
    BatteryReadings {
        p_discharge: tenths_u32(data, 9),
        p_charge: tenths_u32(data, 11),
        soc: data[14],
        p_import: tenths_u32(data, 21),
        p_export: tenths_u32(data, 29),
        p_load: tenths_u32(data, 37),
        e_import_today: tenths_u32(data, 44),
        e_import_total: tenths_u32(data, 46),
        e_export_today: tenths_u32(data, 48),
        e_export_total: tenths_u32(data, 50),
        e_discharge_today: tenths_u32(data, 52),
        e_discharge_total: tenths_u32(data, 54),
        e_charge_today: tenths_u32(data, 56),
        e_charge_total: tenths_u32(data, 58),
        e_load_today: tenths_u32(data, 60),
        e_load_total: tenths_u32(data, 62),
    }
}
