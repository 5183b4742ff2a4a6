use register_codec::{
    block, combine_u32, decode_input_block1, decode_input_block2, decode_time,
    decode_tou_charging, decode_tou_discharging, encode_tou_charging, encode_tou_discharging,
    pack_time, scale_tenths, split_u32, unpack_time, unscale_tenths, CodecError,
    INPUT_BLOCK1_LEN, INPUT_BLOCK2_LEN,
};
use types::{CodeLabel, Switch, TouChargingValues, TouDischargingValues, TouPeriod};

#[test]
fn combine_and_split_are_inverse() {
    for value in [0u32, 1, 0xFFFF, 0x1_0000, 123_456_789, u32::MAX] {
        let (high, low) = split_u32(value);
        assert_eq!(combine_u32(high, low), value);
    }
    assert_eq!(combine_u32(0x0001, 0x0002), 0x0001_0002);
    // High word with the top bit set must stay unsigned.
    assert_eq!(combine_u32(0x8000, 0), 0x8000_0000);
}

#[test]
fn tenths_scaling_round_trips() {
    for raw in [0u32, 7, 1000, 65_535, 4_000_000_000] {
        let physical = scale_tenths(raw);
        assert_eq!(unscale_tenths(physical), raw);
    }
    assert!((scale_tenths(1000) - 100.0).abs() < f64::EPSILON);
}

#[test]
fn block_rejects_short_transport_results() {
    let registers = vec![0u16; 10];
    assert_eq!(
        block::<INPUT_BLOCK2_LEN>(&registers).unwrap_err(),
        CodecError::ShortBlock {
            expected: INPUT_BLOCK2_LEN,
            actual: 10
        }
    );

    let longer = vec![7u16; 12];
    let head = block::<3>(&longer).expect("long enough");
    assert_eq!(head, &[7, 7, 7]);
}

#[test]
fn input_block1_decodes_documented_offsets() {
    let mut data = [0u16; INPUT_BLOCK1_LEN];
    data[0] = 5;
    data[1] = 0x0000;
    data[2] = 0x03E8;
    data[3] = 3125;
    data[5] = 0;
    data[6] = 600;
    data[7] = 2980;
    data[9] = 0;
    data[10] = 400;
    data[38] = 2401;
    data[59] = 0;
    data[60] = 52;
    data[63] = 0;
    data[64] = 31;
    data[91] = 0x0001;
    data[92] = 0x0000;
    data[93] = 387;
    data[105] = 302;

    let pv = decode_input_block1(&data);
    assert_eq!(pv.inverter_status, CodeLabel::Label("Normal".to_string()));
    assert_eq!(pv.ppv, 100.0);
    assert_eq!(pv.vpv1, 312.5);
    assert_eq!(pv.ppv1, 60.0);
    assert_eq!(pv.vpv2, 298.0);
    assert_eq!(pv.ppv2, 40.0);
    assert_eq!(pv.vac, 240.1);
    assert_eq!(pv.epv_today, 8.3);
    assert_eq!(pv.epv_total, 6553.6);
    assert_eq!(pv.inverter_temperature, 38.7);
    assert_eq!(pv.inverter_error, CodeLabel::Label("No AC connection".to_string()));
}

#[test]
fn unknown_status_and_error_codes_fall_back_to_numbers() {
    let mut data = [0u16; INPUT_BLOCK1_LEN];
    data[0] = 42;
    data[105] = 999;

    let pv = decode_input_block1(&data);
    assert_eq!(pv.inverter_status, CodeLabel::Code(42));
    assert_eq!(pv.inverter_error, CodeLabel::Code(999));

    let json = serde_json::to_value(&pv).expect("serialize");
    assert_eq!(json["inverterStatus"], 42);
    assert_eq!(json["inverterError"], 999);
}

#[test]
fn input_block2_decodes_battery_and_energy() {
    let mut data = [0u16; INPUT_BLOCK2_LEN];
    data[10] = 1500;
    data[12] = 250;
    data[14] = 87;
    data[22] = 12;
    data[30] = 3400;
    data[38] = 4567;
    data[45] = 11;
    data[47] = 1234;
    data[49] = 22;
    data[50] = 1;
    data[53] = 33;
    data[55] = 44;
    data[57] = 55;
    data[59] = 66;
    data[61] = 77;
    data[63] = 88;

    let battery = decode_input_block2(&data);
    assert_eq!(battery.p_discharge, 150.0);
    assert_eq!(battery.p_charge, 25.0);
    assert_eq!(battery.soc, 87);
    assert_eq!(battery.p_import, 1.2);
    assert_eq!(battery.p_export, 340.0);
    assert_eq!(battery.p_load, 456.7);
    assert_eq!(battery.e_import_today, 1.1);
    assert_eq!(battery.e_import_total, 123.4);
    assert_eq!(battery.e_export_today, 2.2);
    assert_eq!(battery.e_export_total, 6553.6);
    assert_eq!(battery.e_discharge_today, 3.3);
    assert_eq!(battery.e_discharge_total, 4.4);
    assert_eq!(battery.e_charge_today, 5.5);
    assert_eq!(battery.e_charge_total, 6.6);
    assert_eq!(battery.e_load_today, 7.7);
    assert_eq!(battery.e_load_total, 8.8);
}

#[test]
fn tou_charging_decodes_packed_periods() {
    let values = decode_tou_charging(&[50, 80, 1], &[0x0600, 0x1200, 1, 0, 0, 0, 0, 0, 0]);

    assert_eq!(values.charge_power, 50);
    assert_eq!(values.stop_soc, 80);
    assert_eq!(values.ac, Switch::On);
    assert_eq!(
        values.periods[0],
        TouPeriod {
            start_hour: 6,
            start_minute: 0,
            stop_hour: 18,
            stop_minute: 0,
            enabled: Switch::On,
        }
    );
    assert_eq!(values.periods[1], TouPeriod::default());
    assert_eq!(values.periods[2], TouPeriod::default());
}

#[test]
fn enable_registers_other_than_one_read_as_off() {
    let values = decode_tou_charging(&[100, 100, 2], &[0, 0, 7, 0, 0, 1, 0, 0, 0]);
    assert_eq!(values.ac, Switch::Off);
    assert_eq!(values.periods[0].enabled, Switch::Off);
    assert_eq!(values.periods[1].enabled, Switch::On);
}

#[test]
fn tou_charging_round_trips_through_registers() {
    let values = TouChargingValues {
        charge_power: 75,
        stop_soc: 95,
        ac: Switch::On,
        periods: [
            TouPeriod {
                start_hour: 0,
                start_minute: 30,
                stop_hour: 5,
                stop_minute: 30,
                enabled: Switch::On,
            },
            TouPeriod {
                start_hour: 13,
                start_minute: 15,
                stop_hour: 15,
                stop_minute: 45,
                enabled: Switch::Off,
            },
            TouPeriod {
                start_hour: 23,
                start_minute: 0,
                stop_hour: 23,
                stop_minute: 59,
                enabled: Switch::On,
            },
        ],
    };

    let (settings, periods) = encode_tou_charging(&values);
    assert_eq!(settings, [75, 95, 1]);
    assert_eq!(&periods[..3], &[0x001E, 0x051E, 1]);
    assert_eq!(decode_tou_charging(&settings, &periods), values);
}

#[test]
fn tou_discharging_round_trips_through_registers() {
    let mut values = TouDischargingValues::default();
    values.discharge_power = 60;
    values.stop_soc = 20;
    values.periods[1] = TouPeriod {
        start_hour: 17,
        start_minute: 0,
        stop_hour: 20,
        stop_minute: 0,
        enabled: Switch::On,
    };

    let (settings, periods) = encode_tou_discharging(&values);
    assert_eq!(settings, [60, 20]);
    assert_eq!(&periods[3..6], &[0x1100, 0x1400, 1]);
    assert_eq!(decode_tou_discharging(&settings, &periods), values);
}

#[test]
fn time_packing_uses_high_byte_for_hours() {
    assert_eq!(pack_time(6, 0), 0x0600);
    assert_eq!(pack_time(18, 30), 0x121E);
    assert_eq!(unpack_time(0x121E), (18, 30));
}

#[test]
fn clock_block_maps_one_to_one() {
    let time = decode_time(&[2024, 3, 9, 14, 5, 59]);
    assert_eq!(time.year, 2024);
    assert_eq!(time.month, 3);
    assert_eq!(time.day, 9);
    assert_eq!(time.hour, 14);
    assert_eq!(time.minute, 5);
    assert_eq!(time.second, 59);
    assert_eq!(time.to_string(), "2024-03-09 14:05:59");
}
