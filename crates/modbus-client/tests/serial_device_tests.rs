use modbus_client::{ClientConfig, ModbusClient};

// Runs only against real hardware: MODBUS_TEST_DEVICE=/dev/ttyUSB0 cargo test
#[tokio::test]
async fn serial_device_integration_read() {
    let device = match std::env::var("MODBUS_TEST_DEVICE") {
        Ok(value) => value,
        Err(_) => return,
    };

    let config = ClientConfig {
        device,
        baud_rate: env_u32("MODBUS_TEST_BAUD_RATE").unwrap_or(9_600),
        unit_id: env_u32("MODBUS_TEST_UNIT_ID").unwrap_or(1) as u8,
        timeout_ms: env_u64("MODBUS_TEST_TIMEOUT_MS").unwrap_or(5_000),
    };
    let start = env_u32("MODBUS_TEST_START").unwrap_or(0) as u16;
    let count = env_u32("MODBUS_TEST_COUNT").unwrap_or(8) as u16;

    let client = ModbusClient::connect(&config).await.expect("connect");
    let values = client.read_input(start, count).await.expect("read");

    assert_eq!(values.len() as u16, count);
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}
