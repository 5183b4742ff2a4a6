use std::sync::Arc;
use std::time::Duration;

use modbus_client::mock::{Call, MockTransport, RegisterKind};
use modbus_client::{ClientError, ModbusClient};

fn client_with(mock: &MockTransport, timeout: Duration) -> Arc<ModbusClient<MockTransport>> {
    Arc::new(ModbusClient::with_link(mock.clone(), timeout))
}

#[tokio::test]
async fn concurrent_calls_never_overlap() {
    let mock = MockTransport::new();
    mock.set_delay(Duration::from_millis(5));
    mock.set_block(RegisterKind::Input, 0, vec![1, 2, 3]);
    mock.set_block(RegisterKind::Holding, 1090, vec![50, 80, 1]);
    let client = client_with(&mock, Duration::from_secs(1));

    let mut handles = Vec::new();
    for i in 0..12u16 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            match i % 3 {
                0 => client.read_input(0, 3).await.map(|_| ()),
                1 => client.read_holding(1090, 3).await.map(|_| ()),
                _ => client.write_holding(2000 + i, &[i]).await,
            }
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("call");
    }

    let mut windows = mock.windows();
    assert_eq!(windows.len(), 12);
    windows.sort_by_key(|window| window.started);
    for pair in windows.windows(2) {
        assert!(
            pair[0].finished <= pair[1].started,
            "overlapping windows: {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[tokio::test]
async fn holding_reads_from_many_callers_are_disjoint() {
    let mock = MockTransport::new();
    mock.set_delay(Duration::from_millis(2));
    let client = client_with(&mock, Duration::from_secs(1));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move { client.read_holding(45, 6).await }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("join").expect("read").len(), 6);
    }

    assert_eq!(mock.call_count(), 8);
    let windows = mock.windows();
    for (i, a) in windows.iter().enumerate() {
        for b in windows.iter().skip(i + 1) {
            let disjoint = a.finished <= b.started || b.finished <= a.started;
            assert!(disjoint, "windows overlap: {a:?} {b:?}");
        }
    }
}

#[tokio::test]
async fn transport_error_releases_the_link() {
    let mock = MockTransport::new();
    mock.fail_writes(true);
    let client = client_with(&mock, Duration::from_secs(1));

    let err = client.write_holding(1090, &[1, 2, 3]).await.expect_err("write fails");
    assert!(matches!(err, ClientError::Modbus(_)));

    let values = client.read_holding(1090, 3).await.expect("link still usable");
    assert_eq!(values, vec![0, 0, 0]);
    assert_eq!(
        mock.calls(),
        vec![
            Call::WriteHolding {
                address: 1090,
                values: vec![1, 2, 3],
            },
            Call::ReadHolding {
                address: 1090,
                count: 3,
            },
        ]
    );
}

#[tokio::test]
async fn timeout_surfaces_and_is_not_retried() {
    let mock = MockTransport::new();
    mock.set_delay(Duration::from_millis(200));
    let client = client_with(&mock, Duration::from_millis(20));

    let err = client.read_input(0, 106).await.expect_err("times out");
    assert!(matches!(err, ClientError::Timeout { timeout_ms: 20 }));
    assert_eq!(mock.call_count(), 1);

    mock.set_delay(Duration::ZERO);
    let values = client.read_input(0, 2).await.expect("lock released after timeout");
    assert_eq!(values.len(), 2);
}
