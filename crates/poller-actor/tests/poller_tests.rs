use std::sync::Arc;
use std::time::Duration;

use inverter::{Inverter, Sph3000, TouState};
use modbus_client::mock::{MockTransport, RegisterKind};
use modbus_client::ModbusClient;
use poller_actor::{ActorConfig, PollerActor, PollerError};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use types::CodeLabel;

fn inverter(mock: &MockTransport) -> Arc<dyn Inverter> {
    let client = ModbusClient::with_link(mock.clone(), Duration::from_millis(200));
    Arc::new(Sph3000::new(client, TouState::default()))
}

fn fast() -> ActorConfig {
    ActorConfig {
        poll_interval: Duration::from_millis(10),
        jitter_ms: 0,
    }
}

#[tokio::test]
async fn forwards_snapshots_until_shutdown() {
    let mock = MockTransport::new();
    let mut block1 = vec![0u16; 106];
    block1[0] = 5;
    mock.set_block(RegisterKind::Input, 0, block1);
    let (tx, mut rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(PollerActor::new(inverter(&mock), tx, shutdown_rx, fast()).run());

    for _ in 0..2 {
        let sample = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("sample in time")
            .expect("open channel");
        assert_eq!(
            sample.snapshot.pv.inverter_status,
            CodeLabel::Label("Normal".into())
        );
    }

    shutdown_tx.send(true).expect("signal shutdown");
    let outcome = timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller stops")
        .expect("join");
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn read_failures_do_not_stop_polling() {
    let mock = MockTransport::new();
    mock.fail_reads(true);
    let (tx, mut rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(PollerActor::new(inverter(&mock), tx, shutdown_rx, fast()).run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    assert!(mock.call_count() >= 2);

    mock.fail_reads(false);
    let sample = timeout(Duration::from_secs(2), rx.recv()).await;
    assert!(matches!(sample, Ok(Some(_))));

    shutdown_tx.send(true).expect("signal shutdown");
    handle.await.expect("join").expect("clean exit");
}

#[tokio::test]
async fn closed_channel_ends_the_poller() {
    let mock = MockTransport::new();
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let outcome = timeout(
        Duration::from_secs(2),
        PollerActor::new(inverter(&mock), tx, shutdown_rx, fast()).run(),
    )
    .await
    .expect("poller stops");

    assert!(matches!(outcome, Err(PollerError::ChannelClosed)));
}
