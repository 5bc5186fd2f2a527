//! End-to-end failover over real TCP sockets.

mod common;

use std::time::Duration;

use broker_failover::resilience::RetryPolicy;
use broker_failover::transport::TcpTransport;
use common::{closed_port, harness, start_mock_broker, wait_until};

#[tokio::test]
async fn test_fails_over_to_listening_broker() {
    let dead = closed_port().await;
    let (live, mut accepted) = start_mock_broker().await;
    let dead = dead.to_string();
    let live = live.to_string();

    let h = harness(
        &[dead.as_str(), live.as_str()],
        TcpTransport::new(Duration::from_secs(2)),
        RetryPolicy::new(2, Duration::from_millis(10)),
    );

    let session = h.manager.acquire(None).await.unwrap();
    assert_eq!(session.endpoint().as_str(), live);
    assert!(session.is_open());
    assert_eq!(h.manager.active_endpoint().unwrap().as_str(), live);
    assert_eq!(h.metrics.failures(&dead), 2);
    assert_eq!(h.alerts.count_containing(&dead), 1);

    let server_side = tokio::time::timeout(Duration::from_secs(2), accepted.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(session.peer_addr().is_some());

    h.manager.shutdown().await;
    drop(server_side);
}

#[tokio::test]
async fn test_peer_close_probes_same_broker() {
    let (live, mut accepted) = start_mock_broker().await;
    let live = live.to_string();

    let h = harness(
        &[live.as_str()],
        TcpTransport::new(Duration::from_secs(2)),
        RetryPolicy::new(2, Duration::from_millis(10)),
    );

    let session = h.manager.acquire(None).await.unwrap();
    let server_side = tokio::time::timeout(Duration::from_secs(2), accepted.recv())
        .await
        .unwrap()
        .unwrap();

    // Broker hangs up; the watchdog sees the fault and recovery reconnects.
    drop(server_side);

    assert!(wait_until(|| h.metrics.ups(&live) == 2, Duration::from_secs(3)).await);
    assert_eq!(h.metrics.downs(&live), 1);
    assert_eq!(h.alerts.count_containing("Connection failed on"), 1);
    assert_eq!(h.resets.count(), 0);
    assert!(wait_until(|| !session.is_open(), Duration::from_secs(1)).await);

    h.manager.shutdown().await;
}
