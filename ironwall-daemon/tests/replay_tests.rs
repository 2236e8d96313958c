//! Replay tests: NDJSON input through the controller.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ironwall_core::clock::ManualClock;
use ironwall_core::config::IronwallConfig;
use ironwall_daemon::input::PacketReader;
use ironwall_daemon::replay::replay;
use ironwall_filter::SimulatedBackend;
use ironwall_firewall::FirewallController;

const T0: u64 = 1_700_000_000;

fn line(src: &str, offset_micros: u64, protocol: &str, dst_port: u16) -> String {
    let secs = T0 + offset_micros / 1_000_000;
    let nanos = (offset_micros % 1_000_000) * 1_000;
    format!(
        r#"{{"timestamp":{{"secs_since_epoch":{secs},"nanos_since_epoch":{nanos}}},"src_ip":"{src}","dst_ip":"10.0.0.1","src_port":40000,"dst_port":{dst_port},"protocol":"{protocol}","size":64,"flags":"","payload_size":36}}"#
    )
}

async fn controller() -> FirewallController<SimulatedBackend> {
    let mut config = IronwallConfig::default();
    config.filter.backend = "simulated".to_owned();
    FirewallController::builder()
        .config(config)
        .backend(Arc::new(SimulatedBackend))
        .clock(Arc::new(ManualClock::default()))
        .build()
        .await
        .expect("valid config")
}

#[tokio::test]
async fn flood_in_capture_is_blocked() {
    let mut input = String::new();
    for i in 0..10u64 {
        writeln!(input, "{}", line("192.0.2.10", i * 200_000, "TCP", 8000 + i as u16)).unwrap();
    }
    input.push_str("garbage line\n");
    for i in 0..2400u64 {
        writeln!(input, "{}", line("198.51.100.66", i * 1_000_000 / 1200, "UDP", 53)).unwrap();
    }

    let controller = controller().await;
    controller.start();
    let mut reader = PacketReader::new(input.as_bytes());
    let summary = replay(&controller, &mut reader, &CancellationToken::new())
        .await
        .expect("in-memory input never fails");

    assert_eq!(summary.records, 2410);
    assert_eq!(summary.skipped, 1);
    assert!(summary.threats > 0);
    assert!(!summary.interrupted);

    let blocked: Vec<String> = controller
        .list_blocked()
        .iter()
        .map(|e| e.address.to_string())
        .collect();
    assert_eq!(blocked, vec!["198.51.100.66".to_owned()]);
    assert_eq!(controller.list_blocked()[0].reason, "DDoS: UDP_FLOOD");
    controller.stop().await;
}

#[tokio::test]
async fn records_before_start_get_no_verdict() {
    let input = format!("{}\n", line("192.0.2.1", 0, "UDP", 53));
    let controller = controller().await;
    let mut reader = PacketReader::new(input.as_bytes());
    let summary = replay(&controller, &mut reader, &CancellationToken::new())
        .await
        .expect("in-memory input never fails");
    assert_eq!(summary.records, 1);
    assert_eq!(summary.threats, 0);
    assert_eq!(controller.stats().packets_analyzed, 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_follow_mode() {
    let controller = controller().await;
    controller.start();
    let shutdown = CancellationToken::new();

    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });

    let input = format!("{}\n", line("192.0.2.1", 0, "UDP", 53));
    let mut reader = PacketReader::new(input.as_bytes()).follow(true);
    let summary = replay(&controller, &mut reader, &shutdown)
        .await
        .expect("in-memory input never fails");

    assert!(summary.interrupted);
    assert_eq!(summary.records, 1);
    controller.stop().await;
}
