//! 컨트롤러 통합 테스트
//!
//! 공개 API만 사용하여 트래픽 재생, 차단, 만료, 생명주기를 검증합니다.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use ironwall_core::clock::{Clock, ManualClock};
use ironwall_core::config::IronwallConfig;
use ironwall_core::pipeline::HealthStatus;
use ironwall_core::types::{AttackPattern, DdosPattern, PacketRecord, Protocol, ThreatCategory};
use ironwall_filter::{FilterBackend, FilterError, FilterMode, IpFamily, SimulatedBackend};
use ironwall_firewall::FirewallController;

/// 호출을 기록하는 백엔드
#[derive(Default)]
struct RecordingBackend {
    blocked: Mutex<Vec<IpAddr>>,
    unblocked: Mutex<Vec<IpAddr>>,
}

impl FilterBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn probe(&self, _family: IpFamily) -> Result<(), FilterError> {
        Ok(())
    }

    async fn block(&self, addr: IpAddr) -> Result<(), FilterError> {
        self.blocked.lock().push(addr);
        Ok(())
    }

    async fn unblock(&self, addr: IpAddr) -> Result<(), FilterError> {
        self.unblocked.lock().push(addr);
        Ok(())
    }
}

fn packet(src: &str, at: SystemTime, dst_port: u16, protocol: Protocol) -> PacketRecord {
    PacketRecord {
        timestamp: at,
        src_ip: src.parse().expect("valid ip"),
        dst_ip: "10.0.0.1".parse().expect("valid ip"),
        src_port: 51000,
        dst_port,
        protocol,
        size: 64,
        flags: "".parse().expect("empty flags"),
        payload_size: 20,
    }
}

async fn recording_controller(
    clock: &ManualClock,
) -> (FirewallController<RecordingBackend>, Arc<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::default());
    let controller = FirewallController::builder()
        .config(IronwallConfig::default())
        .backend(Arc::clone(&backend))
        .clock(Arc::new(clock.clone()))
        .build()
        .await
        .expect("default config is valid");
    (controller, backend)
}

#[tokio::test]
async fn quiet_source_passes_and_flooder_is_blocked() {
    let clock = ManualClock::default();
    let t0 = clock.now();
    let (controller, backend) = recording_controller(&clock).await;
    controller.start();

    // A: 5 pps, 10개 포트, 플래그 없음
    for i in 0..10u64 {
        let at = t0 + Duration::from_millis(i * 200);
        let verdict = controller
            .process_packet(&packet("192.0.2.10", at, 8000 + i as u16, Protocol::Tcp))
            .await
            .expect("running controller returns a verdict");
        assert!(!verdict.is_threat, "A flagged at packet {i}: {verdict}");
    }

    // B: 1200 pps UDP, 2초
    let mut last = None;
    for i in 0..2400u64 {
        let at = t0 + Duration::from_micros(i * 1_000_000 / 1200);
        last = controller
            .process_packet(&packet("198.51.100.66", at, 53, Protocol::Udp))
            .await;
    }
    let verdict = last.expect("verdict");
    assert_eq!(verdict.category, ThreatCategory::Ddos);
    assert_eq!(verdict.pattern, Some(AttackPattern::Ddos(DdosPattern::UdpFlood)));
    assert!(verdict.confidence >= 0.7);

    let a: IpAddr = "192.0.2.10".parse().expect("valid ip");
    let b: IpAddr = "198.51.100.66".parse().expect("valid ip");
    let blocked: Vec<IpAddr> = controller.list_blocked().iter().map(|e| e.address).collect();
    assert_eq!(blocked, vec![b]);
    assert!(!blocked.contains(&a));
    assert_eq!(*backend.blocked.lock(), vec![b]);

    let stats = controller.stats();
    assert_eq!(stats.packets_analyzed, 2410);
    assert_eq!(stats.threats_blocked, 1);
    assert_eq!(stats.active_flows, 2);
    assert_eq!(stats.filter_mode, FilterMode::Enforcing);
    assert_eq!(controller.health(), HealthStatus::Healthy);

    controller.stop().await;
}

#[tokio::test]
async fn manual_unblock_removes_backend_rule() {
    let clock = ManualClock::default();
    let t0 = clock.now();
    let (controller, backend) = recording_controller(&clock).await;
    controller.start();

    for i in 0..1200u64 {
        let at = t0 + Duration::from_micros(i * 800);
        controller
            .process_packet(&packet("203.0.113.5", at, 80, Protocol::Icmp))
            .await;
    }
    let addr: IpAddr = "203.0.113.5".parse().expect("valid ip");
    assert!(controller.unblock_manually(addr).await);
    assert_eq!(*backend.unblocked.lock(), vec![addr]);
    assert!(controller.list_blocked().is_empty());

    controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn periodic_sweep_expires_blocks() {
    let clock = ManualClock::default();
    let t0 = clock.now();
    let mut config = IronwallConfig::default();
    config.filter.block_duration_secs = 300;
    config.firewall.sweep_interval_secs = 30;

    let backend = Arc::new(RecordingBackend::default());
    let controller = FirewallController::builder()
        .config(config)
        .backend(Arc::clone(&backend))
        .clock(Arc::new(clock.clone()))
        .build()
        .await
        .expect("valid config");
    controller.start();

    for i in 0..1500u64 {
        let at = t0 + Duration::from_micros(i * 1_000_000 / 1200);
        controller
            .process_packet(&packet("198.51.100.77", at, 53, Protocol::Udp))
            .await;
    }
    assert_eq!(controller.stats().blocked_count, 1);

    clock.advance(Duration::from_secs(301));
    tokio::time::sleep(Duration::from_secs(31)).await;

    let stats = controller.stats();
    assert!(stats.sweeps >= 1);
    assert_eq!(stats.blocked_count, 0);
    assert_eq!(stats.active_flows, 0);
    assert_eq!(backend.unblocked.lock().len(), 1);

    controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stopped_controller_does_not_sweep() {
    let clock = ManualClock::default();
    let (controller, _) = recording_controller(&clock).await;
    controller.start();
    controller.stop().await;

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(controller.stats().sweeps, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_are_counted() {
    let clock = ManualClock::default();
    let t0 = clock.now();
    let controller = Arc::new(
        FirewallController::builder()
            .config(IronwallConfig::default())
            .backend(Arc::new(SimulatedBackend))
            .clock(Arc::new(clock.clone()))
            .build()
            .await
            .expect("valid config"),
    );
    controller.start();

    let mut handles = Vec::new();
    for worker in 0..4u8 {
        let controller = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            let src = format!("192.0.2.{}", worker + 1);
            for i in 0..250u64 {
                let at = t0 + Duration::from_millis(i * 100);
                controller
                    .process_packet(&packet(&src, at, 443, Protocol::Tcp))
                    .await;
            }
        }));
    }
    for handle in handles {
        handle.await.expect("producer panicked");
    }

    let stats = controller.stats();
    assert_eq!(stats.packets_analyzed, 1000);
    assert_eq!(stats.active_flows, 4);
    assert_eq!(stats.threats_blocked, 0);
    controller.stop().await;
}

#[tokio::test]
async fn whitelisted_flooder_is_detected_but_not_blocked() {
    let clock = ManualClock::default();
    let t0 = clock.now();
    let mut config = IronwallConfig::default();
    config.filter.whitelist.push("198.51.100.200".to_owned());
    let (backend, controller) = {
        let backend = Arc::new(RecordingBackend::default());
        let controller = FirewallController::builder()
            .config(config)
            .backend(Arc::clone(&backend))
            .clock(Arc::new(clock.clone()))
            .build()
            .await
            .expect("valid config");
        (backend, controller)
    };
    controller.start();

    for i in 0..1500u64 {
        let at = t0 + Duration::from_micros(i * 1_000_000 / 1200);
        controller
            .process_packet(&packet("198.51.100.200", at, 53, Protocol::Udp))
            .await;
    }
    let stats = controller.stats();
    assert!(stats.threats_detected > 0);
    assert_eq!(stats.threats_blocked, 0);
    assert!(backend.blocked.lock().is_empty());
    controller.stop().await;
}

#[tokio::test]
async fn stats_serialize_to_json() {
    let clock = ManualClock::default();
    let (controller, _) = recording_controller(&clock).await;
    controller.start();
    let json = serde_json::to_value(controller.stats()).expect("stats serialize");
    assert_eq!(json["running"], true);
    assert_eq!(json["filter_mode"], "enforcing");
    controller.stop().await;
}
