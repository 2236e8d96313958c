//! 탐지 엔진 통합 테스트
//!
//! 공개 API만으로 트래픽 시나리오를 재생하여 판정을 검증합니다.

use std::net::IpAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use ironwall_core::clock::ManualClock;
use ironwall_core::config::DetectionConfig;
use ironwall_core::types::{
    AttackPattern, DdosPattern, PacketRecord, Protocol, ScanPattern, TcpFlags, ThreatCategory,
};
use ironwall_detector::ThreatDetector;

fn t0() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn record(src: &str, at: SystemTime, dst_port: u16, protocol: Protocol, flags: &str) -> PacketRecord {
    PacketRecord {
        timestamp: at,
        src_ip: src.parse().expect("valid ip"),
        dst_ip: "10.0.0.1".parse().expect("valid ip"),
        src_port: 50000,
        dst_port,
        protocol,
        size: 64,
        flags: flags.parse().expect("valid flags"),
        payload_size: 0,
    }
}

fn detector() -> ThreatDetector {
    ThreatDetector::builder()
        .clock(Arc::new(ManualClock::new(t0())))
        .build()
        .expect("default config is valid")
}

#[test]
fn single_packet_rate_is_finite() {
    let detector = detector();
    detector.analyze(&record("192.0.2.1", t0(), 80, Protocol::Tcp, "SYN"));
    let flow = detector
        .flow_snapshot(&"192.0.2.1".parse::<IpAddr>().expect("valid ip"))
        .expect("flow exists");
    assert_eq!(flow.first_seen, flow.last_seen);
    assert!(flow.packets_per_second().is_finite());
    assert!(flow.packets_per_second() >= 0.0);
}

#[test]
fn sustained_udp_flood_is_ddos() {
    let detector = detector();
    let mut last = None;
    // 1200 pps, 2초
    for i in 0..2400u64 {
        let at = t0() + Duration::from_micros(i * 1_000_000 / 1200);
        last = Some(detector.analyze(&record("198.51.100.9", at, 53, Protocol::Udp, "")));
    }
    let verdict = last.expect("verdict");
    assert!(verdict.is_threat);
    assert_eq!(verdict.category, ThreatCategory::Ddos);
    assert_eq!(verdict.pattern, Some(AttackPattern::Ddos(DdosPattern::UdpFlood)));
    assert!(verdict.confidence >= 0.7);
    assert_eq!(verdict.reason(), "DDoS: UDP_FLOOD");
}

#[test]
fn syn_scan_over_51_ports_is_port_scan() {
    let detector = detector();
    let mut last = None;
    for port in 1..=51u16 {
        let at = t0() + Duration::from_millis(u64::from(port) * 50);
        last = Some(detector.analyze(&record("203.0.113.77", at, port, Protocol::Tcp, "SYN")));
    }
    let verdict = last.expect("verdict");
    assert_eq!(verdict.category, ThreatCategory::PortScan);
    assert!(verdict.confidence >= 0.6);
    assert_eq!(verdict.pattern, Some(AttackPattern::Scan(ScanPattern::TcpSynScan)));
}

#[test]
fn slow_browsing_stays_normal() {
    let detector = detector();
    for i in 0..50u64 {
        let at = t0() + Duration::from_millis(i * 200);
        let verdict =
            detector.analyze(&record("192.0.2.50", at, (i % 10 + 1) as u16, Protocol::Tcp, ""));
        assert!(!verdict.is_threat, "packet {i} flagged: {verdict}");
    }
}

#[test]
fn custom_threshold_lowers_ddos_trigger() {
    let config = DetectionConfig {
        ddos_pps_threshold: 50.0,
        ..DetectionConfig::default()
    };
    let detector = ThreatDetector::builder()
        .config(config)
        .clock(Arc::new(ManualClock::new(t0())))
        .build()
        .expect("valid config");

    let mut last = None;
    for i in 0..200u64 {
        let at = t0() + Duration::from_millis(i * 10);
        last = Some(detector.analyze(&record("198.51.100.3", at, 0, Protocol::Icmp, "")));
    }
    let verdict = last.expect("verdict");
    assert_eq!(verdict.pattern, Some(AttackPattern::Ddos(DdosPattern::IcmpFlood)));
}

#[test]
fn concurrent_analysis_counts_every_packet() {
    let detector = Arc::new(detector());
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let detector = Arc::clone(&detector);
            thread::spawn(move || {
                for i in 0..250u64 {
                    let at = t0() + Duration::from_millis(i);
                    let flags = TcpFlags::ACK.to_string();
                    detector.analyze(&record("192.0.2.200", at, 443, Protocol::Tcp, &flags));
                }
                worker
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let flow = detector
        .flow_snapshot(&"192.0.2.200".parse::<IpAddr>().expect("valid ip"))
        .expect("flow exists");
    assert_eq!(flow.packet_count, 1000);
    assert_eq!(detector.active_flows(), 1);
}
