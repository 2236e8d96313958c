//! 룰 엔진: 흐름 통계 임계값 기반 탐지
//!
//! 세 가지 검사를 순서대로 수행하고 처음 일치한 결과를 반환합니다.
//!
//! 1. **DDoS**: 초당 패킷 수가 임계값 초과
//! 2. **포트 스캔**: 고유 목적지 포트 수가 임계값 초과
//! 3. **무차별 대입**: 실패한 연결 수가 임계값 초과
//!
//! 어느 것도 일치하지 않으면 신뢰도 0.95의 정상 판정입니다.

use ironwall_core::config::DetectionConfig;
use ironwall_core::error::ConfigError;
use ironwall_core::types::{
    AttackPattern, BruteForcePattern, DdosPattern, PacketRecord, Protocol, ScanPattern, TcpFlags,
    ThreatCategory, ThreatVerdict, VerdictSource,
};

use crate::flow::FlowState;

/// 정상 판정의 신뢰도
pub const NORMAL_CONFIDENCE: f64 = 0.95;

/// SYN_FLOOD로 분류하기 위한 최소 SYN 패킷 수
const SYN_FLOOD_MIN_SYN: u64 = 100;

// 카테고리별 신뢰도 상한
const DDOS_CONFIDENCE_CAP: f64 = 0.95;
const SCAN_CONFIDENCE_CAP: f64 = 0.92;
const BRUTEFORCE_CONFIDENCE_CAP: f64 = 0.88;

/// 룰 엔진 임계값
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleThresholds {
    /// DDoS 초당 패킷 수 임계값
    pub ddos_pps: f64,
    /// 포트 스캔 고유 포트 수 임계값
    pub portscan_ports: usize,
    /// 무차별 대입 실패 연결 수 임계값
    pub bruteforce_failures: u64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self::from(&DetectionConfig::default())
    }
}

impl From<&DetectionConfig> for RuleThresholds {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            ddos_pps: config.ddos_pps_threshold,
            portscan_ports: config.portscan_threshold,
            bruteforce_failures: config.bruteforce_threshold,
        }
    }
}

/// 임계값 기반 룰 엔진
#[derive(Debug, Clone)]
pub struct RuleEngine {
    thresholds: RuleThresholds,
}

impl RuleEngine {
    /// 탐지 설정에서 룰 엔진을 생성합니다. 잘못된 임계값은 즉시 거부합니다.
    pub fn from_config(config: &DetectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            thresholds: RuleThresholds::from(config),
        })
    }

    /// 현재 임계값
    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// 패킷과 해당 출발지의 흐름 통계로 판정합니다.
    pub fn evaluate(&self, packet: &PacketRecord, flow: &FlowState) -> ThreatVerdict {
        let t = &self.thresholds;

        let pps = flow.packets_per_second();
        if pps > t.ddos_pps {
            let confidence = (0.7 + (pps / t.ddos_pps) * 0.1).min(DDOS_CONFIDENCE_CAP);
            return ThreatVerdict::threat(
                packet.src_ip,
                ThreatCategory::Ddos,
                confidence,
                Some(ddos_pattern(packet, flow)),
            )
            .with_detail("packets_per_second", pps)
            .with_detail("bytes_per_second", flow.bytes_per_second())
            .with_detail("syn_count", flow.syn_count as f64)
            .with_detail("threshold", t.ddos_pps)
            .decided_by(VerdictSource::Rules);
        }

        let ports = flow.distinct_ports();
        if ports > t.portscan_ports {
            let confidence = (0.6 + ports as f64 / 100.0).min(SCAN_CONFIDENCE_CAP);
            return ThreatVerdict::threat(
                packet.src_ip,
                ThreatCategory::PortScan,
                confidence,
                Some(scan_pattern(packet.flags)),
            )
            .with_detail("distinct_ports", ports as f64)
            .with_detail("distinct_destinations", flow.distinct_destinations() as f64)
            .with_detail("scan_rate", pps)
            .with_detail("threshold", t.portscan_ports as f64)
            .decided_by(VerdictSource::Rules);
        }

        let failed = flow.failed_connections;
        if failed > t.bruteforce_failures {
            let confidence = (0.5 + failed as f64 / 20.0).min(BRUTEFORCE_CONFIDENCE_CAP);
            return ThreatVerdict::threat(
                packet.src_ip,
                ThreatCategory::BruteForce,
                confidence,
                Some(bruteforce_pattern(packet.dst_port)),
            )
            .with_detail("failed_connections", failed as f64)
            .with_detail("dst_port", f64::from(packet.dst_port))
            .with_detail("threshold", t.bruteforce_failures as f64)
            .decided_by(VerdictSource::Rules);
        }

        ThreatVerdict::normal(packet.src_ip, NORMAL_CONFIDENCE)
            .with_detail("packets_per_second", pps)
            .with_detail("distinct_ports", ports as f64)
    }
}

fn ddos_pattern(packet: &PacketRecord, flow: &FlowState) -> AttackPattern {
    let pattern = match packet.protocol {
        Protocol::Udp => DdosPattern::UdpFlood,
        Protocol::Icmp => DdosPattern::IcmpFlood,
        Protocol::Tcp
            if packet.flags.contains(TcpFlags::SYN) && flow.syn_count > SYN_FLOOD_MIN_SYN =>
        {
            DdosPattern::SynFlood
        }
        Protocol::Tcp => DdosPattern::HttpFlood,
    };
    AttackPattern::Ddos(pattern)
}

fn scan_pattern(flags: TcpFlags) -> AttackPattern {
    let pattern = if flags.is_syn_without_ack() {
        ScanPattern::TcpSynScan
    } else if flags.contains(TcpFlags::FIN) {
        ScanPattern::TcpFinScan
    } else if flags.is_empty() {
        ScanPattern::NullScan
    } else {
        ScanPattern::XmasScan
    };
    AttackPattern::Scan(pattern)
}

fn bruteforce_pattern(dst_port: u16) -> AttackPattern {
    let pattern = match dst_port {
        22 => BruteForcePattern::Ssh,
        21 => BruteForcePattern::Ftp,
        _ => BruteForcePattern::HttpAuth,
    };
    AttackPattern::BruteForce(pattern)
}
