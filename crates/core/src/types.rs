//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 패킷 레코드, 위협 판정, 공격 패턴 등 모든 크레이트가 공유하는
//! 데이터 구조를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// =============================================================================
// 패킷 레코드
// =============================================================================

/// 전송 계층 프로토콜
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP (6)
    Tcp,
    /// UDP (17)
    Udp,
    /// ICMP (1)
    Icmp,
}

impl Protocol {
    /// 메트릭 레이블용 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
        }
    }

    /// 포트 번호를 사용하는 프로토콜인지 여부
    pub fn uses_ports(&self) -> bool {
        matches!(self, Self::Tcp | Self::Udp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
            Self::Icmp => write!(f, "ICMP"),
        }
    }
}

/// TCP 제어 플래그 집합
///
/// 비트 값은 TCP 헤더의 플래그 바이트와 동일합니다.
/// 문자열 표현은 `"SYN,ACK"` 처럼 쉼표/공백/`|`로 구분된 플래그 이름입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TcpFlags(u8);

impl TcpFlags {
    /// FIN
    pub const FIN: Self = Self(0x01);
    /// SYN
    pub const SYN: Self = Self(0x02);
    /// RST
    pub const RST: Self = Self(0x04);
    /// PSH
    pub const PSH: Self = Self(0x08);
    /// ACK
    pub const ACK: Self = Self(0x10);
    /// URG
    pub const URG: Self = Self(0x20);

    const NAMED: [(&'static str, Self); 6] = [
        ("SYN", Self::SYN),
        ("ACK", Self::ACK),
        ("FIN", Self::FIN),
        ("RST", Self::RST),
        ("PSH", Self::PSH),
        ("URG", Self::URG),
    ];

    // 한 글자 약식 표기 ("SA" = SYN|ACK)
    const LETTERS: [(char, Self); 6] = [
        ('S', Self::SYN),
        ('A', Self::ACK),
        ('F', Self::FIN),
        ('R', Self::RST),
        ('P', Self::PSH),
        ('U', Self::URG),
    ];

    fn from_letters(token: &str) -> Option<Self> {
        token.chars().try_fold(Self::empty(), |flags, c| {
            Self::LETTERS
                .iter()
                .find(|(letter, _)| *letter == c)
                .map(|(_, flag)| flags | *flag)
        })
    }

    /// 플래그가 하나도 설정되지 않은 집합
    pub const fn empty() -> Self {
        Self(0)
    }

    /// 원시 비트 값에서 생성합니다. 알 수 없는 비트는 무시합니다.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & 0x3f)
    }

    /// 원시 비트 값
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// `other`의 모든 플래그가 설정되어 있는지 확인합니다.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// 설정된 플래그가 없는지 확인합니다.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// SYN만 설정된 패킷인지 (연결 개시 시도) 확인합니다.
    pub const fn is_syn_only(&self) -> bool {
        self.0 == Self::SYN.0
    }

    /// SYN은 있고 ACK는 없는지 확인합니다.
    pub const fn is_syn_without_ack(&self) -> bool {
        self.contains(Self::SYN) && !self.contains(Self::ACK)
    }
}

impl std::ops::BitOr for TcpFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect();
        write!(f, "{}", names.join(","))
    }
}

/// 플래그 문자열 파싱 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tcp flag: {0}")]
pub struct UnknownFlag(pub String);

impl FromStr for TcpFlags {
    type Err = UnknownFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = Self::empty();
        for token in s
            .split(|c: char| c == ',' || c == '|' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let upper = token.to_ascii_uppercase();
            let flag = Self::NAMED
                .iter()
                .find(|(name, _)| *name == upper)
                .map(|(_, flag)| *flag)
                .or_else(|| Self::from_letters(token))
                .ok_or_else(|| UnknownFlag(token.to_owned()))?;
            flags = flags | flag;
        }
        Ok(flags)
    }
}

impl TryFrom<String> for TcpFlags {
    type Error = UnknownFlag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TcpFlags> for String {
    fn from(flags: TcpFlags) -> Self {
        flags.to_string()
    }
}

/// 패킷 특징 레코드
///
/// 외부 캡처/시뮬레이션 계층이 추출한 패킷 한 개의 메타데이터입니다.
/// 코어는 이 값을 읽기만 합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// 캡처 시각
    pub timestamp: SystemTime,
    /// 출발지 주소
    pub src_ip: IpAddr,
    /// 목적지 주소
    pub dst_ip: IpAddr,
    /// 출발지 포트 (ICMP는 0)
    #[serde(default)]
    pub src_port: u16,
    /// 목적지 포트 (ICMP는 0)
    #[serde(default)]
    pub dst_port: u16,
    /// 프로토콜
    pub protocol: Protocol,
    /// 전체 크기 (바이트)
    pub size: u32,
    /// TCP 제어 플래그
    #[serde(default)]
    pub flags: TcpFlags,
    /// 페이로드 크기 (바이트)
    #[serde(default)]
    pub payload_size: u32,
}

/// 잘못된 패킷 레코드 사유
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPacket {
    /// 출발지 주소가 지정되지 않음 (0.0.0.0, ::)
    #[error("unspecified source address")]
    UnspecifiedSource,
    /// TCP/UDP인데 목적지 포트가 0
    #[error("invalid destination port 0 for {0}")]
    ZeroPort(Protocol),
}

impl PacketRecord {
    /// 레코드가 분석 가능한지 검증합니다.
    pub fn validate(&self) -> Result<(), InvalidPacket> {
        if self.src_ip.is_unspecified() {
            return Err(InvalidPacket::UnspecifiedSource);
        }
        if self.protocol.uses_ports() && self.dst_port == 0 {
            return Err(InvalidPacket::ZeroPort(self.protocol));
        }
        Ok(())
    }
}

impl fmt::Display for PacketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} proto={} size={} flags=[{}]",
            self.src_ip,
            self.src_port,
            self.dst_ip,
            self.dst_port,
            self.protocol,
            self.size,
            self.flags,
        )
    }
}

// =============================================================================
// 위협 분류
// =============================================================================

/// 위협 카테고리
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatCategory {
    /// 정상 트래픽
    #[default]
    Normal,
    /// 분산 서비스 거부
    #[serde(rename = "DDoS")]
    Ddos,
    /// 포트 스캔
    PortScan,
    /// 무차별 대입
    BruteForce,
}

impl ThreatCategory {
    /// 모든 카테고리 (분포 순서와 동일)
    pub const ALL: [Self; 4] = [Self::Normal, Self::Ddos, Self::PortScan, Self::BruteForce];

    /// 카테고리별 심각도
    pub fn severity(&self) -> Severity {
        match self {
            Self::Normal => Severity::Info,
            Self::PortScan => Severity::Medium,
            Self::BruteForce => Severity::High,
            Self::Ddos => Severity::Critical,
        }
    }

    /// 메트릭 레이블용 고정 이름
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Ddos => "ddos",
            Self::PortScan => "port_scan",
            Self::BruteForce => "brute_force",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Ddos => write!(f, "DDoS"),
            Self::PortScan => write!(f, "PortScan"),
            Self::BruteForce => write!(f, "BruteForce"),
        }
    }
}

/// DDoS 공격 패턴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdosPattern {
    SynFlood,
    UdpFlood,
    IcmpFlood,
    HttpFlood,
}

/// 포트 스캔 패턴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPattern {
    TcpSynScan,
    TcpFinScan,
    NullScan,
    XmasScan,
}

/// 무차별 대입 패턴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BruteForcePattern {
    Ssh,
    Ftp,
    HttpAuth,
}

/// 공격 패턴 태그
///
/// 카테고리별 닫힌 열거형으로 구성되어 패턴 판정 분기가 완전한지
/// 컴파일러가 검사할 수 있습니다. 직렬화 시 `SYN_FLOOD` 같은 태그 문자열을 씁니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AttackPattern {
    Ddos(DdosPattern),
    Scan(ScanPattern),
    BruteForce(BruteForcePattern),
}

impl AttackPattern {
    const TAGS: [(&'static str, Self); 11] = [
        ("SYN_FLOOD", Self::Ddos(DdosPattern::SynFlood)),
        ("UDP_FLOOD", Self::Ddos(DdosPattern::UdpFlood)),
        ("ICMP_FLOOD", Self::Ddos(DdosPattern::IcmpFlood)),
        ("HTTP_FLOOD", Self::Ddos(DdosPattern::HttpFlood)),
        ("TCP_SYN_SCAN", Self::Scan(ScanPattern::TcpSynScan)),
        ("TCP_FIN_SCAN", Self::Scan(ScanPattern::TcpFinScan)),
        ("NULL_SCAN", Self::Scan(ScanPattern::NullScan)),
        ("XMAS_SCAN", Self::Scan(ScanPattern::XmasScan)),
        ("SSH_BRUTEFORCE", Self::BruteForce(BruteForcePattern::Ssh)),
        ("FTP_BRUTEFORCE", Self::BruteForce(BruteForcePattern::Ftp)),
        (
            "HTTP_AUTH_BRUTEFORCE",
            Self::BruteForce(BruteForcePattern::HttpAuth),
        ),
    ];

    /// 태그 문자열 (예: `SYN_FLOOD`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ddos(DdosPattern::SynFlood) => "SYN_FLOOD",
            Self::Ddos(DdosPattern::UdpFlood) => "UDP_FLOOD",
            Self::Ddos(DdosPattern::IcmpFlood) => "ICMP_FLOOD",
            Self::Ddos(DdosPattern::HttpFlood) => "HTTP_FLOOD",
            Self::Scan(ScanPattern::TcpSynScan) => "TCP_SYN_SCAN",
            Self::Scan(ScanPattern::TcpFinScan) => "TCP_FIN_SCAN",
            Self::Scan(ScanPattern::NullScan) => "NULL_SCAN",
            Self::Scan(ScanPattern::XmasScan) => "XMAS_SCAN",
            Self::BruteForce(BruteForcePattern::Ssh) => "SSH_BRUTEFORCE",
            Self::BruteForce(BruteForcePattern::Ftp) => "FTP_BRUTEFORCE",
            Self::BruteForce(BruteForcePattern::HttpAuth) => "HTTP_AUTH_BRUTEFORCE",
        }
    }

    /// 패턴이 속한 카테고리
    pub fn category(&self) -> ThreatCategory {
        match self {
            Self::Ddos(_) => ThreatCategory::Ddos,
            Self::Scan(_) => ThreatCategory::PortScan,
            Self::BruteForce(_) => ThreatCategory::BruteForce,
        }
    }
}

impl fmt::Display for AttackPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 알 수 없는 공격 패턴 태그
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown attack pattern: {0}")]
pub struct UnknownPattern(pub String);

impl FromStr for AttackPattern {
    type Err = UnknownPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::TAGS
            .iter()
            .find(|(tag, _)| *tag == s)
            .map(|(_, pattern)| *pattern)
            .ok_or_else(|| UnknownPattern(s.to_owned()))
    }
}

impl TryFrom<String> for AttackPattern {
    type Error = UnknownPattern;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttackPattern> for String {
    fn from(pattern: AttackPattern) -> Self {
        pattern.as_str().to_owned()
    }
}

/// 판정을 내린 탐지기
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictSource {
    /// 임계값 기반 룰 엔진
    #[default]
    Rules,
    /// 시퀀스 분류기
    Classifier,
}

/// 패킷 한 개에 대한 위협 판정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatVerdict {
    /// 위협 여부
    pub is_threat: bool,
    /// 카테고리
    pub category: ThreatCategory,
    /// 신뢰도 (0.0~1.0)
    pub confidence: f64,
    /// 공격 패턴 (있을 경우)
    pub pattern: Option<AttackPattern>,
    /// 출발지 주소
    pub source: IpAddr,
    /// 수치 근거 (관측 pps, 포트 수 등)
    pub details: BTreeMap<String, f64>,
    /// 판정 출처
    pub decided_by: VerdictSource,
}

impl ThreatVerdict {
    /// 정상 판정을 생성합니다.
    pub fn normal(source: IpAddr, confidence: f64) -> Self {
        Self {
            is_threat: false,
            category: ThreatCategory::Normal,
            confidence: confidence.clamp(0.0, 1.0),
            pattern: None,
            source,
            details: BTreeMap::new(),
            decided_by: VerdictSource::Rules,
        }
    }

    /// 위협 판정을 생성합니다. `Normal` 카테고리는 위협으로 취급하지 않습니다.
    pub fn threat(
        source: IpAddr,
        category: ThreatCategory,
        confidence: f64,
        pattern: Option<AttackPattern>,
    ) -> Self {
        Self {
            is_threat: category != ThreatCategory::Normal,
            category,
            confidence: confidence.clamp(0.0, 1.0),
            pattern,
            source,
            details: BTreeMap::new(),
            decided_by: VerdictSource::Rules,
        }
    }

    /// 근거 항목을 추가합니다.
    pub fn with_detail(mut self, key: impl Into<String>, value: f64) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    /// 판정 출처를 지정합니다.
    pub fn decided_by(mut self, source: VerdictSource) -> Self {
        self.decided_by = source;
        self
    }

    /// 차단 사유 문자열 (`"DDoS: UDP_FLOOD"`)
    pub fn reason(&self) -> String {
        match self.pattern {
            Some(pattern) => format!("{}: {}", self.category, pattern),
            None => format!("{}: UNSPECIFIED", self.category),
        }
    }
}

impl fmt::Display for ThreatVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} from {} (confidence {:.2})",
            self.category.severity(),
            self.pattern
                .map(|p| p.as_str())
                .unwrap_or(if self.is_threat { "UNSPECIFIED" } else { "-" }),
            self.source,
            self.confidence,
        )
    }
}

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 정보성 이벤트
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적: 즉시 대응 필요
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}
