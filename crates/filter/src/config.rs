//! 패킷 필터 설정
//!
//! [`PacketFilterConfig`]는 core의 [`FilterConfig`]를 검증된 타입 값으로 변환한
//! 필터 전용 설정입니다. 문자열 주소와 초 단위 정수는 여기서 한 번만 해석합니다.
//!
//! # 사용 예시
//! ```ignore
//! use ironwall_core::config::IronwallConfig;
//! use ironwall_filter::config::PacketFilterConfig;
//!
//! let core_config = IronwallConfig::default();
//! let config = PacketFilterConfig::from_core(&core_config.filter)?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ironwall_core::config::FilterConfig;

use crate::error::FilterError;

/// 백엔드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// iptables / ip6tables 하위 프로세스
    Iptables,
    /// 외부 시스템을 건드리지 않는 시뮬레이션
    Simulated,
}

impl FromStr for BackendKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iptables" => Ok(Self::Iptables),
            "simulated" => Ok(Self::Simulated),
            other => Err(FilterError::Config {
                field: "backend".to_owned(),
                reason: format!("unknown backend '{other}'"),
            }),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iptables => write!(f, "iptables"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// 패킷 필터 설정
#[derive(Debug, Clone)]
pub struct PacketFilterConfig {
    /// 백엔드 종류
    pub backend: BackendKind,
    /// iptables 실행 파일
    pub iptables_path: String,
    /// ip6tables 실행 파일
    pub ip6tables_path: String,
    /// 차단 룰 전용 체인
    pub chain: String,
    /// 전용 체인으로 점프하는 상위 체인
    pub parent_chain: String,
    /// 차단 유지 시간
    pub block_duration: Duration,
    /// 백엔드 호출 타임아웃
    pub backend_timeout: Duration,
    /// 최대 차단 항목 수
    pub max_blocked_entries: usize,
    /// 차단하지 않는 주소
    pub whitelist: HashSet<IpAddr>,
}

impl Default for PacketFilterConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Iptables,
            iptables_path: "iptables".to_owned(),
            ip6tables_path: "ip6tables".to_owned(),
            chain: "IRONWALL".to_owned(),
            parent_chain: "INPUT".to_owned(),
            block_duration: Duration::from_secs(3600),
            backend_timeout: Duration::from_secs(2),
            max_blocked_entries: 10_000,
            whitelist: [
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl PacketFilterConfig {
    /// core의 `FilterConfig`에서 필터 설정을 생성합니다. 잘못된 값은 즉시 거부합니다.
    pub fn from_core(core: &FilterConfig) -> Result<Self, FilterError> {
        core.validate()?;
        Ok(Self {
            backend: core.backend.parse()?,
            iptables_path: core.iptables_path.clone(),
            ip6tables_path: core.ip6tables_path.clone(),
            chain: core.chain.clone(),
            parent_chain: core.parent_chain.clone(),
            block_duration: core.block_duration(),
            backend_timeout: core.backend_timeout(),
            max_blocked_entries: core.max_blocked_entries,
            whitelist: core.whitelist_addrs()?.into_iter().collect(),
        })
    }

    /// 시뮬레이션 백엔드 설정 (테스트, 재생용)
    pub fn simulated() -> Self {
        Self {
            backend: BackendKind::Simulated,
            ..Self::default()
        }
    }

    /// 화이트리스트를 지정합니다.
    pub fn with_whitelist(mut self, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        self.whitelist = addrs.into_iter().collect();
        self
    }

    /// 최대 차단 항목 수를 지정합니다.
    pub fn with_max_blocked_entries(mut self, max: usize) -> Self {
        self.max_blocked_entries = max;
        self
    }

    /// 백엔드 타임아웃을 지정합니다.
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.block_duration.is_zero() {
            return Err(FilterError::Config {
                field: "block_duration".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.backend_timeout.is_zero() {
            return Err(FilterError::Config {
                field: "backend_timeout".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.max_blocked_entries == 0 {
            return Err(FilterError::Config {
                field: "max_blocked_entries".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.backend == BackendKind::Iptables && self.chain.is_empty() {
            return Err(FilterError::Config {
                field: "chain".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}
