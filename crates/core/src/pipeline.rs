//! 파이프라인 trait: 모듈 확장 포인트 정의

use std::fmt;

use serde::Serialize;

use crate::types::{PacketRecord, ThreatCategory};

/// 카테고리별 확률 분포
///
/// 필드 순서는 [`ThreatCategory::ALL`]과 같습니다.
/// [`ClassDistribution::new`]는 합이 1이 되도록 정규화합니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassDistribution {
    /// 정상
    pub normal: f64,
    /// DDoS
    pub ddos: f64,
    /// 포트 스캔
    pub port_scan: f64,
    /// 무차별 대입
    pub brute_force: f64,
}

impl ClassDistribution {
    /// 가중치로부터 정규화된 분포를 생성합니다.
    ///
    /// 음수이거나 유한하지 않은 값은 0으로 취급합니다.
    /// 모든 가중치가 0이면 `None`을 반환합니다.
    pub fn new(normal: f64, ddos: f64, port_scan: f64, brute_force: f64) -> Option<Self> {
        let clean = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        let (n, d, p, b) = (clean(normal), clean(ddos), clean(port_scan), clean(brute_force));
        let total = n + d + p + b;
        if total <= 0.0 {
            return None;
        }
        Some(Self {
            normal: n / total,
            ddos: d / total,
            port_scan: p / total,
            brute_force: b / total,
        })
    }

    /// 정상 확률 1인 분포
    pub fn certain_normal() -> Self {
        Self {
            normal: 1.0,
            ddos: 0.0,
            port_scan: 0.0,
            brute_force: 0.0,
        }
    }

    /// 카테고리의 확률
    pub fn probability(&self, category: ThreatCategory) -> f64 {
        match category {
            ThreatCategory::Normal => self.normal,
            ThreatCategory::Ddos => self.ddos,
            ThreatCategory::PortScan => self.port_scan,
            ThreatCategory::BruteForce => self.brute_force,
        }
    }

    /// 가장 확률이 높은 카테고리와 그 확률
    ///
    /// 동률이면 [`ThreatCategory::ALL`] 순서상 앞선 카테고리(정상 우선)를 택합니다.
    pub fn most_likely(&self) -> (ThreatCategory, f64) {
        let mut best = (ThreatCategory::Normal, self.normal);
        for category in &ThreatCategory::ALL[1..] {
            let p = self.probability(*category);
            if p > best.1 {
                best = (*category, p);
            }
        }
        best
    }
}

/// 최근 패킷 시퀀스를 점수화하는 보조 탐지기
///
/// 통계 모델이나 학습 모델을 붙이려면 이 trait을 구현합니다.
/// 탐지 엔진은 특정 알고리즘에 의존하지 않고 이 인터페이스만 사용합니다.
pub trait SequenceClassifier: Send + Sync {
    /// 분류기 이름
    fn name(&self) -> &str;

    /// 출발지 하나의 최근 패킷(시간순)을 점수화합니다.
    ///
    /// 판단할 데이터가 부족하면 `None`을 반환합니다.
    fn score(&self, packets: &[PacketRecord]) -> Option<ClassDistribution>;
}

/// 컴포넌트 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작하지만 기능 저하
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}
