//! Ironwall 공통 코어
//!
//! 탐지기, 패킷 필터, 컨트롤러가 공유하는 도메인 타입, 에러, 설정,
//! 확장 trait, 시간 소스, 메트릭 이름을 제공합니다.

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, FilterBackendError, IronwallError, PipelineError};

// 설정
pub use config::IronwallConfig;

// 시간
pub use clock::{Clock, ManualClock, SystemClock};

// 파이프라인 trait
pub use pipeline::{ClassDistribution, HealthStatus, SequenceClassifier};

// 도메인 타입
pub use types::{
    AttackPattern, BruteForcePattern, DdosPattern, PacketRecord, Protocol, ScanPattern, Severity,
    TcpFlags, ThreatCategory, ThreatVerdict, VerdictSource,
};
