//! 에러 타입: 도메인별 에러 정의

/// Ironwall 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum IronwallError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 패킷 필터 백엔드 에러
    #[error("filter error: {0}")]
    Filter(#[from] FilterBackendError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("not running")]
    NotRunning,
}

/// 패킷 필터 백엔드 에러 (상위 레이어 전파용 요약)
#[derive(Debug, thiserror::Error)]
pub enum FilterBackendError {
    /// 백엔드 사용 불가 (권한 부족, 도구 없음)
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// 룰 적용 실패
    #[error("rule operation failed for {address}: {reason}")]
    RuleFailed { address: String, reason: String },
}
