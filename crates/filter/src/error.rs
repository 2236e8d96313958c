//! 패킷 필터 에러 타입
//!
//! [`FilterError`]는 패킷 필터 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<FilterError> for IronwallError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use ironwall_core::error::{ConfigError, FilterBackendError, IronwallError};

/// 패킷 필터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// 백엔드 사용 불가 (실행 파일 없음, 권한 부족, 점검 실패)
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// 방화벽 명령 실패 (0이 아닌 종료 코드)
    #[error("{operation} failed for {address}: {reason}")]
    CommandFailed {
        /// 수행한 동작 (block, unblock, probe)
        operation: &'static str,
        /// 대상 주소
        address: String,
        /// 실패 사유
        reason: String,
    },

    /// 백엔드 호출 타임아웃
    #[error("{operation} timed out for {address}")]
    Timeout {
        /// 수행한 동작
        operation: &'static str,
        /// 대상 주소
        address: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl FilterError {
    /// 백엔드를 더 이상 쓸 수 없다는 뜻의 에러인지 여부
    ///
    /// 이 경우 필터는 시뮬레이션 모드로 전환합니다. 나머지는 일시적 실패입니다.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

impl From<FilterError> for IronwallError {
    fn from(err: FilterError) -> Self {
        let message = err.to_string();
        match err {
            FilterError::BackendUnavailable(msg) => {
                IronwallError::Filter(FilterBackendError::Unavailable(msg))
            }
            FilterError::CommandFailed { address, .. } | FilterError::Timeout { address, .. } => {
                IronwallError::Filter(FilterBackendError::RuleFailed {
                    address,
                    reason: message,
                })
            }
            FilterError::Config { field, reason } => {
                IronwallError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}

impl From<ConfigError> for FilterError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue { field, reason } => Self::Config { field, reason },
            other => Self::Config {
                field: "filter".to_owned(),
                reason: other.to_string(),
            },
        }
    }
}
