//! 시간 소스 추상화
//!
//! 흐름 만료와 차단 만료는 모두 [`Clock`]에서 읽은 현재 시각을 기준으로 합니다.
//! 운영 환경은 [`SystemClock`], 재생(replay)과 테스트는 [`ManualClock`]을 사용합니다.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

/// 현재 시각을 제공하는 trait
pub trait Clock: Send + Sync {
    /// 현재 시각
    fn now(&self) -> SystemTime;
}

/// 시스템 벽시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// 수동으로 진행시키는 시계
///
/// 클론은 같은 시각을 공유합니다.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    /// 주어진 시각에서 시작하는 시계를 생성합니다.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// 시계를 `by`만큼 진행합니다.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// 시계를 특정 시각으로 설정합니다.
    pub fn set(&self, at: SystemTime) {
        *self.now.lock() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

/// `later - earlier`를 계산합니다. 음수면 0을 반환합니다.
pub fn elapsed_between(earlier: SystemTime, later: SystemTime) -> Duration {
    later.duration_since(earlier).unwrap_or(Duration::ZERO)
}
