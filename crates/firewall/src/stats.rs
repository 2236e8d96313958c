//! 컨트롤러 통계

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use serde::Serialize;

use ironwall_filter::FilterMode;

/// 컨트롤러 통계 스냅샷
///
/// 카운터는 컨트롤러를 재시작할 때만 0으로 돌아갑니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirewallStats {
    /// 실행 중 여부
    pub running: bool,
    /// 마지막 시작 시각
    pub started_at: Option<SystemTime>,
    /// 시작 후 경과 시간 (초)
    pub uptime_secs: u64,
    /// 분석한 패킷 수
    pub packets_analyzed: u64,
    /// 잘못된 레코드로 거부한 패킷 수
    pub packets_rejected: u64,
    /// 위협 판정 수
    pub threats_detected: u64,
    /// 새로 차단한 위협 수
    pub threats_blocked: u64,
    /// 실행한 정리 횟수
    pub sweeps: u64,
    /// 추적 중인 흐름 수
    pub active_flows: usize,
    /// 현재 차단 중인 주소 수
    pub blocked_count: usize,
    /// 필터 동작 모드
    pub filter_mode: FilterMode,
}

/// 정리 1회 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// 제거한 유휴 흐름 수
    pub flows_evicted: usize,
    /// 만료되어 해제한 차단 수
    pub blocks_expired: usize,
}

/// 원자적 카운터 묶음
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) packets_analyzed: AtomicU64,
    pub(crate) packets_rejected: AtomicU64,
    pub(crate) threats_detected: AtomicU64,
    pub(crate) threats_blocked: AtomicU64,
    pub(crate) sweeps: AtomicU64,
}

impl Counters {
    pub(crate) fn reset(&self) {
        self.packets_analyzed.store(0, Ordering::Relaxed);
        self.packets_rejected.store(0, Ordering::Relaxed);
        self.threats_detected.store(0, Ordering::Relaxed);
        self.threats_blocked.store(0, Ordering::Relaxed);
        self.sweeps.store(0, Ordering::Relaxed);
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
