//! 시퀀스 분류: 출발지별 최근 패킷 버퍼와 기본 분류기

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use ironwall_core::clock::elapsed_between;
use ironwall_core::pipeline::{ClassDistribution, SequenceClassifier};
use ironwall_core::types::PacketRecord;

/// 항상 정상 확률 1을 반환하는 기본 분류기
///
/// 학습된 모델이 주입되지 않았을 때 사용합니다. 정상 예측은 탐지 엔진에서
/// 기권으로 처리되므로 룰 엔진 판정을 뒤집지 않습니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineClassifier;

impl SequenceClassifier for BaselineClassifier {
    fn name(&self) -> &str {
        "baseline"
    }

    fn score(&self, packets: &[PacketRecord]) -> Option<ClassDistribution> {
        if packets.is_empty() {
            return None;
        }
        Some(ClassDistribution::certain_normal())
    }
}

/// 출발지별 최근 패킷 버퍼
///
/// 각 버퍼는 가장 최근 패킷 기준 분석 윈도우 안의 패킷만, 최대 `max_len`개까지
/// 보관합니다. 삽입할 때마다 정리합니다.
pub struct SequenceBuffers {
    buffers: Mutex<HashMap<IpAddr, VecDeque<PacketRecord>>>,
    window: Duration,
    max_len: usize,
}

impl SequenceBuffers {
    /// 새 버퍼 집합을 생성합니다.
    pub fn new(window: Duration, max_len: usize) -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            window,
            max_len: max_len.max(1),
        }
    }

    /// 패킷을 추가하고 오래된 패킷을 정리합니다. 정리 후 버퍼 길이를 반환합니다.
    pub fn push(&self, packet: &PacketRecord) -> usize {
        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(packet.src_ip).or_default();
        buffer.push_back(*packet);

        let newest = buffer
            .iter()
            .map(|p| p.timestamp)
            .max()
            .unwrap_or(packet.timestamp);
        while buffer
            .front()
            .is_some_and(|p| elapsed_between(p.timestamp, newest) > self.window)
        {
            buffer.pop_front();
        }
        while buffer.len() > self.max_len {
            buffer.pop_front();
        }
        buffer.len()
    }

    /// 출발지의 버퍼 복사본 (오래된 순)
    pub fn recent(&self, source: &IpAddr) -> Vec<PacketRecord> {
        self.buffers
            .lock()
            .get(source)
            .map(|buffer| buffer.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 가장 최근 패킷이 `now - max_age`보다 오래된 버퍼를 제거합니다.
    pub fn evict_stale(&self, now: SystemTime, max_age: Duration) -> usize {
        let mut buffers = self.buffers.lock();
        let before = buffers.len();
        buffers.retain(|_, buffer| {
            buffer
                .back()
                .is_some_and(|p| elapsed_between(p.timestamp, now) <= max_age)
        });
        before - buffers.len()
    }

    /// 버퍼를 가진 출발지 수
    pub fn sources(&self) -> usize {
        self.buffers.lock().len()
    }
}
