//! 흐름 추적: 출발지별 트래픽 통계
//!
//! [`FlowTracker`]는 출발지 주소마다 하나의 [`FlowState`]를 유지합니다.
//! `update`는 살아 있는 상태의 공유 핸들을 돌려주므로 호출자는 복사본이 아니라
//! 현재 통계를 봅니다.
//!
//! # 락 순서
//! 흐름 맵 락 → 개별 흐름 락. 역순으로 잡지 않습니다.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use ironwall_core::clock::{Clock, elapsed_between};
use ironwall_core::metrics as m;
use ironwall_core::types::{PacketRecord, TcpFlags};

/// 출발지 하나의 누적 통계
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowState {
    /// 첫 패킷 시각
    pub first_seen: SystemTime,
    /// 마지막 패킷 시각 (항상 `first_seen` 이상)
    pub last_seen: SystemTime,
    /// 패킷 수
    pub packet_count: u64,
    /// 바이트 수
    pub byte_count: u64,
    /// 고유 목적지 포트
    pub dst_ports: HashSet<u16>,
    /// 고유 목적지 주소
    pub dst_addrs: HashSet<IpAddr>,
    /// SYN은 있고 ACK는 없는 패킷 수
    pub syn_count: u64,
    /// 실패한 연결 수 (RST 수신 기준)
    pub failed_connections: u64,
}

impl FlowState {
    fn new(at: SystemTime) -> Self {
        Self {
            first_seen: at,
            last_seen: at,
            packet_count: 0,
            byte_count: 0,
            dst_ports: HashSet::new(),
            dst_addrs: HashSet::new(),
            syn_count: 0,
            failed_connections: 0,
        }
    }

    fn record(&mut self, packet: &PacketRecord) {
        // 순서가 뒤바뀐 패킷이 와도 last_seen은 뒤로 가지 않는다
        if packet.timestamp > self.last_seen {
            self.last_seen = packet.timestamp;
        }
        self.packet_count = self.packet_count.saturating_add(1);
        self.byte_count = self.byte_count.saturating_add(u64::from(packet.size));
        if packet.protocol.uses_ports() {
            self.dst_ports.insert(packet.dst_port);
        }
        self.dst_addrs.insert(packet.dst_ip);
        if packet.flags.is_syn_without_ack() {
            self.syn_count = self.syn_count.saturating_add(1);
        }
        if packet.flags.contains(TcpFlags::RST) {
            self.failed_connections = self.failed_connections.saturating_add(1);
        }
    }

    /// 관측 구간 (`last_seen - first_seen`)
    pub fn duration(&self) -> Duration {
        elapsed_between(self.first_seen, self.last_seen)
    }

    fn per_second(&self, total: u64) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            total as f64 / secs
        } else {
            total as f64
        }
    }

    /// 초당 패킷 수
    ///
    /// 관측 구간이 0이면 패킷 수 그대로를 반환하므로 항상 유한한 0 이상의 값입니다.
    pub fn packets_per_second(&self) -> f64 {
        self.per_second(self.packet_count)
    }

    /// 초당 바이트 수
    pub fn bytes_per_second(&self) -> f64 {
        self.per_second(self.byte_count)
    }

    /// 고유 목적지 포트 수
    pub fn distinct_ports(&self) -> usize {
        self.dst_ports.len()
    }

    /// 고유 목적지 주소 수
    pub fn distinct_destinations(&self) -> usize {
        self.dst_addrs.len()
    }
}

/// 살아 있는 흐름 상태의 공유 핸들
pub type SharedFlow = Arc<Mutex<FlowState>>;

/// 출발지별 흐름 추적기
pub struct FlowTracker {
    flows: Mutex<HashMap<IpAddr, SharedFlow>>,
    clock: Arc<dyn Clock>,
}

impl FlowTracker {
    /// 새 흐름 추적기를 생성합니다. 만료 판단은 `clock` 기준입니다.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            flows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// 패킷을 반영하고 해당 출발지의 흐름 핸들을 반환합니다.
    pub fn update(&self, packet: &PacketRecord) -> SharedFlow {
        let flow = {
            let mut flows = self.flows.lock();
            let before = flows.len();
            let flow = Arc::clone(
                flows
                    .entry(packet.src_ip)
                    .or_insert_with(|| Arc::new(Mutex::new(FlowState::new(packet.timestamp)))),
            );
            if flows.len() != before {
                metrics::gauge!(m::DETECTOR_ACTIVE_FLOWS).set(flows.len() as f64);
            }
            flow
        };
        flow.lock().record(packet);
        flow
    }

    /// 출발지의 흐름 핸들
    pub fn get(&self, source: &IpAddr) -> Option<SharedFlow> {
        self.flows.lock().get(source).cloned()
    }

    /// 출발지 흐름의 복사본
    pub fn snapshot(&self, source: &IpAddr) -> Option<FlowState> {
        self.get(source).map(|flow| flow.lock().clone())
    }

    /// 마지막 패킷 이후 `max_age`보다 오래된 흐름을 제거합니다.
    ///
    /// 제거한 흐름 수를 반환합니다.
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let mut flows = self.flows.lock();
        let before = flows.len();
        flows.retain(|_, flow| elapsed_between(flow.lock().last_seen, now) <= max_age);
        let evicted = before - flows.len();

        if evicted > 0 {
            debug!(evicted, remaining = flows.len(), "evicted idle flows");
            metrics::counter!(m::DETECTOR_FLOWS_EVICTED_TOTAL).increment(evicted as u64);
        }
        metrics::gauge!(m::DETECTOR_ACTIVE_FLOWS).set(flows.len() as f64);
        evicted
    }

    /// 추적 중인 흐름 수
    pub fn len(&self) -> usize {
        self.flows.lock().len()
    }

    /// 추적 중인 흐름이 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.flows.lock().is_empty()
    }
}
