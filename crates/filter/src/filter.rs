//! 차단 목록 관리
//!
//! [`PacketFilter`]는 현재 차단 중인 출발지 주소 집합을 보관하고, 변경 사항을
//! [`FilterBackend`]에 반영합니다. 주소당 [`BlockEntry`]는 최대 하나입니다.
//!
//! 백엔드 가용성은 주소 체계별로 관리합니다. 점검에 실패하거나 사용할 수 없게
//! 된 체계의 주소는 목록에만 기록됩니다. 모든 체계를 사용할 수 없으면
//! [`FilterMode::Simulated`]로 전환하며, 전환은 항상 `warn!` 로그와
//! `ironwall_filter_simulated_mode` 게이지로 드러납니다.
//!
//! 차단 목록 락은 백엔드 호출 전에 해제되며, 백엔드 호출은 타임아웃으로 감쌉니다.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use ironwall_core::clock::{Clock, elapsed_between};
use ironwall_core::metrics as m;

use crate::backend::{FilterBackend, IpFamily};
use crate::config::PacketFilterConfig;
use crate::error::FilterError;

/// 필터 동작 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// 백엔드에 실제 룰을 설치
    Enforcing,
    /// 차단 목록만 유지
    Simulated,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enforcing => write!(f, "enforcing"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// 차단 항목
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockEntry {
    /// 차단된 출발지 주소
    pub address: IpAddr,
    /// 차단 시각
    pub blocked_at: SystemTime,
    /// 차단 사유 (예: "DDoS: UDP_FLOOD")
    pub reason: String,
    /// 백엔드 룰이 실제로 설치되었는지 여부
    pub enforced: bool,
}

impl BlockEntry {
    /// 주어진 유지 시간 기준 만료 시각
    pub fn expires_at(&self, block_duration: Duration) -> SystemTime {
        self.blocked_at + block_duration
    }

    /// `now` 시점의 차단 경과 시간
    pub fn age(&self, now: SystemTime) -> Duration {
        elapsed_between(self.blocked_at, now)
    }
}

// 같은 주소의 해제 후 재차단을 구분하기 위한 세대 번호
struct Slot {
    entry: BlockEntry,
    generation: u64,
}

/// 출발지 차단 목록과 백엔드
pub struct PacketFilter<B: FilterBackend> {
    backend: Arc<B>,
    blocked: Mutex<HashMap<IpAddr, Slot>>,
    next_generation: AtomicU64,
    simulated: AtomicBool,
    disabled_families: Mutex<HashSet<IpFamily>>,
    clock: Arc<dyn Clock>,
    whitelist: HashSet<IpAddr>,
    max_entries: usize,
    backend_timeout: Duration,
    block_duration: Duration,
}

impl<B: FilterBackend> PacketFilter<B> {
    /// 백엔드를 점검하고 필터를 생성합니다.
    ///
    /// 주소 체계마다 점검하며, 실패는 에러가 아니라 해당 체계의 비활성화로
    /// 처리합니다. 모든 체계가 실패하면 시뮬레이션 모드로 시작합니다.
    ///
    /// # Errors
    /// 설정값이 유효하지 않으면 `FilterError::Config`
    pub async fn initialize(
        backend: Arc<B>,
        config: PacketFilterConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FilterError> {
        config.validate()?;

        let filter = Self {
            backend,
            blocked: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            simulated: AtomicBool::new(false),
            disabled_families: Mutex::new(HashSet::new()),
            clock,
            whitelist: config.whitelist,
            max_entries: config.max_blocked_entries,
            backend_timeout: config.backend_timeout,
            block_duration: config.block_duration,
        };

        if !filter.backend.installs_rules() {
            filter.simulated.store(true, Ordering::SeqCst);
            metrics::gauge!(m::FILTER_SIMULATED_MODE).set(1.0);
            info!(
                backend = filter.backend.name(),
                "packet filter running in simulated mode"
            );
            return Ok(filter);
        }

        for family in IpFamily::ALL {
            let probe = filter.backend.probe(family);
            if let Err(e) = filter.bounded("probe", None, probe).await {
                filter.disable_family(family, &e);
            }
        }
        if !filter.is_simulated() {
            metrics::gauge!(m::FILTER_SIMULATED_MODE).set(0.0);
            info!(
                backend = filter.backend.name(),
                disabled = ?filter.disabled_families(),
                "packet filter enforcing"
            );
        }
        Ok(filter)
    }

    /// 출발지 주소를 차단합니다.
    ///
    /// 이미 차단 중이거나 화이트리스트 주소이거나 목록이 가득 차면 `false`를
    /// 반환합니다. 백엔드 실패는 기록만 하고 항목은 유지합니다.
    /// 비활성화된 주소 체계의 주소는 백엔드를 호출하지 않고 목록에만 기록합니다.
    pub async fn block(&self, addr: IpAddr, reason: &str) -> bool {
        if self.whitelist.contains(&addr) {
            warn!(source = %addr, reason, "refusing to block whitelisted address");
            return false;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut blocked = self.blocked.lock();
            if blocked.contains_key(&addr) {
                return false;
            }
            if blocked.len() >= self.max_entries {
                warn!(
                    source = %addr,
                    capacity = self.max_entries,
                    "blocklist full, refusing to block"
                );
                return false;
            }
            blocked.insert(
                addr,
                Slot {
                    entry: BlockEntry {
                        address: addr,
                        blocked_at: self.clock.now(),
                        reason: reason.to_owned(),
                        enforced: false,
                    },
                    generation,
                },
            );
            metrics::gauge!(m::FILTER_BLOCKED_ADDRESSES).set(blocked.len() as f64);
        }
        metrics::counter!(m::FILTER_BLOCKS_TOTAL).increment(1);

        if self.is_simulated() {
            info!(source = %addr, reason, mode = %FilterMode::Simulated, "blocked source");
            return true;
        }
        let family = IpFamily::of(addr);
        if self.is_family_disabled(family) {
            info!(source = %addr, reason, %family, enforced = false, "blocked source");
            return true;
        }

        let install = self.backend.block(addr);
        match self.bounded("block", Some(addr), install).await {
            Ok(()) => {
                let still_listed = match self.blocked.lock().get_mut(&addr) {
                    Some(slot) if slot.generation == generation => {
                        slot.entry.enforced = true;
                        true
                    }
                    _ => false,
                };
                if still_listed {
                    info!(source = %addr, reason, mode = %FilterMode::Enforcing, "blocked source");
                } else {
                    // 백엔드 호출 중에 해제(또는 해제 후 재차단)되었으면 방금 설치한 룰을 되돌린다
                    let remove = self.backend.unblock(addr);
                    if let Err(e) = self.bounded("unblock", Some(addr), remove).await {
                        self.record_failure(family, &e);
                    }
                }
            }
            Err(e) => self.record_failure(family, &e),
        }
        true
    }

    /// 차단을 해제합니다. 차단 중이 아니면 `false`를 반환합니다.
    pub async fn unblock(&self, addr: IpAddr) -> bool {
        let removed = {
            let mut blocked = self.blocked.lock();
            let removed = blocked.remove(&addr);
            metrics::gauge!(m::FILTER_BLOCKED_ADDRESSES).set(blocked.len() as f64);
            removed
        };
        let Some(Slot { entry, .. }) = removed else {
            return false;
        };
        metrics::counter!(m::FILTER_UNBLOCKS_TOTAL).increment(1);

        if entry.enforced {
            let remove = self.backend.unblock(addr);
            if let Err(e) = self.bounded("unblock", Some(addr), remove).await {
                self.record_failure(IpFamily::of(addr), &e);
            }
        }
        info!(source = %addr, reason = %entry.reason, "unblocked source");
        true
    }

    /// `block_duration`보다 오래 차단된 항목을 해제합니다. 해제한 수를 반환합니다.
    ///
    /// 경과 시간이 정확히 `block_duration`인 항목은 유지됩니다.
    pub async fn sweep_expired(&self, block_duration: Duration) -> usize {
        let now = self.clock.now();
        let expired: Vec<IpAddr> = self
            .blocked
            .lock()
            .values()
            .filter(|slot| slot.entry.age(now) > block_duration)
            .map(|slot| slot.entry.address)
            .collect();

        let mut released = 0;
        for addr in expired {
            if self.unblock(addr).await {
                released += 1;
            }
        }
        if released > 0 {
            metrics::counter!(m::FILTER_EXPIRED_TOTAL).increment(released as u64);
            debug!(released, "expired blocks released");
        }
        released
    }

    /// 모든 차단을 해제합니다. 종료 시 설치한 룰을 정리하는 데 사용합니다.
    pub async fn release_all(&self) -> usize {
        let addrs: Vec<IpAddr> = self.blocked.lock().keys().copied().collect();
        let mut released = 0;
        for addr in addrs {
            if self.unblock(addr).await {
                released += 1;
            }
        }
        released
    }

    /// 차단 목록 (차단 시각, 주소 순)
    pub fn list_blocked(&self) -> Vec<BlockEntry> {
        let mut entries: Vec<BlockEntry> = self
            .blocked
            .lock()
            .values()
            .map(|slot| slot.entry.clone())
            .collect();
        entries.sort_by(|a, b| {
            a.blocked_at
                .cmp(&b.blocked_at)
                .then_with(|| a.address.cmp(&b.address))
        });
        entries
    }

    /// 주소가 차단 중인지 여부
    pub fn is_blocked(&self, addr: &IpAddr) -> bool {
        self.blocked.lock().contains_key(addr)
    }

    /// 현재 차단 중인 주소 수
    pub fn blocked_count(&self) -> usize {
        self.blocked.lock().len()
    }

    /// 현재 동작 모드
    pub fn mode(&self) -> FilterMode {
        if self.is_simulated() {
            FilterMode::Simulated
        } else {
            FilterMode::Enforcing
        }
    }

    /// 시뮬레이션 모드 여부
    pub fn is_simulated(&self) -> bool {
        self.simulated.load(Ordering::SeqCst)
    }

    /// 백엔드 룰을 설치하지 않는 주소 체계
    pub fn disabled_families(&self) -> Vec<IpFamily> {
        let disabled = self.disabled_families.lock();
        IpFamily::ALL
            .into_iter()
            .filter(|family| disabled.contains(family))
            .collect()
    }

    fn is_family_disabled(&self, family: IpFamily) -> bool {
        self.disabled_families.lock().contains(&family)
    }

    /// 백엔드 이름
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// 설정된 차단 유지 시간
    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }

    // ===== 내부 =====

    /// 백엔드 호출을 타임아웃으로 감쌉니다.
    async fn bounded<F>(
        &self,
        operation: &'static str,
        addr: Option<IpAddr>,
        call: F,
    ) -> Result<(), FilterError>
    where
        F: Future<Output = Result<(), FilterError>>,
    {
        match tokio::time::timeout(self.backend_timeout, call).await {
            Ok(result) => result,
            Err(_elapsed) => Err(FilterError::Timeout {
                operation,
                address: addr.map_or_else(|| "-".to_owned(), |a| a.to_string()),
            }),
        }
    }

    fn record_failure(&self, family: IpFamily, err: &FilterError) {
        if err.is_unavailable() {
            self.disable_family(family, err);
            return;
        }
        metrics::counter!(m::FILTER_BACKEND_FAILURES_TOTAL).increment(1);
        warn!(backend = self.backend.name(), error = %err, "filter backend call failed");
    }

    /// 한 주소 체계를 비활성화하고, 남은 체계가 없으면 시뮬레이션 모드로 전환합니다.
    fn disable_family(&self, family: IpFamily, err: &FilterError) {
        let all_disabled = {
            let mut disabled = self.disabled_families.lock();
            if disabled.insert(family) {
                warn!(
                    backend = self.backend.name(),
                    %family,
                    error = %err,
                    "filter backend unavailable for address family"
                );
            }
            disabled.len() == IpFamily::ALL.len()
        };
        if all_disabled {
            self.enter_simulated(err);
        } else {
            metrics::counter!(m::FILTER_BACKEND_FAILURES_TOTAL).increment(1);
        }
    }

    fn enter_simulated(&self, err: &FilterError) {
        metrics::counter!(m::FILTER_BACKEND_FAILURES_TOTAL).increment(1);
        if !self.simulated.swap(true, Ordering::SeqCst) {
            metrics::gauge!(m::FILTER_SIMULATED_MODE).set(1.0);
            warn!(
                backend = self.backend.name(),
                error = %err,
                "filter backend unavailable, switching to simulated mode"
            );
        }
    }
}
