//! 탐지-차단 컨트롤러
//!
//! [`FirewallController`]는 [`ThreatDetector`]와 [`PacketFilter`]를 묶어
//! 패킷 단위 판정과 자동 차단을 수행하고, 주기적 정리 태스크를 관리합니다.
//!
//! # 상태 전이
//! ```text
//! Stopped ──start()──▶ Running ──stop()──▶ Stopped
//! ```
//!
//! `start()`/`stop()`은 멱등입니다. 정리 태스크는 [`CancellationToken`]으로
//! 취소되며, 진행 중인 정리는 끝까지 수행한 뒤 다음 반복 경계에서 종료합니다.
//!
//! # 사용 예시
//! ```ignore
//! let controller = Arc::new(
//!     FirewallController::builder()
//!         .config(config)
//!         .backend(Arc::new(SimulatedBackend))
//!         .build()
//!         .await?,
//! );
//! controller.start();
//! if let Some(verdict) = controller.process_packet(&packet).await {
//!     println!("{verdict}");
//! }
//! controller.stop().await;
//! ```

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use ironwall_core::clock::{Clock, SystemClock, elapsed_between};
use ironwall_core::config::IronwallConfig;
use ironwall_core::error::{IronwallError, PipelineError};
use ironwall_core::metrics as m;
use ironwall_core::pipeline::{HealthStatus, SequenceClassifier};
use ironwall_core::types::{PacketRecord, ThreatVerdict};
use ironwall_detector::ThreatDetector;
use ironwall_filter::{BlockEntry, FilterBackend, FilterMode, PacketFilter, PacketFilterConfig};

use crate::stats::{Counters, FirewallStats, SweepReport};

/// 실행 중인 정리 태스크
struct SweepTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// 탐지-차단 컨트롤러
///
/// 호출자가 소유하며 `Arc`로 공유합니다. 모든 메서드는 `&self`를 받습니다.
pub struct FirewallController<B: FilterBackend> {
    detector: Arc<ThreatDetector>,
    filter: Arc<PacketFilter<B>>,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
    running: AtomicBool,
    started_at: Mutex<Option<SystemTime>>,
    sweep_interval: Duration,
    sweep: Mutex<Option<SweepTask>>,
}

impl<B: FilterBackend> FirewallController<B> {
    /// 빌더를 생성합니다.
    pub fn builder() -> FirewallControllerBuilder<B> {
        FirewallControllerBuilder::new()
    }

    /// 컨트롤러를 시작합니다. 이미 실행 중이면 아무 것도 하지 않습니다.
    ///
    /// 카운터를 초기화하고 주기적 정리 태스크를 띄웁니다.
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("firewall controller already running");
            return;
        }

        self.counters.reset();
        *self.started_at.lock() = Some(self.clock.now());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sweep_loop(
            Arc::clone(&self.detector),
            Arc::clone(&self.filter),
            Arc::clone(&self.counters),
            self.sweep_interval,
            cancel.clone(),
        ));
        if let Some(previous) = self.sweep.lock().replace(SweepTask { cancel, handle }) {
            previous.cancel.cancel();
        }

        info!(
            sweep_interval_secs = self.sweep_interval.as_secs(),
            filter_mode = %self.filter.mode(),
            backend = self.filter.backend_name(),
            "firewall controller started"
        );
    }

    /// 컨트롤러를 멈춥니다. 실행 중이 아니면 아무 것도 하지 않습니다.
    ///
    /// 정리 태스크가 종료될 때까지 기다립니다. 진행 중인 `process_packet`
    /// 호출은 정상적으로 끝납니다.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("firewall controller not running");
            return;
        }

        let task = self.sweep.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "sweep task ended abnormally");
            }
        }

        info!(
            packets_analyzed = Counters::read(&self.counters.packets_analyzed),
            threats_blocked = Counters::read(&self.counters.threats_blocked),
            "firewall controller stopped"
        );
    }

    /// 실행 중 여부
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 패킷 하나를 처리합니다.
    ///
    /// 실행 중이 아니거나 레코드가 잘못되었으면 `None`을 반환합니다.
    /// 위협이면 출발지를 차단합니다. 어떤 실패도 호출자에게 전파하지 않습니다.
    pub async fn process_packet(&self, packet: &PacketRecord) -> Option<ThreatVerdict> {
        if !self.is_running() {
            return None;
        }
        if let Err(e) = packet.validate() {
            Counters::bump(&self.counters.packets_rejected);
            metrics::counter!(m::FIREWALL_PACKETS_REJECTED_TOTAL).increment(1);
            debug!(error = %e, packet = %packet, "rejected malformed packet");
            return None;
        }

        Counters::bump(&self.counters.packets_analyzed);
        metrics::counter!(m::FIREWALL_PACKETS_ANALYZED_TOTAL).increment(1);

        let verdict = self.detector.analyze(packet);
        if !verdict.is_threat {
            trace!(source = %verdict.source, confidence = verdict.confidence, "normal traffic");
            return Some(verdict);
        }

        Counters::bump(&self.counters.threats_detected);
        metrics::counter!(
            m::FIREWALL_THREATS_DETECTED_TOTAL,
            m::LABEL_CATEGORY => verdict.category.as_label()
        )
        .increment(1);

        let reason = verdict.reason();
        if self.filter.block(verdict.source, &reason).await {
            Counters::bump(&self.counters.threats_blocked);
            metrics::counter!(m::FIREWALL_THREATS_BLOCKED_TOTAL).increment(1);
            warn!(
                source = %verdict.source,
                category = %verdict.category,
                severity = %verdict.category.severity(),
                confidence = verdict.confidence,
                reason = %reason,
                "threat blocked"
            );
        }
        Some(verdict)
    }

    /// 현재 통계
    pub fn stats(&self) -> FirewallStats {
        let started_at = *self.started_at.lock();
        let uptime_secs = match (self.is_running(), started_at) {
            (true, Some(at)) => elapsed_between(at, self.clock.now()).as_secs(),
            _ => 0,
        };
        FirewallStats {
            running: self.is_running(),
            started_at,
            uptime_secs,
            packets_analyzed: Counters::read(&self.counters.packets_analyzed),
            packets_rejected: Counters::read(&self.counters.packets_rejected),
            threats_detected: Counters::read(&self.counters.threats_detected),
            threats_blocked: Counters::read(&self.counters.threats_blocked),
            sweeps: Counters::read(&self.counters.sweeps),
            active_flows: self.detector.active_flows(),
            blocked_count: self.filter.blocked_count(),
            filter_mode: self.filter.mode(),
        }
    }

    /// 차단 목록 (차단 시각, 주소 순)
    pub fn list_blocked(&self) -> Vec<BlockEntry> {
        self.filter.list_blocked()
    }

    /// 운영자 요청으로 차단을 해제합니다. 실행 상태와 무관하게 동작합니다.
    pub async fn unblock_manually(&self, addr: IpAddr) -> bool {
        let released = self.filter.unblock(addr).await;
        if released {
            info!(source = %addr, "manually unblocked");
        } else {
            debug!(source = %addr, "manual unblock requested for address not blocked");
        }
        released
    }

    /// 정리를 즉시 한 번 수행합니다.
    pub async fn sweep_now(&self) -> SweepReport {
        run_sweep(&self.detector, &self.filter, &self.counters).await
    }

    /// 종료 시 설치한 차단 룰을 모두 제거합니다.
    pub async fn release_blocks(&self) -> usize {
        let released = self.filter.release_all().await;
        if released > 0 {
            info!(released, "released all blocks");
        }
        released
    }

    /// 상태 점검
    pub fn health(&self) -> HealthStatus {
        if !self.is_running() {
            return HealthStatus::Unhealthy("stopped".to_owned());
        }
        match self.filter.mode() {
            FilterMode::Enforcing => HealthStatus::Healthy,
            FilterMode::Simulated => HealthStatus::Degraded(format!(
                "blocking is simulated (backend: {})",
                self.filter.backend_name()
            )),
        }
    }

    /// 탐지기 참조
    pub fn detector(&self) -> &ThreatDetector {
        &self.detector
    }
}

impl<B: FilterBackend> Drop for FirewallController<B> {
    fn drop(&mut self) {
        if let Some(task) = self.sweep.get_mut().take() {
            task.cancel.cancel();
        }
    }
}

// =============================================================================
// 정리 태스크
// =============================================================================

async fn sweep_loop<B: FilterBackend>(
    detector: Arc<ThreatDetector>,
    filter: Arc<PacketFilter<B>>,
    counters: Arc<Counters>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // 첫 tick은 즉시 완료된다
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("sweep loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                run_sweep(&detector, &filter, &counters).await;
            }
        }
    }
}

async fn run_sweep<B: FilterBackend>(
    detector: &ThreatDetector,
    filter: &PacketFilter<B>,
    counters: &Counters,
) -> SweepReport {
    let flows_evicted = detector.evict_stale(detector.flow_idle_timeout());
    let blocks_expired = filter.sweep_expired(filter.block_duration()).await;

    Counters::bump(&counters.sweeps);
    metrics::counter!(m::FIREWALL_SWEEPS_TOTAL).increment(1);
    debug!(flows_evicted, blocks_expired, "sweep completed");

    SweepReport {
        flows_evicted,
        blocks_expired,
    }
}

// =============================================================================
// 빌더
// =============================================================================

/// [`FirewallController`] 빌더
pub struct FirewallControllerBuilder<B: FilterBackend> {
    config: IronwallConfig,
    backend: Option<Arc<B>>,
    clock: Option<Arc<dyn Clock>>,
    classifier: Option<Box<dyn SequenceClassifier>>,
}

impl<B: FilterBackend> FirewallControllerBuilder<B> {
    /// 기본 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: IronwallConfig::default(),
            backend: None,
            clock: None,
            classifier: None,
        }
    }

    /// 설정을 지정합니다. `detection`, `filter`, `firewall` 섹션을 사용합니다.
    pub fn config(mut self, config: IronwallConfig) -> Self {
        self.config = config;
        self
    }

    /// 필터 백엔드를 지정합니다. 필수입니다.
    pub fn backend(mut self, backend: Arc<B>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// 시간 소스를 지정합니다. 기본값은 [`SystemClock`]입니다.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 시퀀스 분류기를 지정합니다.
    pub fn classifier(mut self, classifier: Box<dyn SequenceClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// 컨트롤러를 생성합니다. 필터 백엔드 점검을 포함합니다.
    ///
    /// # Errors
    /// - 설정값이 유효하지 않으면 `IronwallError::Config`
    /// - 백엔드가 지정되지 않았으면 `IronwallError::Pipeline`
    pub async fn build(self) -> Result<FirewallController<B>, IronwallError> {
        self.config.validate()?;
        let backend = self.backend.ok_or_else(|| {
            PipelineError::InitFailed("filter backend not set".to_owned())
        })?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let mut detector = ThreatDetector::builder()
            .config(self.config.detection.clone())
            .clock(Arc::clone(&clock));
        if let Some(classifier) = self.classifier {
            detector = detector.classifier(classifier);
        }
        let detector = detector.build()?;

        let filter_config = PacketFilterConfig::from_core(&self.config.filter)?;
        let filter = PacketFilter::initialize(backend, filter_config, Arc::clone(&clock)).await?;

        info!(
            classifier = detector.classifier_name(),
            backend = filter.backend_name(),
            filter_mode = %filter.mode(),
            "firewall controller built"
        );

        Ok(FirewallController {
            detector: Arc::new(detector),
            filter: Arc::new(filter),
            clock,
            counters: Arc::new(Counters::default()),
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
            sweep_interval: self.config.firewall.sweep_interval(),
            sweep: Mutex::new(None),
        })
    }
}

impl<B: FilterBackend> Default for FirewallControllerBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}
