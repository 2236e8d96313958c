//! 위협 탐지기: 룰 엔진과 시퀀스 분류기 판정 결합
//!
//! # 판정 흐름
//! ```text
//! PacketRecord ──▶ FlowTracker.update ──▶ SequenceBuffers.push
//!                        │
//!                        ▼
//!                  RuleEngine.evaluate ──(위협 && 신뢰도 > fast path)──▶ 반환
//!                        │
//!                        ▼
//!                  SequenceClassifier.score ──▶ 신뢰도 높은 쪽 반환 (동률은 룰 엔진)
//! ```
//!
//! 분류기가 기권하면 (데이터 부족, 정상 예측, 낮은 확률) 룰 엔진 판정을 그대로 씁니다.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use ironwall_core::clock::{Clock, SystemClock};
use ironwall_core::config::DetectionConfig;
use ironwall_core::error::ConfigError;
use ironwall_core::metrics as m;
use ironwall_core::pipeline::SequenceClassifier;
use ironwall_core::types::{PacketRecord, ThreatCategory, ThreatVerdict, VerdictSource};

use crate::classifier::{BaselineClassifier, SequenceBuffers};
use crate::flow::{FlowState, FlowTracker};
use crate::rules::RuleEngine;

// =============================================================================
// ThreatDetector
// =============================================================================

/// 패킷 단위 위협 탐지기
///
/// 모든 메서드는 `&self`를 받으며 여러 태스크에서 동시에 호출할 수 있습니다.
pub struct ThreatDetector {
    flows: FlowTracker,
    sequences: SequenceBuffers,
    rules: RuleEngine,
    classifier: Box<dyn SequenceClassifier>,
    clock: Arc<dyn Clock>,
    fast_path_confidence: f64,
    classifier_min_confidence: f64,
    min_sequence_len: usize,
    flow_idle_timeout: Duration,
}

impl ThreatDetector {
    /// 빌더를 생성합니다.
    pub fn builder() -> ThreatDetectorBuilder {
        ThreatDetectorBuilder::new()
    }

    /// 패킷 하나를 분석하여 판정을 반환합니다.
    pub fn analyze(&self, packet: &PacketRecord) -> ThreatVerdict {
        let started = Instant::now();

        let flow = self.flows.update(packet);
        self.sequences.push(packet);

        let rule_verdict = {
            let state = flow.lock();
            self.rules.evaluate(packet, &state)
        };

        let verdict = if rule_verdict.is_threat
            && rule_verdict.confidence > self.fast_path_confidence
        {
            rule_verdict
        } else {
            match self.classify(&packet.src_ip) {
                Some(classified) if classified.confidence > rule_verdict.confidence => classified,
                _ => rule_verdict,
            }
        };

        metrics::counter!(
            m::DETECTOR_VERDICTS_TOTAL,
            m::LABEL_CATEGORY => verdict.category.as_label(),
            m::LABEL_SOURCE => source_label(verdict.decided_by)
        )
        .increment(1);
        metrics::histogram!(m::DETECTOR_ANALYSIS_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        if verdict.is_threat {
            debug!(
                source = %verdict.source,
                category = %verdict.category,
                confidence = verdict.confidence,
                decided_by = source_label(verdict.decided_by),
                "threat verdict"
            );
        } else {
            trace!(source = %packet.src_ip, "normal verdict");
        }
        verdict
    }

    /// 분류기 판정을 구합니다.
    ///
    /// 버퍼가 최소 길이 미만이거나, 분류기가 점수를 내지 않거나, 정상을 예측하거나,
    /// 확률이 하한 미만이면 `None`(기권)입니다.
    fn classify(&self, source: &IpAddr) -> Option<ThreatVerdict> {
        // 락을 잡은 채 분류기를 호출하지 않도록 복사본을 넘긴다
        let recent = self.sequences.recent(source);
        if recent.len() < self.min_sequence_len {
            return None;
        }

        let distribution = self.classifier.score(&recent)?;
        let (category, probability) = distribution.most_likely();
        if category == ThreatCategory::Normal || probability < self.classifier_min_confidence {
            return None;
        }

        let mut verdict = ThreatVerdict::threat(*source, category, probability, None)
            .decided_by(VerdictSource::Classifier);
        for candidate in ThreatCategory::ALL {
            verdict = verdict.with_detail(
                format!("p_{}", candidate.as_label()),
                distribution.probability(candidate),
            );
        }
        Some(verdict)
    }

    /// 유휴 흐름과 시퀀스 버퍼를 정리합니다. 제거한 흐름 수를 반환합니다.
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        let evicted = self.flows.evict_stale(max_age);
        self.sequences.evict_stale(self.clock.now(), max_age);
        evicted
    }

    /// 설정된 유휴 만료 시간 (분석 윈도우 × 배수)
    pub fn flow_idle_timeout(&self) -> Duration {
        self.flow_idle_timeout
    }

    /// 추적 중인 흐름 수
    pub fn active_flows(&self) -> usize {
        self.flows.len()
    }

    /// 출발지 흐름 통계의 복사본
    pub fn flow_snapshot(&self, source: &IpAddr) -> Option<FlowState> {
        self.flows.snapshot(source)
    }

    /// 주입된 분류기 이름
    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }
}

fn source_label(source: VerdictSource) -> &'static str {
    match source {
        VerdictSource::Rules => "rules",
        VerdictSource::Classifier => "classifier",
    }
}

// =============================================================================
// 빌더
// =============================================================================

/// [`ThreatDetector`] 빌더
pub struct ThreatDetectorBuilder {
    config: DetectionConfig,
    clock: Option<Arc<dyn Clock>>,
    classifier: Option<Box<dyn SequenceClassifier>>,
}

impl ThreatDetectorBuilder {
    /// 기본 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: DetectionConfig::default(),
            clock: None,
            classifier: None,
        }
    }

    /// 탐지 설정을 지정합니다.
    pub fn config(mut self, config: DetectionConfig) -> Self {
        self.config = config;
        self
    }

    /// 시간 소스를 지정합니다. 기본값은 [`SystemClock`]입니다.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 시퀀스 분류기를 지정합니다. 기본값은 [`BaselineClassifier`]입니다.
    pub fn classifier(mut self, classifier: Box<dyn SequenceClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// 탐지기를 생성합니다. 설정이 잘못되면 즉시 실패합니다.
    pub fn build(self) -> Result<ThreatDetector, ConfigError> {
        let rules = RuleEngine::from_config(&self.config)?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let classifier: Box<dyn SequenceClassifier> = match self.classifier {
            Some(classifier) => classifier,
            None => Box::new(BaselineClassifier),
        };

        debug!(
            classifier = classifier.name(),
            fast_path = self.config.fast_path_confidence,
            "threat detector built"
        );

        Ok(ThreatDetector {
            flows: FlowTracker::new(Arc::clone(&clock)),
            sequences: SequenceBuffers::new(
                self.config.analysis_window(),
                self.config.max_sequence_len,
            ),
            rules,
            classifier,
            clock,
            fast_path_confidence: self.config.fast_path_confidence,
            classifier_min_confidence: self.config.classifier_min_confidence,
            min_sequence_len: self.config.min_sequence_len,
            flow_idle_timeout: self.config.flow_idle_timeout(),
        })
    }
}

impl Default for ThreatDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;

    use ironwall_core::clock::ManualClock;
    use ironwall_core::pipeline::ClassDistribution;
    use ironwall_core::types::{AttackPattern, DdosPattern, Protocol, TcpFlags};

    use super::*;

    /// 고정 분포를 반환하고 호출 횟수를 세는 분류기
    struct FixedClassifier {
        distribution: Option<ClassDistribution>,
        calls: Arc<AtomicUsize>,
    }

    impl FixedClassifier {
        fn boxed(distribution: Option<ClassDistribution>) -> (Box<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    distribution,
                    calls: Arc::clone(&calls),
                }),
                calls,
            )
        }
    }

    impl SequenceClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _packets: &[PacketRecord]) -> Option<ClassDistribution> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.distribution
        }
    }

    fn t0() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn packet(src: &str, at: SystemTime, dst_port: u16, protocol: Protocol) -> PacketRecord {
        PacketRecord {
            timestamp: at,
            src_ip: src.parse().unwrap(),
            dst_ip: "10.0.0.1".parse().unwrap(),
            src_port: 40000,
            dst_port,
            protocol,
            size: 64,
            flags: TcpFlags::empty(),
            payload_size: 0,
        }
    }

    fn detector_with(classifier: Box<dyn SequenceClassifier>) -> ThreatDetector {
        ThreatDetector::builder()
            .clock(Arc::new(ManualClock::default()))
            .classifier(classifier)
            .build()
            .unwrap()
    }

    #[test]
    fn default_builder_uses_baseline() {
        let detector = ThreatDetector::builder().build().unwrap();
        assert_eq!(detector.classifier_name(), "baseline");
        assert_eq!(detector.flow_idle_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let config = DetectionConfig {
            portscan_threshold: 0,
            ..DetectionConfig::default()
        };
        assert!(ThreatDetector::builder().config(config).build().is_err());
    }

    #[test]
    fn benign_traffic_stays_normal_with_baseline() {
        let detector = ThreatDetector::builder()
            .clock(Arc::new(ManualClock::default()))
            .build()
            .unwrap();
        let mut last = None;
        for i in 0..20u64 {
            last = Some(detector.analyze(&packet(
                "192.0.2.10",
                t0() + Duration::from_millis(i * 200),
                (i % 10 + 1) as u16,
                Protocol::Tcp,
            )));
        }
        let verdict = last.unwrap();
        assert!(!verdict.is_threat);
        assert_eq!(verdict.decided_by, VerdictSource::Rules);
        assert_eq!(detector.active_flows(), 1);
    }

    #[test]
    fn fast_path_skips_classifier() {
        let (classifier, calls) = FixedClassifier::boxed(ClassDistribution::new(0.0, 0.0, 1.0, 0.0));
        let detector = detector_with(classifier);

        let mut verdict = None;
        for i in 0..1500u32 {
            verdict = Some(detector.analyze(&packet(
                "198.51.100.1",
                t0() + Duration::from_micros(u64::from(i) * 500),
                53,
                Protocol::Udp,
            )));
        }
        let verdict = verdict.unwrap();
        assert_eq!(verdict.category, ThreatCategory::Ddos);
        assert_eq!(verdict.pattern, Some(AttackPattern::Ddos(DdosPattern::UdpFlood)));
        assert_eq!(verdict.decided_by, VerdictSource::Rules);

        // DDoS 판정 이후로는 분류기를 거치지 않는다
        let before_threshold = calls.load(Ordering::SeqCst);
        detector.analyze(&packet("198.51.100.1", t0() + Duration::from_millis(760), 53, Protocol::Udp));
        assert_eq!(calls.load(Ordering::SeqCst), before_threshold);
    }

    #[test]
    fn confident_classifier_overrides_normal_rule_verdict() {
        let (classifier, _) = FixedClassifier::boxed(ClassDistribution::new(0.02, 0.0, 0.0, 0.98));
        let detector = detector_with(classifier);

        let mut verdict = None;
        for i in 0..5u64 {
            verdict = Some(detector.analyze(&packet(
                "203.0.113.4",
                t0() + Duration::from_secs(i),
                22,
                Protocol::Tcp,
            )));
        }
        let verdict = verdict.unwrap();
        assert!(verdict.is_threat);
        assert_eq!(verdict.category, ThreatCategory::BruteForce);
        assert_eq!(verdict.decided_by, VerdictSource::Classifier);
        assert!(verdict.pattern.is_none());
        assert!((verdict.details["p_brute_force"] - 0.98).abs() < 1e-9);
    }

    #[test]
    fn classifier_not_consulted_below_min_sequence_len() {
        let (classifier, calls) = FixedClassifier::boxed(ClassDistribution::new(0.0, 1.0, 0.0, 0.0));
        let detector = detector_with(classifier);
        for i in 0..4u64 {
            let verdict = detector.analyze(&packet(
                "203.0.113.4",
                t0() + Duration::from_secs(i),
                80,
                Protocol::Tcp,
            ));
            assert!(!verdict.is_threat);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn abstaining_classifier_never_overrides_normal() {
        let (classifier, calls) = FixedClassifier::boxed(None);
        let detector = detector_with(classifier);
        for i in 0..10u64 {
            let verdict = detector.analyze(&packet(
                "203.0.113.4",
                t0() + Duration::from_secs(i),
                80,
                Protocol::Tcp,
            ));
            assert!(!verdict.is_threat);
            assert_eq!(verdict.decided_by, VerdictSource::Rules);
            assert_eq!(verdict.confidence, crate::rules::NORMAL_CONFIDENCE);
        }
        assert!(calls.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn low_probability_classifier_is_ignored() {
        let (classifier, _) =
            FixedClassifier::boxed(ClassDistribution::new(0.3, 0.5, 0.2, 0.0));
        let detector = detector_with(classifier);
        let mut verdict = None;
        for i in 0..6u64 {
            verdict = Some(detector.analyze(&packet(
                "203.0.113.4",
                t0() + Duration::from_secs(i),
                80,
                Protocol::Tcp,
            )));
        }
        assert!(!verdict.unwrap().is_threat);
    }

    #[test]
    fn low_confidence_rule_threat_can_be_overridden_by_classifier() {
        // 임계값을 낮춰 신뢰도 0.8 이하의 포트 스캔 판정을 만든다
        let config = DetectionConfig {
            portscan_threshold: 5,
            ..DetectionConfig::default()
        };
        let (classifier, _) = FixedClassifier::boxed(ClassDistribution::new(0.0, 0.9, 0.1, 0.0));
        let detector = ThreatDetector::builder()
            .config(config)
            .clock(Arc::new(ManualClock::default()))
            .classifier(classifier)
            .build()
            .unwrap();

        let mut verdict = None;
        for port in 1..=6u16 {
            verdict = Some(detector.analyze(&packet(
                "203.0.113.4",
                t0() + Duration::from_secs(u64::from(port)),
                port,
                Protocol::Tcp,
            )));
        }
        // 룰 엔진: PortScan 0.66 / 분류기: DDoS 0.9
        let verdict = verdict.unwrap();
        assert_eq!(verdict.category, ThreatCategory::Ddos);
        assert_eq!(verdict.decided_by, VerdictSource::Classifier);
    }

    #[test]
    fn ties_go_to_rule_verdict() {
        let config = DetectionConfig {
            portscan_threshold: 5,
            ..DetectionConfig::default()
        };
        // 6개 포트 → 룰 엔진 신뢰도 0.6 + 6/100
        let rule_confidence = 0.6 + 6.0 / 100.0;
        let (classifier, _) = FixedClassifier::boxed(Some(ClassDistribution {
            normal: 0.0,
            ddos: rule_confidence,
            port_scan: 0.0,
            brute_force: 1.0 - rule_confidence,
        }));
        let detector = ThreatDetector::builder()
            .config(config)
            .clock(Arc::new(ManualClock::default()))
            .classifier(classifier)
            .build()
            .unwrap();

        let mut verdict = None;
        for port in 1..=6u16 {
            verdict = Some(detector.analyze(&packet(
                "203.0.113.4",
                t0() + Duration::from_secs(u64::from(port)),
                port,
                Protocol::Tcp,
            )));
        }
        let verdict = verdict.unwrap();
        assert_eq!(verdict.category, ThreatCategory::PortScan);
        assert_eq!(verdict.decided_by, VerdictSource::Rules);
    }

    #[test]
    fn evict_stale_clears_flows_and_buffers() {
        let clock = ManualClock::new(t0());
        let detector = ThreatDetector::builder()
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        detector.analyze(&packet("192.0.2.1", t0(), 80, Protocol::Tcp));
        detector.analyze(&packet("192.0.2.2", t0(), 80, Protocol::Tcp));
        assert_eq!(detector.active_flows(), 2);

        clock.advance(Duration::from_secs(61));
        assert_eq!(detector.evict_stale(Duration::from_secs(60)), 2);
        assert_eq!(detector.active_flows(), 0);
        assert_eq!(detector.sequences.sources(), 0);
    }
}
