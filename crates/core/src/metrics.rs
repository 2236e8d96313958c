//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `ironwall_`
//! - 모듈명: `detector_`, `filter_`, `firewall_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(ironwall_core::metrics::FIREWALL_PACKETS_ANALYZED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 프로토콜 레이블 키 (tcp, udp, icmp)
pub const LABEL_PROTOCOL: &str = "protocol";

/// 위협 카테고리 레이블 키 (ddos, port_scan, brute_force)
pub const LABEL_CATEGORY: &str = "category";

/// 판정 출처 레이블 키 (rules, classifier)
pub const LABEL_SOURCE: &str = "source";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Detector 메트릭 ────────────────────────────────────────────────

/// Detector: 추적 중인 흐름 수 (gauge)
pub const DETECTOR_ACTIVE_FLOWS: &str = "ironwall_detector_active_flows";

/// Detector: 만료되어 제거된 흐름 수 (counter)
pub const DETECTOR_FLOWS_EVICTED_TOTAL: &str = "ironwall_detector_flows_evicted_total";

/// Detector: 판정 수 (counter, labels: category, source)
pub const DETECTOR_VERDICTS_TOTAL: &str = "ironwall_detector_verdicts_total";

/// Detector: 패킷 하나의 분석 지연 시간 (histogram, 초)
pub const DETECTOR_ANALYSIS_DURATION_SECONDS: &str =
    "ironwall_detector_analysis_duration_seconds";

// ─── Filter 메트릭 ──────────────────────────────────────────────────

/// Filter: 차단 중인 주소 수 (gauge)
pub const FILTER_BLOCKED_ADDRESSES: &str = "ironwall_filter_blocked_addresses";

/// Filter: 차단 실행 수 (counter)
pub const FILTER_BLOCKS_TOTAL: &str = "ironwall_filter_blocks_total";

/// Filter: 차단 해제 수 (counter)
pub const FILTER_UNBLOCKS_TOTAL: &str = "ironwall_filter_unblocks_total";

/// Filter: 만료로 해제된 차단 수 (counter)
pub const FILTER_EXPIRED_TOTAL: &str = "ironwall_filter_expired_total";

/// Filter: 백엔드 호출 실패 수 (counter)
pub const FILTER_BACKEND_FAILURES_TOTAL: &str = "ironwall_filter_backend_failures_total";

/// Filter: 시뮬레이션 모드 여부 (gauge, 0 또는 1)
pub const FILTER_SIMULATED_MODE: &str = "ironwall_filter_simulated_mode";

// ─── Firewall 메트릭 ────────────────────────────────────────────────

/// Firewall: 분석된 패킷 수 (counter)
pub const FIREWALL_PACKETS_ANALYZED_TOTAL: &str = "ironwall_firewall_packets_analyzed_total";

/// Firewall: 잘못된 레코드로 거부된 패킷 수 (counter)
pub const FIREWALL_PACKETS_REJECTED_TOTAL: &str = "ironwall_firewall_packets_rejected_total";

/// Firewall: 탐지된 위협 수 (counter, label: category)
pub const FIREWALL_THREATS_DETECTED_TOTAL: &str = "ironwall_firewall_threats_detected_total";

/// Firewall: 새로 차단된 위협 수 (counter)
pub const FIREWALL_THREATS_BLOCKED_TOTAL: &str = "ironwall_firewall_threats_blocked_total";

/// Firewall: 주기적 정리 실행 수 (counter)
pub const FIREWALL_SWEEPS_TOTAL: &str = "ironwall_firewall_sweeps_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 입력에서 건너뛴 잘못된 레코드 수 (counter)
pub const DAEMON_INPUT_ERRORS_TOTAL: &str = "ironwall_daemon_input_errors_total";

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "ironwall_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "ironwall_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 패킷 분석 지연 시간 히스토그램 버킷 (초)
///
/// 1us ~ 10ms 범위
pub const ANALYSIS_DURATION_BUCKETS: [f64; 8] =
    [0.000_001, 0.000_005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.01];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `ironwall-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Detector
    describe_gauge!(
        DETECTOR_ACTIVE_FLOWS,
        "Number of source addresses currently tracked"
    );
    describe_counter!(
        DETECTOR_FLOWS_EVICTED_TOTAL,
        "Total number of idle flows evicted"
    );
    describe_counter!(
        DETECTOR_VERDICTS_TOTAL,
        "Verdicts produced per category and deciding detector"
    );
    describe_histogram!(
        DETECTOR_ANALYSIS_DURATION_SECONDS,
        "Time to analyze a single packet in seconds"
    );

    // Filter
    describe_gauge!(
        FILTER_BLOCKED_ADDRESSES,
        "Number of addresses currently blocked"
    );
    describe_counter!(FILTER_BLOCKS_TOTAL, "Total number of addresses blocked");
    describe_counter!(
        FILTER_UNBLOCKS_TOTAL,
        "Total number of addresses unblocked"
    );
    describe_counter!(
        FILTER_EXPIRED_TOTAL,
        "Total number of blocks removed after expiry"
    );
    describe_counter!(
        FILTER_BACKEND_FAILURES_TOTAL,
        "Total number of failed firewall backend invocations"
    );
    describe_gauge!(
        FILTER_SIMULATED_MODE,
        "1 when blocking is simulated instead of enforced"
    );

    // Firewall
    describe_counter!(
        FIREWALL_PACKETS_ANALYZED_TOTAL,
        "Total number of packets analyzed"
    );
    describe_counter!(
        FIREWALL_PACKETS_REJECTED_TOTAL,
        "Total number of malformed packet records rejected"
    );
    describe_counter!(
        FIREWALL_THREATS_DETECTED_TOTAL,
        "Total number of threat verdicts per category"
    );
    describe_counter!(
        FIREWALL_THREATS_BLOCKED_TOTAL,
        "Total number of threats that resulted in a new block"
    );
    describe_counter!(
        FIREWALL_SWEEPS_TOTAL,
        "Total number of periodic maintenance sweeps"
    );

    // Daemon
    describe_counter!(
        DAEMON_INPUT_ERRORS_TOTAL,
        "Total number of malformed input records skipped"
    );
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Ironwall daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
