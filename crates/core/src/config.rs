//! 설정 관리: ironwall.toml 파싱 및 런타임 설정
//!
//! [`IronwallConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`IRONWALL_DETECTION_DDOS_PPS_THRESHOLD=2000` 형식)
//! 3. 설정 파일 (`ironwall.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), ironwall_core::error::IronwallError> {
//! use ironwall_core::config::IronwallConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = IronwallConfig::load("ironwall.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = IronwallConfig::parse("[detection]\nportscan_threshold = 80")?;
//! # Ok(())
//! # }
//! ```

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, IronwallError};

/// Ironwall 통합 설정
///
/// `ironwall.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IronwallConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 탐지 임계값 설정
    #[serde(default)]
    pub detection: DetectionConfig,
    /// 패킷 필터 설정
    #[serde(default)]
    pub filter: FilterConfig,
    /// 컨트롤러 설정
    #[serde(default)]
    pub firewall: FirewallConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl IronwallConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IronwallError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, IronwallError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IronwallError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                IronwallError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, IronwallError> {
        toml::from_str(toml_str).map_err(|e| {
            IronwallError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `IRONWALL_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "IRONWALL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "IRONWALL_GENERAL_LOG_FORMAT");

        // Detection
        let d = &mut self.detection;
        override_f64(
            &mut d.ddos_pps_threshold,
            "IRONWALL_DETECTION_DDOS_PPS_THRESHOLD",
        );
        override_usize(
            &mut d.portscan_threshold,
            "IRONWALL_DETECTION_PORTSCAN_THRESHOLD",
        );
        override_u64(
            &mut d.bruteforce_threshold,
            "IRONWALL_DETECTION_BRUTEFORCE_THRESHOLD",
        );
        override_u64(
            &mut d.analysis_window_secs,
            "IRONWALL_DETECTION_ANALYSIS_WINDOW_SECS",
        );
        override_u32(
            &mut d.flow_idle_multiplier,
            "IRONWALL_DETECTION_FLOW_IDLE_MULTIPLIER",
        );
        override_f64(
            &mut d.fast_path_confidence,
            "IRONWALL_DETECTION_FAST_PATH_CONFIDENCE",
        );
        override_f64(
            &mut d.classifier_min_confidence,
            "IRONWALL_DETECTION_CLASSIFIER_MIN_CONFIDENCE",
        );
        override_usize(
            &mut d.min_sequence_len,
            "IRONWALL_DETECTION_MIN_SEQUENCE_LEN",
        );
        override_usize(
            &mut d.max_sequence_len,
            "IRONWALL_DETECTION_MAX_SEQUENCE_LEN",
        );

        // Filter
        let f = &mut self.filter;
        override_string(&mut f.backend, "IRONWALL_FILTER_BACKEND");
        override_string(&mut f.iptables_path, "IRONWALL_FILTER_IPTABLES_PATH");
        override_string(&mut f.ip6tables_path, "IRONWALL_FILTER_IP6TABLES_PATH");
        override_string(&mut f.chain, "IRONWALL_FILTER_CHAIN");
        override_string(&mut f.parent_chain, "IRONWALL_FILTER_PARENT_CHAIN");
        override_u64(
            &mut f.block_duration_secs,
            "IRONWALL_FILTER_BLOCK_DURATION_SECS",
        );
        override_u64(
            &mut f.backend_timeout_ms,
            "IRONWALL_FILTER_BACKEND_TIMEOUT_MS",
        );
        override_usize(
            &mut f.max_blocked_entries,
            "IRONWALL_FILTER_MAX_BLOCKED_ENTRIES",
        );
        override_csv(&mut f.whitelist, "IRONWALL_FILTER_WHITELIST");

        // Firewall
        override_u64(
            &mut self.firewall.sweep_interval_secs,
            "IRONWALL_FIREWALL_SWEEP_INTERVAL_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "IRONWALL_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "IRONWALL_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "IRONWALL_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IronwallError> {
        self.general.validate()?;
        self.detection.validate()?;
        self.filter.validate()?;
        self.firewall.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

impl GeneralConfig {
    /// 로그 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }
        Ok(())
    }
}

/// 탐지 임계값 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// DDoS 판정 초당 패킷 수 임계값
    pub ddos_pps_threshold: f64,
    /// 포트 스캔 판정 고유 목적지 포트 수 임계값
    pub portscan_threshold: usize,
    /// 무차별 대입 판정 실패 연결 수 임계값
    pub bruteforce_threshold: u64,
    /// 분석 윈도우 (초)
    pub analysis_window_secs: u64,
    /// 흐름 유휴 만료 = 분석 윈도우 × 이 값
    pub flow_idle_multiplier: u32,
    /// 룰 엔진 판정을 바로 채택하는 신뢰도 하한
    pub fast_path_confidence: f64,
    /// 분류기 판정을 채택하는 최소 확률 (미만이면 기권으로 취급)
    pub classifier_min_confidence: f64,
    /// 시퀀스 분류에 필요한 최소 패킷 수
    pub min_sequence_len: usize,
    /// 출발지별 시퀀스 버퍼 최대 길이
    pub max_sequence_len: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ddos_pps_threshold: 1000.0,
            portscan_threshold: 50,
            bruteforce_threshold: 10,
            analysis_window_secs: 10,
            flow_idle_multiplier: 6,
            fast_path_confidence: 0.8,
            classifier_min_confidence: 0.6,
            min_sequence_len: 5,
            max_sequence_len: 100,
        }
    }
}

impl DetectionConfig {
    /// 분석 윈도우
    pub fn analysis_window(&self) -> Duration {
        Duration::from_secs(self.analysis_window_secs)
    }

    /// 흐름 유휴 만료 시간
    pub fn flow_idle_timeout(&self) -> Duration {
        self.analysis_window() * self.flow_idle_multiplier
    }

    /// 임계값을 검증합니다. 생성 시점에 호출하여 즉시 실패시킵니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ddos_pps_threshold.is_finite() || self.ddos_pps_threshold <= 0.0 {
            return Err(invalid(
                "detection.ddos_pps_threshold",
                "must be a finite number greater than 0",
            ));
        }
        if self.portscan_threshold == 0 {
            return Err(invalid(
                "detection.portscan_threshold",
                "must be greater than 0",
            ));
        }
        if self.bruteforce_threshold == 0 {
            return Err(invalid(
                "detection.bruteforce_threshold",
                "must be greater than 0",
            ));
        }
        if self.analysis_window_secs == 0 {
            return Err(invalid(
                "detection.analysis_window_secs",
                "must be greater than 0",
            ));
        }
        if self.flow_idle_multiplier == 0 {
            return Err(invalid(
                "detection.flow_idle_multiplier",
                "must be greater than 0",
            ));
        }
        if !(self.fast_path_confidence > 0.0 && self.fast_path_confidence <= 1.0) {
            return Err(invalid(
                "detection.fast_path_confidence",
                "must be in (0.0, 1.0]",
            ));
        }
        if !(0.0..=1.0).contains(&self.classifier_min_confidence) {
            return Err(invalid(
                "detection.classifier_min_confidence",
                "must be in [0.0, 1.0]",
            ));
        }
        if self.min_sequence_len == 0 {
            return Err(invalid(
                "detection.min_sequence_len",
                "must be greater than 0",
            ));
        }
        if self.max_sequence_len < self.min_sequence_len {
            return Err(invalid(
                "detection.max_sequence_len",
                format!("must be >= min_sequence_len ({})", self.min_sequence_len),
            ));
        }
        Ok(())
    }
}

/// 패킷 필터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 백엔드 종류 (iptables, simulated)
    pub backend: String,
    /// iptables 실행 파일 경로
    pub iptables_path: String,
    /// ip6tables 실행 파일 경로
    pub ip6tables_path: String,
    /// 차단 룰을 담는 전용 체인
    pub chain: String,
    /// 전용 체인으로 점프하는 룰을 넣을 상위 체인
    pub parent_chain: String,
    /// 차단 유지 시간 (초)
    pub block_duration_secs: u64,
    /// 백엔드 호출 타임아웃 (밀리초)
    pub backend_timeout_ms: u64,
    /// 동시에 차단할 수 있는 최대 주소 수
    pub max_blocked_entries: usize,
    /// 절대 차단하지 않을 주소 목록
    pub whitelist: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            backend: "iptables".to_owned(),
            iptables_path: "iptables".to_owned(),
            ip6tables_path: "ip6tables".to_owned(),
            chain: "IRONWALL".to_owned(),
            parent_chain: "INPUT".to_owned(),
            block_duration_secs: 3600,
            backend_timeout_ms: 2000,
            max_blocked_entries: 10_000,
            whitelist: vec!["127.0.0.1".to_owned(), "::1".to_owned()],
        }
    }
}

impl FilterConfig {
    /// 차단 유지 시간
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_secs)
    }

    /// 백엔드 호출 타임아웃
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    /// 화이트리스트를 주소로 파싱합니다.
    pub fn whitelist_addrs(&self) -> Result<Vec<IpAddr>, ConfigError> {
        self.whitelist
            .iter()
            .map(|s| {
                s.trim().parse::<IpAddr>().map_err(|e| {
                    invalid("filter.whitelist", format!("'{s}' is not an IP address: {e}"))
                })
            })
            .collect()
    }

    /// 필터 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_backends = ["iptables", "simulated"];
        if !valid_backends.contains(&self.backend.as_str()) {
            return Err(invalid(
                "filter.backend",
                format!("must be one of: {}", valid_backends.join(", ")),
            ));
        }
        if self.backend == "iptables" {
            if self.iptables_path.is_empty() || self.ip6tables_path.is_empty() {
                return Err(invalid(
                    "filter.iptables_path",
                    "binary paths must not be empty when backend is iptables",
                ));
            }
            if self.chain.is_empty() {
                return Err(invalid("filter.chain", "must not be empty"));
            }
            if self.parent_chain.is_empty() || self.parent_chain == self.chain {
                return Err(invalid(
                    "filter.parent_chain",
                    "must be non-empty and differ from filter.chain",
                ));
            }
        }
        if self.block_duration_secs == 0 {
            return Err(invalid(
                "filter.block_duration_secs",
                "must be greater than 0",
            ));
        }
        if self.backend_timeout_ms == 0 {
            return Err(invalid(
                "filter.backend_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.max_blocked_entries == 0 {
            return Err(invalid(
                "filter.max_blocked_entries",
                "must be greater than 0",
            ));
        }
        self.whitelist_addrs()?;
        Ok(())
    }
}

/// 컨트롤러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    /// 주기적 정리(흐름 만료 + 차단 만료) 간격 (초)
    pub sweep_interval_secs: u64,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
        }
    }
}

impl FirewallConfig {
    /// 정리 간격
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// 컨트롤러 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_secs == 0 {
            return Err(invalid(
                "firewall.sweep_interval_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9108,
            endpoint: "/metrics".to_owned(),
        }
    }
}

impl MetricsConfig {
    /// 메트릭 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_f64(target: &mut f64, env_key: &str) {
    override_parsed(target, env_key, "f64");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = IronwallConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.detection.ddos_pps_threshold, 1000.0);
        assert_eq!(config.detection.portscan_threshold, 50);
        assert_eq!(config.detection.bruteforce_threshold, 10);
        assert_eq!(config.filter.block_duration_secs, 3600);
        assert_eq!(config.firewall.sweep_interval_secs, 60);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        IronwallConfig::default().validate().unwrap();
    }

    #[test]
    fn flow_idle_timeout_is_window_multiple() {
        let detection = DetectionConfig {
            analysis_window_secs: 10,
            flow_idle_multiplier: 6,
            ..DetectionConfig::default()
        };
        assert_eq!(detection.flow_idle_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[detection]
ddos_pps_threshold = 2500.0
portscan_threshold = 80

[filter]
backend = "simulated"
whitelist = ["10.0.0.1"]
"#;
        let config = IronwallConfig::parse(toml).unwrap();
        assert_eq!(config.detection.ddos_pps_threshold, 2500.0);
        assert_eq!(config.detection.portscan_threshold, 80);
        // 지정하지 않은 필드는 기본값 유지
        assert_eq!(config.detection.bruteforce_threshold, 10);
        assert_eq!(config.filter.backend, "simulated");
        assert_eq!(
            config.filter.whitelist_addrs().unwrap(),
            vec!["10.0.0.1".parse::<IpAddr>().unwrap()]
        );
        config.validate().unwrap();
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = IronwallConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            IronwallError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn negative_threshold_fails_at_parse() {
        let err = IronwallConfig::parse("[detection]\nportscan_threshold = -5").unwrap_err();
        assert!(matches!(err, IronwallError::Config(_)));
    }

    #[test]
    fn validate_rejects_non_positive_ddos_threshold() {
        let mut config = IronwallConfig::default();
        config.detection.ddos_pps_threshold = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ddos_pps_threshold"));

        config.detection.ddos_pps_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_thresholds() {
        let mut config = IronwallConfig::default();
        config.detection.portscan_threshold = 0;
        assert!(config.validate().unwrap_err().to_string().contains("portscan_threshold"));

        let mut config = IronwallConfig::default();
        config.detection.bruteforce_threshold = 0;
        assert!(config.validate().unwrap_err().to_string().contains("bruteforce_threshold"));

        let mut config = IronwallConfig::default();
        config.filter.block_duration_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("block_duration_secs"));

        let mut config = IronwallConfig::default();
        config.firewall.sweep_interval_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("sweep_interval_secs"));
    }

    #[test]
    fn validate_rejects_fast_path_out_of_range() {
        let mut config = IronwallConfig::default();
        config.detection.fast_path_confidence = 1.5;
        assert!(config.validate().is_err());
        config.detection.fast_path_confidence = 0.0;
        assert!(config.validate().is_err());
        config.detection.fast_path_confidence = 1.0;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_sequence_bounds_inverted() {
        let mut config = IronwallConfig::default();
        config.detection.min_sequence_len = 20;
        config.detection.max_sequence_len = 10;
        assert!(config.validate().unwrap_err().to_string().contains("max_sequence_len"));
    }

    #[test]
    fn validate_rejects_unknown_backend_and_bad_whitelist() {
        let mut config = IronwallConfig::default();
        config.filter.backend = "pf".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("filter.backend"));

        let mut config = IronwallConfig::default();
        config.filter.whitelist = vec!["not-an-ip".to_owned()];
        assert!(config.validate().unwrap_err().to_string().contains("not-an-ip"));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = IronwallConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("log_level"));
    }

    #[test]
    #[serial]
    fn env_overrides_apply_to_detection_and_filter() {
        // SAFETY: serial 테스트로 환경변수 동시 접근을 막습니다.
        unsafe {
            std::env::set_var("IRONWALL_DETECTION_DDOS_PPS_THRESHOLD", "3000");
            std::env::set_var("IRONWALL_FILTER_WHITELIST", "10.1.1.1, 10.1.1.2");
            std::env::set_var("IRONWALL_FILTER_BACKEND", "simulated");
        }
        let mut config = IronwallConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.detection.ddos_pps_threshold, 3000.0);
        assert_eq!(config.filter.whitelist, vec!["10.1.1.1", "10.1.1.2"]);
        assert_eq!(config.filter.backend, "simulated");
        unsafe {
            std::env::remove_var("IRONWALL_DETECTION_DDOS_PPS_THRESHOLD");
            std::env::remove_var("IRONWALL_FILTER_WHITELIST");
            std::env::remove_var("IRONWALL_FILTER_BACKEND");
        }
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        // SAFETY: serial 테스트로 환경변수 동시 접근을 막습니다.
        unsafe { std::env::set_var("IRONWALL_DETECTION_PORTSCAN_THRESHOLD", "lots") };
        let mut config = IronwallConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.detection.portscan_threshold, 50);
        unsafe { std::env::remove_var("IRONWALL_DETECTION_PORTSCAN_THRESHOLD") };
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = IronwallConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = IronwallConfig::parse(&toml_str).unwrap();
        assert_eq!(config.filter.chain, parsed.filter.chain);
        assert_eq!(
            config.detection.fast_path_confidence,
            parsed.detection.fast_path_confidence
        );
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = IronwallConfig::from_file("/nonexistent/path/ironwall.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IronwallError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ironwall.toml");
        std::fs::write(&path, "[firewall]\nsweep_interval_secs = 15\n").unwrap();
        let config = IronwallConfig::from_file(&path).await.unwrap();
        assert_eq!(config.firewall.sweep_interval_secs, 15);
    }
}
