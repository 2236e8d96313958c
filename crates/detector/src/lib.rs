//! Ironwall 위협 탐지 엔진
//!
//! 출발지별 흐름 통계([`flow`])를 유지하고, 임계값 룰([`rules`])과
//! 교체 가능한 시퀀스 분류기([`classifier`])의 판정을 [`detector`]에서 결합합니다.
//!
//! ```no_run
//! use ironwall_detector::ThreatDetector;
//!
//! let detector = ThreatDetector::builder().build().expect("valid default config");
//! assert_eq!(detector.active_flows(), 0);
//! ```

pub mod classifier;
pub mod detector;
pub mod flow;
pub mod rules;

pub use classifier::{BaselineClassifier, SequenceBuffers};
pub use detector::{ThreatDetector, ThreatDetectorBuilder};
pub use flow::{FlowState, FlowTracker, SharedFlow};
pub use rules::{RuleEngine, RuleThresholds};
