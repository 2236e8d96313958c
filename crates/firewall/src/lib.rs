//! # ironwall-firewall
//!
//! 패킷 단위 위협 판정과 자동 차단을 묶는 컨트롤러.
//!
//! ```text
//! process_packet ─▶ ThreatDetector.analyze ─(위협)─▶ PacketFilter.block ─▶ 통계
//!                                                        ▲
//!                  주기적 정리: 유휴 흐름 제거 + 만료 차단 해제 ┘
//! ```

pub mod controller;
pub mod stats;

pub use controller::{FirewallController, FirewallControllerBuilder};
pub use stats::{FirewallStats, SweepReport};
