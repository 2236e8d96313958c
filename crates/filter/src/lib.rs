//! # ironwall-filter
//!
//! 출발지 주소 차단 목록과 방화벽 백엔드.
//!
//! - [`PacketFilter`]: 차단 목록(주소당 하나의 [`BlockEntry`])과 만료 처리
//! - [`FilterBackend`]: 룰 설치 추상화 ([`IptablesBackend`], [`SimulatedBackend`])
//! - [`AnyBackend`]: 설정의 `backend` 값으로 선택되는 백엔드
//!
//! 백엔드를 쓸 수 없으면 필터는 시뮬레이션 모드로 전환하고 계속 동작합니다.

pub mod backend;
pub mod config;
pub mod error;
pub mod filter;

pub use backend::{AnyBackend, FilterBackend, IpFamily, IptablesBackend, SimulatedBackend};
pub use config::{BackendKind, PacketFilterConfig};
pub use error::FilterError;
pub use filter::{BlockEntry, FilterMode, PacketFilter};
