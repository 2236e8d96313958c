//! 차단 룰 백엔드 추상화
//!
//! [`FilterBackend`] trait은 실제 방화벽 룰 설치를 추상화합니다.
//! 운영 환경은 [`IptablesBackend`], 권한이 없는 환경과 재생은 [`SimulatedBackend`],
//! 테스트는 `MockBackend`를 사용합니다.
//!
//! ```text
//!        PacketFilter
//!             │
//!             ▼
//!     ┌───────────────┐
//!     │ FilterBackend │ (trait)
//!     └───────────────┘
//!       │      │     │
//!       ▼      ▼     ▼
//!  iptables  simul  mock
//! ```
//!
//! iptables 백엔드는 전용 체인(`IRONWALL`)에 룰을 넣고, 상위 체인(`INPUT`)에서
//! 전용 체인으로 점프하는 룰을 한 번만 설치합니다. 점검은 주소 체계별로
//! 따로 수행되므로 ip6tables가 없어도 IPv4 차단은 동작합니다.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::IpAddr;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{BackendKind, PacketFilterConfig};
use crate::error::FilterError;

/// 주소 체계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl IpFamily {
    /// 모든 주소 체계
    pub const ALL: [Self; 2] = [Self::V4, Self::V6];

    /// 주소가 속한 체계
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "ipv4"),
            Self::V6 => write!(f, "ipv6"),
        }
    }
}

/// 방화벽 룰 백엔드
///
/// 모든 메서드는 `&self`로 호출되며 여러 태스크에서 동시에 호출될 수 있습니다.
pub trait FilterBackend: Send + Sync + 'static {
    /// 백엔드 이름 (로그와 상태 표시용)
    fn name(&self) -> &'static str;

    /// 실제 시스템 룰을 설치하는지 여부
    ///
    /// `false`이면 필터는 처음부터 시뮬레이션 모드로 동작합니다.
    fn installs_rules(&self) -> bool {
        true
    }

    /// 한 주소 체계에 대해 백엔드를 점검하고 필요한 사전 구성을 설치합니다.
    ///
    /// # Errors
    /// 실행 파일이 없거나 권한이 없으면 `FilterError::BackendUnavailable`
    fn probe(&self, family: IpFamily) -> impl Future<Output = Result<(), FilterError>> + Send;

    /// 출발지 주소의 트래픽을 차단하는 룰을 설치합니다.
    fn block(&self, addr: IpAddr) -> impl Future<Output = Result<(), FilterError>> + Send;

    /// 차단 룰을 제거합니다.
    fn unblock(&self, addr: IpAddr) -> impl Future<Output = Result<(), FilterError>> + Send;
}

// ===== iptables =====

/// iptables / ip6tables 하위 프로세스 백엔드
#[derive(Debug, Clone)]
pub struct IptablesBackend {
    iptables_path: String,
    ip6tables_path: String,
    chain: String,
    parent_chain: String,
}

impl IptablesBackend {
    /// 설정에서 백엔드를 생성합니다.
    pub fn new(config: &PacketFilterConfig) -> Self {
        Self {
            iptables_path: config.iptables_path.clone(),
            ip6tables_path: config.ip6tables_path.clone(),
            chain: config.chain.clone(),
            parent_chain: config.parent_chain.clone(),
        }
    }

    fn binary_for(&self, family: IpFamily) -> &str {
        match family {
            IpFamily::V4 => &self.iptables_path,
            IpFamily::V6 => &self.ip6tables_path,
        }
    }

    /// 한 바이너리에 대해 전용 체인과 점프 룰을 준비합니다.
    async fn prepare_chain(&self, binary: &str) -> Result<(), FilterError> {
        match run(binary, &["-L", &self.chain, "-n"], "probe", &self.chain).await {
            Ok(()) => {}
            Err(e) if e.is_unavailable() => return Err(e),
            Err(_) => {
                run(binary, &["-N", &self.chain], "probe", &self.chain).await?;
                info!(binary, chain = %self.chain, "created filter chain");
            }
        }

        let jump: [&str; 4] = ["-C", &self.parent_chain, "-j", &self.chain];
        if run(binary, &jump, "probe", &self.parent_chain).await.is_err() {
            run(
                binary,
                &["-I", &self.parent_chain, "-j", &self.chain],
                "probe",
                &self.parent_chain,
            )
            .await?;
            info!(
                binary,
                parent = %self.parent_chain,
                chain = %self.chain,
                "installed jump rule"
            );
        }
        Ok(())
    }
}

impl FilterBackend for IptablesBackend {
    fn name(&self) -> &'static str {
        "iptables"
    }

    async fn probe(&self, family: IpFamily) -> Result<(), FilterError> {
        // 존재하지 않는 바이너리는 첫 호출에서 BackendUnavailable로 드러난다
        self.prepare_chain(self.binary_for(family)).await
    }

    async fn block(&self, addr: IpAddr) -> Result<(), FilterError> {
        let source = addr.to_string();
        run(
            self.binary_for(IpFamily::of(addr)),
            &["-A", &self.chain, "-s", &source, "-j", "DROP"],
            "block",
            &source,
        )
        .await
    }

    async fn unblock(&self, addr: IpAddr) -> Result<(), FilterError> {
        let source = addr.to_string();
        run(
            self.binary_for(IpFamily::of(addr)),
            &["-D", &self.chain, "-s", &source, "-j", "DROP"],
            "unblock",
            &source,
        )
        .await
    }
}

/// 방화벽 명령을 실행하고 결과를 에러로 분류합니다.
async fn run(
    binary: &str,
    args: &[&str],
    operation: &'static str,
    target: &str,
) -> Result<(), FilterError> {
    debug!(binary, ?args, "running firewall command");

    let output = Command::new(binary)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                FilterError::BackendUnavailable(format!("{binary} not found"))
            }
            io::ErrorKind::PermissionDenied => {
                FilterError::BackendUnavailable(format!("permission denied running {binary}"))
            }
            _ => FilterError::CommandFailed {
                operation,
                address: target.to_owned(),
                reason: e.to_string(),
            },
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if is_permission_error(stderr) {
        return Err(FilterError::BackendUnavailable(format!("{binary}: {stderr}")));
    }
    Err(FilterError::CommandFailed {
        operation,
        address: target.to_owned(),
        reason: format!("{}: {stderr}", output.status),
    })
}

fn is_permission_error(stderr: &str) -> bool {
    stderr.contains("Permission denied") || stderr.contains("must be root")
}

// ===== 시뮬레이션 =====

/// 시스템을 변경하지 않고 차단을 기록만 하는 백엔드
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedBackend;

impl FilterBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn installs_rules(&self) -> bool {
        false
    }

    async fn probe(&self, _family: IpFamily) -> Result<(), FilterError> {
        Ok(())
    }

    async fn block(&self, addr: IpAddr) -> Result<(), FilterError> {
        debug!(%addr, "simulated block");
        Ok(())
    }

    async fn unblock(&self, addr: IpAddr) -> Result<(), FilterError> {
        debug!(%addr, "simulated unblock");
        Ok(())
    }
}

// ===== 설정 기반 선택 =====

/// 설정으로 선택되는 백엔드
#[derive(Debug, Clone)]
pub enum AnyBackend {
    /// iptables
    Iptables(IptablesBackend),
    /// 시뮬레이션
    Simulated(SimulatedBackend),
}

impl AnyBackend {
    /// 설정의 `backend` 값에 맞는 백엔드를 생성합니다.
    pub fn from_config(config: &PacketFilterConfig) -> Self {
        match config.backend {
            BackendKind::Iptables => Self::Iptables(IptablesBackend::new(config)),
            BackendKind::Simulated => Self::Simulated(SimulatedBackend),
        }
    }
}

impl FilterBackend for AnyBackend {
    fn name(&self) -> &'static str {
        match self {
            Self::Iptables(b) => b.name(),
            Self::Simulated(b) => b.name(),
        }
    }

    fn installs_rules(&self) -> bool {
        match self {
            Self::Iptables(b) => b.installs_rules(),
            Self::Simulated(b) => b.installs_rules(),
        }
    }

    async fn probe(&self, family: IpFamily) -> Result<(), FilterError> {
        match self {
            Self::Iptables(b) => b.probe(family).await,
            Self::Simulated(b) => b.probe(family).await,
        }
    }

    async fn block(&self, addr: IpAddr) -> Result<(), FilterError> {
        match self {
            Self::Iptables(b) => b.block(addr).await,
            Self::Simulated(b) => b.block(addr).await,
        }
    }

    async fn unblock(&self, addr: IpAddr) -> Result<(), FilterError> {
        match self {
            Self::Iptables(b) => b.unblock(addr).await,
            Self::Simulated(b) => b.unblock(addr).await,
        }
    }
}

// ===== 테스트용 mock =====

/// 호출을 기록하는 테스트용 백엔드
#[cfg(test)]
#[derive(Default)]
pub struct MockBackend {
    /// (동작, 주소) 호출 기록
    pub calls: parking_lot::Mutex<Vec<(&'static str, IpAddr)>>,
    /// block/unblock 호출을 일시적 실패로 만들지 여부
    pub fail_actions: bool,
    /// block/unblock 호출을 BackendUnavailable로 만들지 여부
    pub unavailable: bool,
    /// probe를 실패시킬지 여부
    pub fail_probe: bool,
    /// 이 주소 체계의 probe만 일시적 실패로 만든다
    pub fail_probe_family: Option<IpFamily>,
    /// 각 호출 전에 대기할 시간
    pub delay: Option<std::time::Duration>,
}

#[cfg(test)]
impl MockBackend {
    /// 항상 성공하는 mock을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// block/unblock이 실패하도록 설정합니다.
    pub fn with_failing_actions(mut self) -> Self {
        self.fail_actions = true;
        self
    }

    /// probe는 통과하지만 이후 호출이 BackendUnavailable을 반환하도록 설정합니다.
    pub fn with_unavailable_actions(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// probe가 실패하도록 설정합니다.
    pub fn with_failing_probe(mut self) -> Self {
        self.fail_probe = true;
        self
    }

    /// 한 주소 체계의 probe만 실패하도록 설정합니다.
    pub fn with_failing_probe_for(mut self, family: IpFamily) -> Self {
        self.fail_probe_family = Some(family);
        self
    }

    /// 호출마다 지연을 추가합니다.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 특정 동작의 호출 횟수
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }

    async fn act(&self, operation: &'static str, addr: IpAddr) -> Result<(), FilterError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push((operation, addr));
        if self.unavailable {
            return Err(FilterError::BackendUnavailable("mock unavailable".to_owned()));
        }
        if self.fail_actions {
            return Err(FilterError::CommandFailed {
                operation,
                address: addr.to_string(),
                reason: "mock failure".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
impl FilterBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn probe(&self, family: IpFamily) -> Result<(), FilterError> {
        if self.fail_probe {
            return Err(FilterError::BackendUnavailable("mock probe failed".to_owned()));
        }
        if self.fail_probe_family == Some(family) {
            return Err(FilterError::CommandFailed {
                operation: "probe",
                address: family.to_string(),
                reason: "can't initialize table".to_owned(),
            });
        }
        Ok(())
    }

    async fn block(&self, addr: IpAddr) -> Result<(), FilterError> {
        self.act("block", addr).await
    }

    async fn unblock(&self, addr: IpAddr) -> Result<(), FilterError> {
        self.act("unblock", addr).await
    }
}
