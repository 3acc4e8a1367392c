//! faascheck 장애 주입/감지
//!
//! 오케스트레이션 백엔드에 의도적으로 병적인 작업을 제출하고
//! 실패 시그니처(OOMKilled, ImagePullBackOff, CrashLoopBackOff,
//! DeadlineExceeded, 권한 거부)를 감지합니다.
//!
//! # 모듈 구조
//!
//! - [`error`]: 도메인 에러 (`ChaosError`)
//! - [`fault`]: 장애 유형, 명세, 관측값
//! - [`cluster`]: 백엔드 추상화 (`ClusterClient` 트레이트, `BackendClient`)
//! - [`kubernetes`]: Kubernetes 백엔드 (`KubeClusterClient`)
//! - [`docker`]: Docker 백엔드 (`DockerFaultClient`)
//! - [`injector`]: 주입기/감지기 (`FaultInjector`)
//! - [`releaser`]: 정리 (`ClusterReleaser`)
//! - [`suite`]: 장애 스위트
//!
//! # 흐름
//!
//! ```text
//! run_faults --> FaultInjector.submit() --> ClusterClient.submit()
//!                      |
//!                FaultInjector.detect() --> StatePoller --> ClusterClient.observe()
//!                      |
//!                ResultLedger (PASS / SKIP / FAIL)
//! ```

pub mod cluster;
pub mod docker;
pub mod error;
pub mod fault;
pub mod injector;
pub mod kubernetes;
pub mod releaser;
pub mod suite;

// --- 주요 타입 re-export ---

pub use cluster::{BackendClient, ClusterClient};
pub use docker::DockerFaultClient;
pub use error::ChaosError;
pub use fault::{FaultKind, FaultSpec, Observation, parse_memory};
pub use injector::{Detection, FaultInjector};
pub use kubernetes::KubeClusterClient;
pub use releaser::ClusterReleaser;
pub use suite::{record_backend_unavailable, run_faults};
