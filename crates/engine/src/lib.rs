//! faascheck 시나리오 엔진
//!
//! 게이트웨이의 HTTP 표면을 호출하고 비동기 상태 전이를 기다리며,
//! 모든 결과를 [`TestContext`]의 원장에 기록합니다.
//!
//! # 모듈 구조
//!
//! - [`probe`]: 타임드 프로브 (`Probe` 트레이트, `TimedProbe`)
//! - [`poller`]: 제한 시간이 있는 상태 폴러
//! - [`stats`]: 지연 시간 백분위수 요약
//! - [`load`]: 제한된 동시성의 부하 생성기
//! - [`resources`]: 리소스 원장과 정리 트레이트
//! - [`context`]: 실행 단위 컨텍스트
//! - [`scenario`]: 단계별 시나리오 오케스트레이터
//! - [`gateway`]: 게이트웨이 API 타입 클라이언트
//! - [`suites`]: 게이트웨이 검증 스위트
//!
//! # 흐름
//!
//! ```text
//! SuiteRunner --> Scenario.step() --> GatewayClient --> Probe
//!                     |        \
//!                     |         StatePoller (빌드, 연쇄 삭제)
//!                     v
//!               ResultLedger        ResourceLedger --> ResourceReleaser
//! ```

pub mod context;
pub mod error;
pub mod gateway;
pub mod load;
pub mod poller;
pub mod probe;
pub mod resources;
pub mod scenario;
pub mod stats;
pub mod suites;

#[cfg(test)]
mod testing;

// --- 주요 타입 re-export ---

pub use context::TestContext;
pub use error::EngineError;
pub use gateway::{Backend, Callback, ChatRoom, DeployStatus, GatewayClient, NewCallback};
pub use load::{LoadGenerator, LoadPlan, LoadReport, LoadSample};
pub use poller::{PollOutcome, PollVerdict, StatePoller};
pub use probe::{HttpMethod, Probe, RequestSpec, TimedProbe};
pub use resources::{
    CleanupReport, CompositeReleaser, GatewayReleaser, ReleaseOutcome, ResourceLedger,
    ResourceReleaser,
};
pub use scenario::{Observed, Scenario, ScenarioState, Step, StepFailure, StepResult, observed};
pub use stats::{LatencySummary, summarize, summarize_samples};
pub use suites::{Suite, SuiteRunner};
