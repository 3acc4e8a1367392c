//! faascheck 공통 크레이트
//!
//! 게이트웨이 검증 하네스의 모든 크레이트가 공유하는 타입을 제공합니다.
//!
//! - [`types`]: 테스트 결과, 이슈, 리소스 핸들 등 도메인 타입
//! - [`ledger`]: 추가 전용 결과 원장
//! - [`error`]: 에러 계층
//! - [`config`]: `faascheck.toml` 설정
//! - [`metrics`]: 메트릭 이름 상수

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ClusterError, ConfigError, FaascheckError, LedgerError, ProbeError};

// 설정
pub use config::FaascheckConfig;

// 결과 원장
pub use ledger::{LedgerSnapshot, OutcomeCounts, ResultLedger};

// 도메인 타입
pub use types::{
    Issue, LatencySample, OutcomeStatus, PerformanceMetric, ProbeResult, ResourceHandle,
    ResourceKind, Severity, TestOutcome,
};

/// 트레이트 객체에서 사용하는 박싱된 Future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
