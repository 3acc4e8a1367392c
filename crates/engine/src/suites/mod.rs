//! 게이트웨이 시나리오 스위트
//!
//! 각 스위트는 하나 이상의 [`Scenario`](crate::scenario::Scenario)를 실행하고
//! 결과를 [`TestContext`]의 원장에 기록합니다.
//! `health` 스위트가 실패하면 [`EngineError::EnvironmentUnavailable`]로
//! 전체 실행을 중단합니다. 다른 스위트의 실패는 해당 스위트에만 영향을 줍니다.

mod cascade;
mod crud;
mod delete_race;
mod health;
mod lifecycle;
mod load;
mod routing;
mod steps;
mod undeploy;

use std::fmt;
use std::str::FromStr;

use faascheck_core::config::FaascheckConfig;
use tracing::{info, warn};

use crate::context::TestContext;
use crate::error::EngineError;
use crate::gateway::{Backend, GatewayClient};
use crate::poller::StatePoller;
use crate::probe::Probe;

/// 게이트웨이 스위트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suite {
    /// 환경 확인
    Health,
    /// 챗룸/콜백 CRUD와 입력 검증
    Crud,
    /// 배포 생명주기 (백엔드별)
    Lifecycle,
    /// 배포 해제 후 호출 차단
    Undeploy,
    /// 존재하지 않는 경로와 허용되지 않는 메서드
    Routing,
    /// 빌드 중 삭제
    DeleteRace,
    /// 챗룸 삭제의 연쇄 삭제
    Cascade,
    /// 동시 부하
    Load,
}

impl Suite {
    /// 기본 실행 순서
    pub const ALL: [Suite; 8] = [
        Suite::Health,
        Suite::Crud,
        Suite::Lifecycle,
        Suite::Undeploy,
        Suite::Routing,
        Suite::DeleteRace,
        Suite::Cascade,
        Suite::Load,
    ];

    /// 스위트 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Crud => "crud",
            Self::Lifecycle => "lifecycle",
            Self::Undeploy => "undeploy",
            Self::Routing => "routing",
            Self::DeleteRace => "delete_race",
            Self::Cascade => "cascade",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|suite| suite.as_str() == normalized)
            .ok_or_else(|| format!("unknown suite '{s}'"))
    }
}

/// 스위트 실행기
pub struct SuiteRunner<P> {
    ctx: TestContext,
    gateway: GatewayClient<P>,
    config: FaascheckConfig,
}

impl<P: Probe> SuiteRunner<P> {
    /// 실행기를 생성합니다.
    pub fn new(ctx: TestContext, gateway: GatewayClient<P>, config: FaascheckConfig) -> Self {
        Self {
            ctx,
            gateway,
            config,
        }
    }

    /// 실행 컨텍스트
    pub fn context(&self) -> &TestContext {
        &self.ctx
    }

    pub(crate) fn gateway(&self) -> &GatewayClient<P> {
        &self.gateway
    }

    pub(crate) fn config(&self) -> &FaascheckConfig {
        &self.config
    }

    /// 설정된 백엔드 목록. 알 수 없는 이름은 건너뜁니다.
    pub(crate) fn backends(&self) -> Vec<Backend> {
        self.config
            .target
            .backends
            .iter()
            .filter_map(|name| match name.parse() {
                Ok(backend) => Some(backend),
                Err(e) => {
                    warn!(error = %e, "ignoring backend");
                    None
                }
            })
            .collect()
    }

    /// 첫 번째 설정 백엔드 (없으면 docker)
    pub(crate) fn primary_backend(&self) -> Backend {
        self.backends().into_iter().next().unwrap_or(Backend::Docker)
    }

    pub(crate) fn build_poller(&self) -> StatePoller {
        StatePoller::for_build(&self.config.poller)
    }

    /// 스위트 하나를 실행합니다.
    pub async fn run(&self, suite: Suite) -> Result<(), EngineError> {
        if self.ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        info!(suite = %suite, "suite started");
        match suite {
            Suite::Health => health::run(self).await,
            Suite::Crud => crud::run(self).await,
            Suite::Lifecycle => lifecycle::run(self).await,
            Suite::Undeploy => undeploy::run(self).await,
            Suite::Routing => routing::run(self).await,
            Suite::DeleteRace => delete_race::run(self).await,
            Suite::Cascade => cascade::run(self).await,
            Suite::Load => load::run(self).await,
        }
    }

    /// 스위트를 순서대로 실행합니다. 환경 불가 또는 취소 시 즉시 멈춥니다.
    pub async fn run_all(&self, suites: &[Suite]) -> Result<(), EngineError> {
        for &suite in suites {
            self.run(suite).await?;
        }
        Ok(())
    }
}
