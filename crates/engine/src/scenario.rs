//! 시나리오 오케스트레이터
//!
//! 시나리오는 순서가 정해진 의존 단계의 나열입니다.
//!
//! ```text
//! Setup -> Linked -> Deployed -> Invoked -> Verified -> TornDown
//!    \________\__________\__________\__________\------> Failed
//! ```
//!
//! 각 단계는 결과 하나를 원장에 기록합니다. 단계가 실패하면 해당 시나리오의
//! 남은 단계만 건너뛰고, 형제 시나리오는 영향을 받지 않습니다.
//! 등록된 리소스는 [`Scenario::finish`]에서 항상 정리되며,
//! `finish` 없이 드롭되면 백그라운드 정리를 시작합니다.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use faascheck_core::error::ProbeError;
use faascheck_core::types::{ProbeResult, ResourceHandle, TestOutcome};
use tracing::{debug, info, warn};

use crate::context::TestContext;
use crate::gateway::{DeployStatus, GatewayClient};
use crate::poller::{PollVerdict, StatePoller};
use crate::probe::Probe;
use crate::resources::CleanupReport;

/// 시나리오 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    /// 리소스 생성 단계
    Setup,
    /// 리소스 연결 완료
    Linked,
    /// 배포 완료
    Deployed,
    /// 호출 완료
    Invoked,
    /// 검증 완료
    Verified,
    /// 정리 완료
    TornDown,
    /// 단계 실패 (흡수 상태)
    Failed,
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Linked => "linked",
            Self::Deployed => "deployed",
            Self::Invoked => "invoked",
            Self::Verified => "verified",
            Self::TornDown => "torn_down",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 단계 정의
#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    expected: String,
    advance: Option<ScenarioState>,
}

impl Step {
    /// 이름과 기대값으로 단계를 정의합니다.
    pub fn new(name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: expected.into(),
            advance: None,
        }
    }

    /// 성공 시 전이할 상태를 지정합니다.
    pub fn advancing(mut self, state: ScenarioState) -> Self {
        self.advance = Some(state);
        self
    }
}

/// 성공한 단계의 결과값과 관측값
#[derive(Debug, Clone)]
pub struct Observed<T> {
    value: T,
    actual: String,
}

impl<T> Observed<T> {
    /// 결과값과 실제 관측값
    pub fn new(value: T, actual: impl Into<String>) -> Self {
        Self {
            value,
            actual: actual.into(),
        }
    }
}

/// 단계 본문의 반환 타입
pub type StepResult<T> = Result<Observed<T>, StepFailure>;

/// 성공한 단계 결과를 만듭니다.
pub fn observed<T>(value: T, actual: impl Into<String>) -> StepResult<T> {
    Ok(Observed::new(value, actual))
}

/// 실패 또는 건너뛴 단계
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    skip: bool,
    actual: String,
    message: Option<String>,
}

impl StepFailure {
    /// FAIL로 기록되는 실패
    pub fn fail(actual: impl Into<String>) -> Self {
        Self {
            skip: false,
            actual: actual.into(),
            message: None,
        }
    }

    /// SKIP으로 기록되는 미결 (환경 의존적 결과 등)
    pub fn skip(actual: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            skip: true,
            actual: actual.into(),
            message: Some(message.into()),
        }
    }

    /// 메시지를 덧붙입니다.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// SKIP인지 반환합니다.
    pub fn is_skip(&self) -> bool {
        self.skip
    }

    /// 실제 관측값
    pub fn actual(&self) -> &str {
        &self.actual
    }

    /// 기대한 상태 코드가 아닌 응답
    pub fn unexpected_status(result: &ProbeResult) -> Self {
        Self::fail(result.status_code.to_string()).with_message(truncate(&result.body, 200))
    }
}

impl From<ProbeError> for StepFailure {
    fn from(err: ProbeError) -> Self {
        Self::fail(err.outcome_label()).with_message(err.to_string())
    }
}

/// 상태 코드가 기대값과 같은지 확인합니다.
pub fn expect_status(result: &ProbeResult, expected: u16) -> Result<(), StepFailure> {
    if result.has_status(expected) {
        Ok(())
    } else {
        Err(StepFailure::unexpected_status(result))
    }
}

/// 상태 코드가 허용 목록에 있는지 확인합니다.
pub fn expect_status_in(result: &ProbeResult, allowed: &[u16]) -> Result<(), StepFailure> {
    if allowed.contains(&result.status_code) {
        Ok(())
    } else {
        Err(StepFailure::unexpected_status(result))
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

/// 실행 중인 시나리오
pub struct Scenario {
    ctx: TestContext,
    id: String,
    category: String,
    state: ScenarioState,
    steps: u32,
    finished: bool,
}

impl Scenario {
    /// 시나리오를 시작합니다.
    pub fn begin(ctx: &TestContext, id: impl Into<String>, category: impl Into<String>) -> Self {
        let id = id.into();
        info!(scenario = %id, "scenario started");
        Self {
            ctx: ctx.clone(),
            id,
            category: category.into(),
            state: ScenarioState::Setup,
            steps: 0,
            finished: false,
        }
    }

    /// 시나리오 식별자
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 현재 상태
    pub fn state(&self) -> ScenarioState {
        self.state
    }

    /// 실패 상태인지 반환합니다.
    pub fn is_failed(&self) -> bool {
        self.state == ScenarioState::Failed
    }

    /// 실행 컨텍스트
    pub fn context(&self) -> &TestContext {
        &self.ctx
    }

    fn next_id(&mut self) -> String {
        self.steps += 1;
        format!("{}.{}", self.id, self.steps)
    }

    /// 단계 하나를 실행하고 결과를 기록합니다.
    ///
    /// 이미 실패했거나 실행이 취소된 시나리오에서는 실행하지도, 기록하지도 않습니다.
    /// 실행 중 취소되면 SKIP으로 기록하고 시나리오를 멈춥니다.
    pub async fn step<T, F>(&mut self, step: Step, fut: F) -> Option<T>
    where
        F: Future<Output = StepResult<T>>,
    {
        if self.is_failed() || self.ctx.is_cancelled() {
            debug!(scenario = %self.id, step = %step.name, "step not executed");
            return None;
        }

        let id = self.next_id();
        let started = Instant::now();
        let cancel = self.ctx.cancel_token().clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(StepFailure::skip("interrupted", "run interrupted before step completed"))
            }
            result = fut => result,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(passed) => {
                self.ctx.record(
                    TestOutcome::pass(&id, &step.name, &self.category, &step.expected, passed.actual)
                        .with_duration_ms(duration_ms),
                );
                if let Some(next) = step.advance {
                    debug!(scenario = %self.id, from = %self.state, to = %next, "scenario advanced");
                    self.state = next;
                }
                Some(passed.value)
            }
            Err(failure) => {
                let outcome = if failure.skip {
                    TestOutcome::skip(&id, &step.name, &self.category, &step.expected, failure.actual)
                } else {
                    TestOutcome::fail(&id, &step.name, &self.category, &step.expected, failure.actual)
                };
                let outcome = match failure.message {
                    Some(message) => outcome.with_message(message),
                    None => outcome,
                };
                self.ctx.record(outcome.with_duration_ms(duration_ms));
                if !failure.skip || cancel.is_cancelled() {
                    self.state = ScenarioState::Failed;
                }
                None
            }
        }
    }

    /// 정리 대상 리소스를 등록합니다.
    pub fn track(&self, handle: ResourceHandle) {
        self.ctx.resources().register(&self.id, handle);
    }

    /// 빌드가 종료 상태(`deployed` 또는 `failed`)에 도달할 때까지 기다립니다.
    ///
    /// 빌드 실패와 타임아웃은 서로 다른 `actual` 값으로 기록됩니다.
    /// 성공하면 빌드에 걸린 시간(ms)을 반환합니다.
    pub async fn await_deploy<P: Probe>(
        &mut self,
        gateway: &GatewayClient<P>,
        callback_id: i64,
        poller: &StatePoller,
    ) -> Option<u64> {
        let step = Step::new("await build completion", "deployed")
            .advancing(ScenarioState::Deployed);
        self.step(step, async {
            let outcome = poller
                .await_state(
                    move || gateway.callback_status(callback_id),
                    DeployStatus::is_build_terminal,
                )
                .await;
            let elapsed_ms = outcome.elapsed.as_millis() as u64;
            match outcome.verdict(|s| *s == DeployStatus::Deployed) {
                PollVerdict::Reached => observed(elapsed_ms, "deployed"),
                PollVerdict::OtherTerminal => {
                    let status = outcome.state.unwrap_or(DeployStatus::Unknown);
                    Err(StepFailure::fail(status.as_str())
                        .with_message(format!("build reached terminal status '{status}'")))
                }
                PollVerdict::TimedOut => {
                    let last = outcome
                        .state
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "none".to_owned());
                    Err(StepFailure::fail("timeout").with_message(format!(
                        "no terminal build status within {}s (last observed: {last})",
                        poller.timeout().as_secs()
                    )))
                }
            }
        })
        .await
    }

    /// 시나리오를 끝내고 등록된 리소스를 정리합니다.
    pub async fn finish(mut self) -> (ScenarioState, CleanupReport) {
        self.finished = true;
        let report = self
            .ctx
            .resources()
            .release_scope(&self.id, self.ctx.releaser().as_ref())
            .await;
        if !self.is_failed() {
            self.state = ScenarioState::TornDown;
        }
        info!(
            scenario = %self.id,
            state = %self.state,
            released = report.released,
            already_gone = report.already_gone,
            failed = report.failed,
            "scenario finished"
        );
        (self.state, report)
    }
}

impl Drop for Scenario {
    fn drop(&mut self) {
        if self.finished || self.ctx.resources().outstanding(Some(&self.id)).is_empty() {
            return;
        }
        warn!(scenario = %self.id, "scenario dropped without teardown, releasing in background");
        let ctx = self.ctx.clone();
        let scope = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let background = ctx.background().clone();
                background.spawn_on(
                    async move {
                        ctx.resources()
                            .release_scope(&scope, ctx.releaser().as_ref())
                            .await;
                    },
                    &handle,
                );
            }
            Err(_) => {
                warn!(scenario = %scope, "no runtime available, leaving resources to final sweep");
            }
        }
    }
}
