//! 환경 확인 스위트
//!
//! 게이트웨이가 응답하지 않으면 이후 스위트는 의미가 없으므로
//! 결과 하나를 기록한 뒤 실행 전체를 중단합니다.

use faascheck_core::types::{Issue, Severity};

use super::SuiteRunner;
use crate::error::EngineError;
use crate::probe::Probe;
use crate::scenario::{Scenario, ScenarioState, Step, StepFailure, expect_status, observed};

pub(crate) async fn run<P: Probe>(runner: &SuiteRunner<P>) -> Result<(), EngineError> {
    let ctx = runner.context();
    let gateway = runner.gateway();
    let mut scenario = Scenario::begin(ctx, "health", "environment");

    let healthy = scenario
        .step(
            Step::new("gateway health check", "200 healthy").advancing(ScenarioState::Verified),
            async {
                let result = gateway.health().await?;
                expect_status(&result, 200)?;
                if !result.body_contains("healthy") {
                    return Err(StepFailure::fail("200 without healthy marker")
                        .with_message(result.body.clone()));
                }
                observed((), "200 healthy")
            },
        )
        .await
        .is_some();
    scenario.finish().await;

    if healthy {
        return Ok(());
    }
    if ctx.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let reason = ctx
        .results()
        .snapshot()
        .outcomes
        .last()
        .and_then(|o| o.message.clone())
        .unwrap_or_else(|| "health check failed".to_owned());
    ctx.record_issue(Issue::new(
        Severity::Critical,
        "Gateway unavailable",
        format!("GET /health did not report a healthy gateway: {reason}"),
    ));
    Err(EngineError::unavailable("gateway", reason))
}
