//! 빌드 중 삭제 스위트
//!
//! 배포 요청을 별도 태스크로 띄운 뒤 잠시 후 같은 콜백을 삭제합니다.
//! 빌드 중 삭제는 400이어야 하지만, 빌드가 먼저 끝나 삭제가 200으로
//! 성공하는 경우는 빌드 시간을 통제할 수 없으므로 SKIP으로 남깁니다.
//! 배포 태스크는 결과를 판정하는 지점에서 명시적으로 join합니다.

use faascheck_core::error::ProbeError;
use faascheck_core::types::ProbeResult;
use tokio_util::task::AbortOnDropHandle;
use tracing::debug;

use super::SuiteRunner;
use super::steps::create_callback;
use crate::error::EngineError;
use crate::gateway::NewCallback;
use crate::probe::Probe;
use crate::scenario::{Scenario, ScenarioState, Step, StepFailure, observed};

pub(crate) async fn run<P: Probe>(runner: &SuiteRunner<P>) -> Result<(), EngineError> {
    let backend = runner.primary_backend();
    let mut scenario =
        Scenario::begin(runner.context(), format!("delete-race-{backend}"), "delete_race");
    steps(runner, &mut scenario).await;
    scenario.finish().await;
    Ok(())
}

/// 배포 태스크 결과를 설명하는 문구
fn describe_deploy(
    joined: Result<Result<ProbeResult, ProbeError>, tokio::task::JoinError>,
) -> String {
    match joined {
        Ok(Ok(result)) if result.has_status(200) => {
            "build completed before delete raced it".to_owned()
        }
        Ok(Ok(result)) => format!(
            "delete completed before the build started (deploy returned {})",
            result.status_code
        ),
        Ok(Err(e)) => format!("deploy request did not complete: {e}"),
        Err(e) => format!("deploy task failed: {e}"),
    }
}

async fn steps<P: Probe>(runner: &SuiteRunner<P>, scenario: &mut Scenario) {
    let ctx = runner.context();
    let gateway = runner.gateway();
    let backend = runner.primary_backend();
    let delay = runner.config().poller.delete_race_delay();

    let callback = NewCallback::echo(ctx.unique_name("race"), &runner.config().target.runtime);
    let Some(callback_id) = create_callback(scenario, gateway, &callback).await else {
        return;
    };

    let deployer = gateway.clone();
    let mut deploy_task = AbortOnDropHandle::new(tokio::spawn(async move {
        deployer.deploy(callback_id, true, backend).await
    }));

    scenario
        .step(
            Step::new("delete callback while building", "400").advancing(ScenarioState::Verified),
            async {
                tokio::time::sleep(delay).await;
                let result = gateway.delete_callback(callback_id).await?;
                match result.status_code {
                    400 => {
                        let joined = (&mut deploy_task).await;
                        debug!(outcome = %describe_deploy(joined), "deploy task joined");
                        observed((), "400")
                    }
                    200 => {
                        let joined = (&mut deploy_task).await;
                        Err(StepFailure::skip("200", describe_deploy(joined)))
                    }
                    _ => Err(StepFailure::unexpected_status(&result)),
                }
            },
        )
        .await;

    // 판정에 쓰이지 않은 경우에도 태스크를 남기지 않습니다.
    if !deploy_task.is_finished() {
        let _ = (&mut deploy_task).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_first_is_described_for_skip() {
        let joined = Ok(Ok(ProbeResult {
            body: "{}".to_owned(),
            status_code: 200,
            latency_ms: 10,
        }));
        assert_eq!(describe_deploy(joined), "build completed before delete raced it");
    }

    #[test]
    fn deploy_404_means_delete_won_outright() {
        let joined = Ok(Ok(ProbeResult {
            body: "{}".to_owned(),
            status_code: 404,
            latency_ms: 10,
        }));
        assert!(describe_deploy(joined).contains("before the build started"));
    }
}
