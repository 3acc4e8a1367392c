//! 배포 해제 스위트
//!
//! `status=false`로 배포를 해제한 뒤 같은 경로 호출은 404 또는 405여야 합니다.
//! 200이 돌아오면 해제된 함수가 여전히 실행되는 것이므로 Critical 이슈입니다.

use faascheck_core::types::{Issue, Severity};

use super::SuiteRunner;
use super::steps::{create_callback, deploy, invoke_expect_ok};
use crate::error::EngineError;
use crate::gateway::{Backend, Callback, DeployStatus, NewCallback};
use crate::probe::{HttpMethod, Probe};
use crate::scenario::{
    Scenario, ScenarioState, Step, StepFailure, expect_status, expect_status_in, observed,
};

pub(crate) async fn run<P: Probe>(runner: &SuiteRunner<P>) -> Result<(), EngineError> {
    let backend = runner.primary_backend();
    let mut scenario = Scenario::begin(runner.context(), format!("undeploy-{backend}"), "undeploy");
    steps(runner, &mut scenario, backend).await;
    scenario.finish().await;
    Ok(())
}

async fn steps<P: Probe>(runner: &SuiteRunner<P>, scenario: &mut Scenario, backend: Backend) {
    let ctx = runner.context();
    let gateway = runner.gateway();
    let path = ctx.unique_name("undeploy");

    let callback = NewCallback::echo(&path, &runner.config().target.runtime);
    let Some(callback_id) = create_callback(scenario, gateway, &callback).await else {
        return;
    };
    let poller = runner.build_poller();
    if deploy(scenario, gateway, callback_id, backend, &poller)
        .await
        .is_none()
    {
        return;
    }
    if invoke_expect_ok(scenario, gateway, backend, &path, "invoke while deployed")
        .await
        .is_none()
    {
        return;
    }

    scenario
        .step(Step::new("undeploy", "200 and status undeployed"), async {
            let result = gateway.deploy(callback_id, false, backend).await?;
            expect_status(&result, 200)?;
            let after = gateway.get_callback(callback_id).await?;
            expect_status(&after, 200)?;
            let cb: Callback = after.decode()?;
            if cb.status != DeployStatus::Undeployed {
                return Err(StepFailure::fail(cb.status.as_str()));
            }
            observed((), "undeployed")
        })
        .await;

    scenario
        .step(
            Step::new("invoke after undeploy", "404 or 405").advancing(ScenarioState::Verified),
            async {
                let result = gateway.invoke(backend, &path, HttpMethod::Get, None).await?;
                if result.has_status(200) {
                    ctx.record_issue(Issue::new(
                        Severity::Critical,
                        "Undeployed function still invocable",
                        format!(
                            "GET {}/{path} returned 200 after POST /deploy/ with status=false",
                            backend.invoke_prefix()
                        ),
                    ));
                }
                expect_status_in(&result, &[404, 405])?;
                observed((), result.status_code.to_string())
            },
        )
        .await;
}
