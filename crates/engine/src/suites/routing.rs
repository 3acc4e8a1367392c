//! 라우팅 스위트
//!
//! 등록되지 않은 경로와 허용되지 않는 메서드에 대한 응답을 확인합니다.
//! 각 확인은 서로 독립이므로 별도 시나리오로 실행합니다.

use super::SuiteRunner;
use crate::error::EngineError;
use crate::gateway::Backend;
use crate::probe::{HttpMethod, Probe};
use crate::scenario::{Scenario, ScenarioState, Step, expect_status_in, observed};

struct Check {
    id: &'static str,
    backend: Backend,
    method: HttpMethod,
    allowed: &'static [u16],
}

const CHECKS: [Check; 4] = [
    Check {
        id: "routing-missing-docker",
        backend: Backend::Docker,
        method: HttpMethod::Get,
        allowed: &[404],
    },
    Check {
        id: "routing-missing-kube",
        backend: Backend::Kube,
        method: HttpMethod::Get,
        allowed: &[404],
    },
    Check {
        id: "routing-put",
        backend: Backend::Docker,
        method: HttpMethod::Put,
        allowed: &[404, 405],
    },
    Check {
        id: "routing-delete",
        backend: Backend::Docker,
        method: HttpMethod::Delete,
        allowed: &[404, 405],
    },
];

pub(crate) async fn run<P: Probe>(runner: &SuiteRunner<P>) -> Result<(), EngineError> {
    let ctx = runner.context();
    let gateway = runner.gateway();
    let missing = ctx.unique_name("missing");

    for check in &CHECKS {
        if ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let expected = check
            .allowed
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        let mut scenario = Scenario::begin(ctx, check.id, "routing");
        scenario
            .step(
                Step::new(
                    format!("{} {}/<unregistered>", check.method, check.backend.invoke_prefix()),
                    expected,
                )
                .advancing(ScenarioState::Verified),
                async {
                    let result = gateway
                        .invoke(check.backend, &missing, check.method, None)
                        .await?;
                    expect_status_in(&result, check.allowed)?;
                    observed((), result.status_code.to_string())
                },
            )
            .await;
        scenario.finish().await;
    }
    Ok(())
}
