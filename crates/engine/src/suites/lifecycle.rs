//! 배포 생명주기 스위트
//!
//! 백엔드마다 챗룸 생성, 콜백 연결, 배포, 빌드 대기, 콜드/웜 호출,
//! 챗룸 삭제 후 유예 시간 안에 콜백 404 확인까지 한 시나리오로 실행합니다.
//! 빌드 시간과 콜드 스타트 지연은 백엔드 이름을 붙인 성능 메트릭으로 남습니다.

use super::SuiteRunner;
use super::steps::{
    await_callback_gone, create_callback, create_room, deploy, invoke_expect_ok,
};
use crate::error::EngineError;
use crate::gateway::{Backend, NewCallback};
use crate::poller::StatePoller;
use crate::probe::{HttpMethod, Probe};
use crate::scenario::{Scenario, ScenarioState, Step, expect_status, observed};
use crate::stats::summarize;

pub(crate) async fn run<P: Probe>(runner: &SuiteRunner<P>) -> Result<(), EngineError> {
    for backend in runner.backends() {
        if runner.context().is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let mut scenario =
            Scenario::begin(runner.context(), format!("lifecycle-{backend}"), "lifecycle");
        steps(runner, &mut scenario, backend).await;
        scenario.finish().await;
    }
    Ok(())
}

async fn steps<P: Probe>(runner: &SuiteRunner<P>, scenario: &mut Scenario, backend: Backend) {
    let ctx = runner.context();
    let gateway = runner.gateway();
    let config = runner.config();
    let path = ctx.unique_name(&format!("life-{backend}"));

    let Some(chat_id) = create_room(scenario, gateway, &ctx.unique_name("life")).await else {
        return;
    };
    let callback = NewCallback::echo(&path, &config.target.runtime).linked_to(chat_id);
    let Some(callback_id) = create_callback(scenario, gateway, &callback).await else {
        return;
    };

    let poller = runner.build_poller();
    let Some(build_ms) = deploy(scenario, gateway, callback_id, backend, &poller).await else {
        return;
    };
    ctx.record_metric(&format!("{backend}_build_time_ms"), build_ms as f64);

    let Some(cold_ms) = invoke_expect_ok(scenario, gateway, backend, &path, "cold invocation").await
    else {
        return;
    };
    ctx.record_metric(&format!("{backend}_cold_start_ms"), cold_ms as f64);

    let warm_runs = config.load.warm_invocations;
    let warm = scenario
        .step(
            Step::new(format!("{warm_runs} warm invocations"), "200 each")
                .advancing(ScenarioState::Invoked),
            async {
                let mut latencies = Vec::with_capacity(warm_runs);
                for _ in 0..warm_runs {
                    let result = gateway.invoke(backend, &path, HttpMethod::Get, None).await?;
                    expect_status(&result, 200)?;
                    latencies.push(result.latency_ms);
                }
                observed(latencies, format!("{warm_runs} x 200"))
            },
        )
        .await;
    let Some(warm) = warm else {
        return;
    };
    if let Ok(summary) = summarize(&warm) {
        ctx.record_metric(&format!("{backend}_warm_mean_ms"), summary.mean);
    }

    let cascade = StatePoller::for_cascade(&config.poller);
    scenario
        .step(
            Step::new("delete chatroom cascades to callback", "404 within grace")
                .advancing(ScenarioState::Verified),
            async {
                let result = gateway.delete_room(chat_id).await?;
                expect_status(&result, 200)?;
                await_callback_gone(gateway, callback_id, &cascade).await
            },
        )
        .await;
}
