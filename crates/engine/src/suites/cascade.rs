//! 연쇄 삭제 스위트
//!
//! 챗룸을 지우면 연결된 콜백도 지워져야 합니다. 삭제 전파는 비동기이므로
//! 유예 시간 동안 콜백 조회를 폴링하며, 그 안에 404가 나오면 통과입니다.
//! 삭제 직후의 조회 결과는 판정에 쓰지 않습니다.

use super::SuiteRunner;
use super::steps::{await_callback_gone, create_callback, create_room};
use crate::error::EngineError;
use crate::gateway::NewCallback;
use crate::poller::StatePoller;
use crate::probe::Probe;
use crate::scenario::{Scenario, ScenarioState, Step, expect_status, observed};

pub(crate) async fn run<P: Probe>(runner: &SuiteRunner<P>) -> Result<(), EngineError> {
    let mut scenario = Scenario::begin(runner.context(), "cascade", "cascade");
    steps(runner, &mut scenario).await;
    scenario.finish().await;
    Ok(())
}

async fn steps<P: Probe>(runner: &SuiteRunner<P>, scenario: &mut Scenario) {
    let ctx = runner.context();
    let gateway = runner.gateway();
    let config = runner.config();

    let Some(chat_id) = create_room(scenario, gateway, &ctx.unique_name("cascade")).await else {
        return;
    };
    let callback = NewCallback::echo(ctx.unique_name("cascade"), &config.target.runtime)
        .linked_to(chat_id);
    let Some(callback_id) = create_callback(scenario, gateway, &callback).await else {
        return;
    };

    scenario
        .step(Step::new("delete chatroom", "200"), async {
            let result = gateway.delete_room(chat_id).await?;
            expect_status(&result, 200)?;
            observed((), "200")
        })
        .await;

    let poller = StatePoller::for_cascade(&config.poller);
    scenario
        .step(
            Step::new("linked callback removed", "404 within grace")
                .advancing(ScenarioState::Verified),
            await_callback_gone(gateway, callback_id, &poller),
        )
        .await;
}
