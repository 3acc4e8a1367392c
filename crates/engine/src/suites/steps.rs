//! 여러 스위트가 공유하는 단계

use faascheck_core::error::ProbeError;
use faascheck_core::types::{ResourceHandle, ResourceKind};
use serde_json::json;

use crate::gateway::{Backend, Callback, ChatRoom, GatewayClient, NewCallback};
use crate::probe::{HttpMethod, Probe};
use crate::poller::{PollVerdict, StatePoller};
use crate::scenario::{
    Scenario, ScenarioState, Step, StepFailure, StepResult, expect_status, observed,
};

/// 챗룸을 만들고 정리 대상으로 등록합니다.
pub(crate) async fn create_room<P: Probe>(
    scenario: &mut Scenario,
    gateway: &GatewayClient<P>,
    title: &str,
) -> Option<i64> {
    let chat_id = scenario
        .step(
            Step::new("create chatroom", "200 with chat_id").advancing(ScenarioState::Setup),
            async {
                let result = gateway.create_room(title).await?;
                expect_status(&result, 200)?;
                let room: ChatRoom = result.decode()?;
                observed(room.chat_id, format!("200 chat_id={}", room.chat_id))
            },
        )
        .await?;
    scenario.track(ResourceHandle::new(
        ResourceKind::ChatRoom,
        chat_id.to_string(),
    ));
    Some(chat_id)
}

/// 콜백을 등록하고 정리 대상으로 등록합니다.
pub(crate) async fn create_callback<P: Probe>(
    scenario: &mut Scenario,
    gateway: &GatewayClient<P>,
    callback: &NewCallback,
) -> Option<i64> {
    let linked = callback.chat_id.is_some();
    let step = Step::new("register callback", "200 with callback_id");
    let step = if linked {
        step.advancing(ScenarioState::Linked)
    } else {
        step
    };
    let callback_id = scenario
        .step(step, async {
            let result = gateway.create_callback(callback).await?;
            expect_status(&result, 200)?;
            let created: Callback = result.decode()?;
            observed(
                created.callback_id,
                format!("200 callback_id={}", created.callback_id),
            )
        })
        .await?;
    scenario.track(ResourceHandle::new(
        ResourceKind::Callback,
        callback_id.to_string(),
    ));
    Some(callback_id)
}

/// 배포를 요청하고 빌드 완료까지 기다립니다. 빌드 시간(ms)을 반환합니다.
pub(crate) async fn deploy<P: Probe>(
    scenario: &mut Scenario,
    gateway: &GatewayClient<P>,
    callback_id: i64,
    backend: Backend,
    poller: &StatePoller,
) -> Option<u64> {
    scenario
        .step(
            Step::new(format!("request {backend} deploy"), "200"),
            async {
                let result = gateway.deploy(callback_id, true, backend).await?;
                expect_status(&result, 200)?;
                observed((), "200")
            },
        )
        .await?;
    scenario.await_deploy(gateway, callback_id, poller).await
}

/// 배포된 함수를 호출하고 200을 기대합니다. 지연 시간(ms)을 반환합니다.
pub(crate) async fn invoke_expect_ok<P: Probe>(
    scenario: &mut Scenario,
    gateway: &GatewayClient<P>,
    backend: Backend,
    path: &str,
    step_name: &str,
) -> Option<u64> {
    let run_id = scenario.context().run_id().to_owned();
    scenario
        .step(Step::new(step_name, "200"), async {
            let result = gateway
                .invoke(
                    backend,
                    path,
                    HttpMethod::Post,
                    Some(json!({ "probe": run_id })),
                )
                .await?;
            expect_status(&result, 200)?;
            observed(result.latency_ms, "200")
        })
        .await
}

/// 응답 상태가 404인지 확인하는 단계 본문
pub(crate) fn expect_gone(status: u16, body: &str) -> StepResult<()> {
    if status == 404 {
        observed((), "404")
    } else {
        let excerpt: String = body.chars().take(200).collect();
        Err(StepFailure::fail(status.to_string()).with_message(excerpt))
    }
}

/// 챗룸 삭제 후 연결된 콜백이 유예 시간 안에 404가 되는지 폴링하는 단계 본문
///
/// 삭제 직후의 조회 결과는 판정에 쓰지 않습니다.
pub(crate) async fn await_callback_gone<P: Probe>(
    gateway: &GatewayClient<P>,
    callback_id: i64,
    poller: &StatePoller,
) -> StepResult<()> {
    let outcome = poller
        .await_state(
            move || async move {
                let result = gateway.get_callback(callback_id).await?;
                Ok::<u16, ProbeError>(result.status_code)
            },
            |status| *status == 404,
        )
        .await;
    match (outcome.verdict(|status| *status == 404), outcome.state) {
        (PollVerdict::Reached, _) => observed((), "404"),
        (_, Some(status)) => Err(StepFailure::fail(status.to_string()).with_message(format!(
            "callback {callback_id} still present {}ms after chatroom delete",
            poller.timeout().as_millis()
        ))),
        (_, None) => Err(StepFailure::fail("no response")
            .with_message("callback lookup never answered during the grace period")),
    }
}
