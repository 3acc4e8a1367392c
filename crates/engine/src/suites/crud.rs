//! 챗룸/콜백 CRUD 스위트
//!
//! 생성, 조회, 수정, 목록, 삭제 후 404, 중복 경로 거부(409),
//! 잘못된 본문 거부(422)를 확인합니다.

use faascheck_core::types::{Issue, ProbeResult, ResourceHandle, ResourceKind, Severity};
use serde_json::json;

use super::SuiteRunner;
use super::steps::{create_callback, create_room, expect_gone};
use crate::context::TestContext;
use crate::error::EngineError;
use crate::gateway::{Callback, ChatRoom, NewCallback};
use crate::probe::Probe;
use crate::scenario::{Scenario, ScenarioState, Step, StepFailure, expect_status, observed};

const SCENARIO: &str = "crud";

pub(crate) async fn run<P: Probe>(runner: &SuiteRunner<P>) -> Result<(), EngineError> {
    let mut scenario = Scenario::begin(runner.context(), SCENARIO, "crud");
    steps(runner, &mut scenario).await;
    scenario.finish().await;
    Ok(())
}

/// 거부되어야 했지만 받아들여진 콜백도 정리 대상으로 등록합니다.
fn track_accepted(ctx: &TestContext, result: &ProbeResult) {
    if let Ok(cb) = result.decode::<Callback>() {
        ctx.resources().register(
            SCENARIO,
            ResourceHandle::new(ResourceKind::Callback, cb.callback_id.to_string()),
        );
    }
}

async fn steps<P: Probe>(runner: &SuiteRunner<P>, scenario: &mut Scenario) {
    let ctx = runner.context();
    let gateway = runner.gateway();
    let title = ctx.unique_name("room");
    let path = ctx.unique_name("crud");
    let runtime = runner.config().target.runtime.clone();

    let Some(chat_id) = create_room(scenario, gateway, &title).await else {
        return;
    };

    scenario
        .step(Step::new("get chatroom", "200 with same title"), async {
            let result = gateway.get_room(chat_id).await?;
            expect_status(&result, 200)?;
            let room: ChatRoom = result.decode()?;
            if room.title != title {
                return Err(StepFailure::fail(room.title).with_message("title mismatch"));
            }
            observed((), "200")
        })
        .await;

    let renamed = format!("{title}-renamed");
    scenario
        .step(Step::new("update chatroom", "200 with new title"), async {
            let result = gateway.update_room(chat_id, &renamed).await?;
            expect_status(&result, 200)?;
            let room: ChatRoom = result.decode()?;
            if room.title != renamed {
                return Err(StepFailure::fail(room.title).with_message("title not updated"));
            }
            observed((), "200")
        })
        .await;

    scenario
        .step(Step::new("list chatrooms", "listing contains room"), async {
            let result = gateway.list_rooms().await?;
            expect_status(&result, 200)?;
            let rooms: Vec<ChatRoom> = result.decode()?;
            if !rooms.iter().any(|r| r.chat_id == chat_id) {
                return Err(StepFailure::fail(format!(
                    "{} rooms without {chat_id}",
                    rooms.len()
                )));
            }
            observed((), format!("{} rooms", rooms.len()))
        })
        .await;

    let callback = NewCallback::echo(&path, &runtime).linked_to(chat_id);
    let Some(callback_id) = create_callback(scenario, gateway, &callback).await else {
        return;
    };

    scenario
        .step(Step::new("get callback", "200 with same path"), async {
            let result = gateway.get_callback(callback_id).await?;
            expect_status(&result, 200)?;
            let cb: Callback = result.decode()?;
            if cb.path != path {
                return Err(StepFailure::fail(cb.path).with_message("path mismatch"));
            }
            observed((), format!("200 {}", cb.status))
        })
        .await;

    scenario
        .step(Step::new("lookup callback by path", "200 same callback_id"), async {
            let result = gateway.callback_by_path(&path).await?;
            expect_status(&result, 200)?;
            let cb: Callback = result.decode()?;
            if cb.callback_id != callback_id {
                return Err(StepFailure::fail(cb.callback_id.to_string()));
            }
            observed((), "200")
        })
        .await;

    scenario
        .step(Step::new("update callback code", "200"), async {
            let code = "def lambda_handler(event, context):\n    return {\"updated\": True}\n";
            let result = gateway
                .update_callback(callback_id, json!({ "code": code }))
                .await?;
            expect_status(&result, 200)?;
            observed((), "200")
        })
        .await;

    scenario
        .step(Step::new("list callbacks", "listing contains callback"), async {
            let result = gateway.list_callbacks().await?;
            expect_status(&result, 200)?;
            let callbacks: Vec<Callback> = result.decode()?;
            if !callbacks.iter().any(|c| c.callback_id == callback_id) {
                return Err(StepFailure::fail(format!(
                    "{} callbacks without {callback_id}",
                    callbacks.len()
                )));
            }
            observed((), format!("{} callbacks", callbacks.len()))
        })
        .await;

    let duplicate = NewCallback::echo(&path, &runtime);
    scenario
        .step(Step::new("reject duplicate path", "409"), async {
            let result = gateway.create_callback(&duplicate).await?;
            match result.status_code {
                409 => observed((), "409"),
                200 => {
                    track_accepted(ctx, &result);
                    ctx.record_issue(Issue::new(
                        Severity::High,
                        "Duplicate callback path accepted",
                        format!(
                            "POST /callbacks/ accepted a second callback for path '{path}', \
                             making /api/{path} ambiguous"
                        ),
                    ));
                    Err(StepFailure::fail("200").with_message("duplicate path accepted"))
                }
                _ => Err(StepFailure::unexpected_status(&result)),
            }
        })
        .await;

    scenario
        .step(Step::new("reject invalid callback body", "422"), async {
            let result = gateway
                .create_callback_raw(json!({ "path": ctx.unique_name("invalid") }))
                .await?;
            if result.has_status(200) {
                track_accepted(ctx, &result);
            }
            expect_status(&result, 422)?;
            observed((), "422")
        })
        .await;

    scenario
        .step(Step::new("delete callback", "200 then 404"), async {
            let result = gateway.delete_callback(callback_id).await?;
            expect_status(&result, 200)?;
            let after = gateway.get_callback(callback_id).await?;
            expect_gone(after.status_code, &after.body)
        })
        .await;

    scenario
        .step(
            Step::new("delete chatroom", "200 then 404").advancing(ScenarioState::Verified),
            async {
                let result = gateway.delete_room(chat_id).await?;
                expect_status(&result, 200)?;
                let after = gateway.get_room(chat_id).await?;
                expect_gone(after.status_code, &after.body)
            },
        )
        .await;
}
