//! 메모리 내 게이트웨이를 대상으로 한 스위트 통합 테스트
//!
//! 게이트웨이의 HTTP 계약(연쇄 삭제, 빌드 중 삭제 거부, 배포 해제 후 404)을
//! 흉내 내는 프로브로 전체 스위트를 실행하고, 결과 원장과 정리 상태를 확인합니다.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use faascheck_core::config::FaascheckConfig;
use faascheck_core::error::ProbeError;
use faascheck_core::types::{OutcomeStatus, ProbeResult, Severity};
use faascheck_engine::{
    EngineError, GatewayClient, GatewayReleaser, HttpMethod, Probe, RequestSpec, StatePoller,
    Suite, SuiteRunner, TestContext,
};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct FakeCallback {
    path: String,
    method: String,
    runtime: String,
    chat_id: Option<i64>,
    status: &'static str,
    build_polls_left: u32,
    /// 챗룸 삭제 후 아직 남아 있는 조회 횟수
    orphan_polls_left: Option<u32>,
}

#[derive(Debug, Default)]
struct GatewayState {
    next_id: i64,
    rooms: BTreeMap<i64, String>,
    callbacks: BTreeMap<i64, FakeCallback>,
}

/// 동작 결함을 하나씩 켤 수 있는 메모리 내 게이트웨이
#[derive(Debug, Default)]
struct FakeGateway {
    state: Mutex<GatewayState>,
    no_cascade: bool,
    /// 연쇄 삭제가 반영되기 전까지 콜백이 보이는 조회 횟수
    cascade_lag_polls: u32,
    /// 배포 요청이 빌드를 거치지 않고 바로 완료됨
    instant_build: bool,
    /// 필수 필드가 빠진 콜백 등록도 받아들임
    lenient_validation: bool,
    invocable_after_undeploy: bool,
    down: bool,
}

fn reply(status_code: u16, body: Value) -> ProbeResult {
    ProbeResult {
        body: body.to_string(),
        status_code,
        latency_ms: 3,
    }
}

fn not_found() -> ProbeResult {
    reply(404, json!({ "detail": "Not Found" }))
}

fn callback_json(id: i64, cb: &FakeCallback) -> Value {
    json!({
        "callback_id": id,
        "path": cb.path,
        "method": cb.method,
        "type": cb.runtime,
        "status": cb.status,
        "chat_id": cb.chat_id,
    })
}

impl FakeGateway {
    fn healthy() -> Self {
        Self::default()
    }

    fn leftovers(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.rooms.len(), state.callbacks.len())
    }

    /// 빌드 중인 콜백은 접근될 때마다 한 단계씩 진행합니다.
    fn tick(cb: &mut FakeCallback) {
        if cb.status == "build" {
            if cb.build_polls_left == 0 {
                cb.status = "deployed";
            } else {
                cb.build_polls_left -= 1;
            }
        }
    }

    fn handle(&self, spec: &RequestSpec) -> ProbeResult {
        let mut state = self.state.lock().unwrap();
        let body = spec.body.clone().unwrap_or(Value::Null);
        let segments: Vec<&str> = spec.path.trim_matches('/').split('/').collect();

        match (spec.method, segments.as_slice()) {
            (HttpMethod::Get, ["health"]) => reply(200, json!({ "status": "healthy" })),

            (HttpMethod::Post, ["chatroom"]) => {
                state.next_id += 1;
                let id = state.next_id;
                let title = body["title"].as_str().unwrap_or_default().to_owned();
                state.rooms.insert(id, title.clone());
                reply(200, json!({ "chat_id": id, "title": title }))
            }
            (HttpMethod::Get, ["chatroom"]) => {
                let rooms: Vec<Value> = state
                    .rooms
                    .iter()
                    .map(|(id, title)| json!({ "chat_id": id, "title": title }))
                    .collect();
                reply(200, Value::Array(rooms))
            }
            (method, ["chatroom", id]) => {
                let id: i64 = id.parse().unwrap();
                match method {
                    HttpMethod::Get => match state.rooms.get(&id) {
                        Some(title) => reply(200, json!({ "chat_id": id, "title": title })),
                        None => not_found(),
                    },
                    HttpMethod::Put => match state.rooms.get_mut(&id) {
                        Some(title) => {
                            *title = body["title"].as_str().unwrap_or_default().to_owned();
                            reply(200, json!({ "chat_id": id, "title": title }))
                        }
                        None => not_found(),
                    },
                    HttpMethod::Delete => {
                        if state.rooms.remove(&id).is_none() {
                            return not_found();
                        }
                        match (self.no_cascade, self.cascade_lag_polls) {
                            (true, _) => {}
                            (false, 0) => state.callbacks.retain(|_, cb| cb.chat_id != Some(id)),
                            (false, lag) => {
                                for cb in state.callbacks.values_mut() {
                                    if cb.chat_id == Some(id) {
                                        cb.orphan_polls_left = Some(lag);
                                    }
                                }
                            }
                        }
                        reply(200, json!({ "deleted": id }))
                    }
                    HttpMethod::Post => reply(405, json!({ "detail": "Method Not Allowed" })),
                }
            }

            (HttpMethod::Post, ["callbacks"]) => {
                let (path, runtime) = match (
                    body["path"].as_str(),
                    body["type"].as_str(),
                    body["code"].as_str(),
                ) {
                    (Some(path), Some(runtime), Some(_code)) => (path, runtime),
                    (Some(path), runtime, _) if self.lenient_validation => {
                        (path, runtime.unwrap_or("python"))
                    }
                    _ => return reply(422, json!({ "detail": "missing field" })),
                };
                if state.callbacks.values().any(|cb| cb.path == path) {
                    return reply(409, json!({ "detail": "path already registered" }));
                }
                state.next_id += 1;
                let id = state.next_id;
                let cb = FakeCallback {
                    path: path.to_owned(),
                    method: body["method"].as_str().unwrap_or("POST").to_owned(),
                    runtime: runtime.to_owned(),
                    chat_id: body["chat_id"].as_i64(),
                    status: "pending",
                    build_polls_left: 0,
                    orphan_polls_left: None,
                };
                let json = callback_json(id, &cb);
                state.callbacks.insert(id, cb);
                reply(200, json)
            }
            (HttpMethod::Get, ["callbacks"]) => {
                let all: Vec<Value> = state
                    .callbacks
                    .iter()
                    .map(|(id, cb)| callback_json(*id, cb))
                    .collect();
                reply(200, Value::Array(all))
            }
            (HttpMethod::Get, ["callbacks", "path", path]) => state
                .callbacks
                .iter()
                .find(|(_, cb)| cb.path == *path)
                .map(|(id, cb)| reply(200, callback_json(*id, cb)))
                .unwrap_or_else(not_found),
            (method, ["callbacks", id]) => {
                let id: i64 = id.parse().unwrap();
                let Some(cb) = state.callbacks.get_mut(&id) else {
                    return not_found();
                };
                match cb.orphan_polls_left {
                    Some(0) => {
                        state.callbacks.remove(&id);
                        return not_found();
                    }
                    Some(left) => cb.orphan_polls_left = Some(left - 1),
                    None => {}
                }
                Self::tick(cb);
                match method {
                    HttpMethod::Get => reply(200, callback_json(id, cb)),
                    HttpMethod::Put => reply(200, callback_json(id, cb)),
                    HttpMethod::Delete if cb.status == "build" => {
                        reply(400, json!({ "detail": "callback is building" }))
                    }
                    HttpMethod::Delete => {
                        state.callbacks.remove(&id);
                        reply(200, json!({ "deleted": id }))
                    }
                    HttpMethod::Post => reply(405, json!({ "detail": "Method Not Allowed" })),
                }
            }

            (HttpMethod::Post, ["deploy"]) => {
                let id = body["callback_id"].as_i64().unwrap_or_default();
                let Some(cb) = state.callbacks.get_mut(&id) else {
                    return not_found();
                };
                if body["status"].as_bool().unwrap_or(false) && self.instant_build {
                    cb.status = "deployed";
                } else if body["status"].as_bool().unwrap_or(false) {
                    cb.status = "build";
                    cb.build_polls_left = 1;
                } else {
                    cb.status = "undeployed";
                }
                reply(200, json!({ "callback_id": id, "status": cb.status }))
            }

            (method, ["api", rest @ ..]) => {
                let path = match rest {
                    ["kube", path] => *path,
                    [path] => *path,
                    _ => return not_found(),
                };
                if matches!(method, HttpMethod::Put | HttpMethod::Delete) {
                    return reply(405, json!({ "detail": "Method Not Allowed" }));
                }
                let invocable = state.callbacks.values().any(|cb| {
                    cb.path == path
                        && (cb.status == "deployed"
                            || (self.invocable_after_undeploy && cb.status == "undeployed"))
                });
                if invocable {
                    reply(200, json!({ "echo": body }))
                } else {
                    not_found()
                }
            }

            _ => not_found(),
        }
    }
}

impl Probe for FakeGateway {
    async fn execute(&self, spec: &RequestSpec) -> Result<ProbeResult, ProbeError> {
        if self.down {
            return Err(ProbeError::Connection {
                target: spec.target(),
                reason: "connection refused".to_owned(),
            });
        }
        Ok(self.handle(spec))
    }
}

fn fast_config() -> FaascheckConfig {
    let mut config = FaascheckConfig::default();
    config.poller.build_timeout_secs = 5;
    config.poller.interval_ms = 10;
    config.poller.cascade_grace_secs = 1;
    config.poller.delete_race_delay_ms = 5;
    config.load.total_requests = 20;
    config.load.concurrency = 4;
    config.load.warm_invocations = 2;
    config
}

fn runner(gateway: Arc<FakeGateway>, config: FaascheckConfig) -> SuiteRunner<FakeGateway> {
    let client = GatewayClient::new(gateway, Duration::from_secs(5));
    let releaser = GatewayReleaser::new(
        client.clone(),
        StatePoller::new(Duration::from_secs(2), Duration::from_millis(10)),
    );
    let ctx = TestContext::new(Arc::new(releaser));
    SuiteRunner::new(ctx, client, config)
}

#[tokio::test]
async fn conforming_gateway_passes_every_suite_and_leaves_nothing_behind() {
    let gateway = Arc::new(FakeGateway::healthy());
    let runner = runner(gateway.clone(), fast_config());

    runner.run_all(&Suite::ALL).await.unwrap();
    let sweep = runner.context().sweep().await;

    let snapshot = runner.context().results().snapshot();
    let failed: Vec<_> = snapshot
        .outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Fail)
        .collect();
    assert!(failed.is_empty(), "unexpected failures: {failed:#?}");
    assert_eq!(
        snapshot.counts.total,
        snapshot.counts.passed + snapshot.counts.failed + snapshot.counts.skipped
    );
    assert!(snapshot.issues.is_empty());

    assert!(sweep.is_clean());
    assert!(runner.context().resources().outstanding(None).is_empty());
    assert_eq!(gateway.leftovers(), (0, 0));

    let results = runner.context().results();
    for name in [
        "docker_build_time_ms",
        "kube_cold_start_ms",
        "p50_latency_ms",
        "p95_latency_ms",
        "p99_latency_ms",
        "throughput_rps",
    ] {
        assert!(results.metric(name).is_some(), "missing metric {name}");
    }
    assert_eq!(results.metric("success_rate_pct"), Some(100.0));
}

#[tokio::test]
async fn delete_during_build_is_rejected_and_cleaned_up() {
    let gateway = Arc::new(FakeGateway::healthy());
    let runner = runner(gateway.clone(), fast_config());

    runner.run(Suite::DeleteRace).await.unwrap();

    let snapshot = runner.context().results().snapshot();
    let race = snapshot
        .outcomes
        .iter()
        .find(|o| o.name == "delete callback while building")
        .unwrap();
    assert_eq!(race.status, OutcomeStatus::Pass);
    assert_eq!(race.actual, "400");
    assert_eq!(gateway.leftovers(), (0, 0));
}

#[tokio::test]
async fn build_finishing_first_is_skipped_not_failed() {
    let gateway = Arc::new(FakeGateway {
        instant_build: true,
        ..FakeGateway::default()
    });
    let runner = runner(gateway.clone(), fast_config());

    runner.run(Suite::DeleteRace).await.unwrap();
    let sweep = runner.context().sweep().await;

    let snapshot = runner.context().results().snapshot();
    let race = snapshot
        .outcomes
        .iter()
        .find(|o| o.name == "delete callback while building")
        .unwrap();
    assert_eq!(race.status, OutcomeStatus::Skip);
    assert_eq!(race.actual, "200");
    assert_eq!(
        race.message.as_deref(),
        Some("build completed before delete raced it")
    );
    assert_eq!(snapshot.counts.failed, 0);
    assert!(sweep.is_clean());
    assert_eq!(gateway.leftovers(), (0, 0));
}

#[tokio::test]
async fn lagging_cascade_passes_within_grace() {
    let gateway = Arc::new(FakeGateway {
        cascade_lag_polls: 1,
        ..FakeGateway::default()
    });
    let mut config = fast_config();
    config.target.backends = vec!["docker".to_owned()];
    let runner = runner(gateway.clone(), config);

    runner
        .run_all(&[Suite::Lifecycle, Suite::Cascade])
        .await
        .unwrap();
    runner.context().sweep().await;

    let snapshot = runner.context().results().snapshot();
    for name in ["linked callback removed", "delete chatroom cascades to callback"] {
        let outcome = snapshot.outcomes.iter().find(|o| o.name == name).unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Pass, "{name}: {outcome:?}");
        assert_eq!(outcome.actual, "404");
    }
    assert_eq!(snapshot.counts.failed, 0);
    assert_eq!(gateway.leftovers(), (0, 0));
}

#[tokio::test]
async fn unreachable_gateway_aborts_the_run() {
    let gateway = Arc::new(FakeGateway {
        down: true,
        ..FakeGateway::default()
    });
    let runner = runner(gateway, fast_config());

    let err = runner.run_all(&Suite::ALL).await.unwrap_err();
    assert!(matches!(err, EngineError::EnvironmentUnavailable { .. }));

    let snapshot = runner.context().results().snapshot();
    assert_eq!(snapshot.counts.total, 1);
    assert_eq!(snapshot.counts.failed, 1);
    assert_eq!(snapshot.issues[0].severity, Severity::Critical);
}

#[tokio::test]
async fn missing_cascade_fails_only_its_scenario() {
    let gateway = Arc::new(FakeGateway {
        no_cascade: true,
        ..FakeGateway::default()
    });
    let mut config = fast_config();
    config.target.backends = vec!["docker".to_owned()];
    let runner = runner(gateway.clone(), config);

    runner.run_all(&[Suite::Cascade, Suite::Routing]).await.unwrap();
    runner.context().sweep().await;

    let snapshot = runner.context().results().snapshot();
    let cascade_fail = snapshot
        .outcomes
        .iter()
        .find(|o| o.status == OutcomeStatus::Fail)
        .unwrap();
    assert_eq!(cascade_fail.name, "linked callback removed");
    assert!(
        snapshot
            .outcomes
            .iter()
            .filter(|o| o.category == "routing")
            .all(|o| o.status == OutcomeStatus::Pass)
    );
    // 연쇄 삭제되지 않은 콜백도 원장 정리로 제거됩니다.
    assert_eq!(gateway.leftovers(), (0, 0));
}

#[tokio::test]
async fn wrongly_accepted_invalid_callback_is_cleaned_up() {
    let gateway = Arc::new(FakeGateway {
        lenient_validation: true,
        ..FakeGateway::default()
    });
    let runner = runner(gateway.clone(), fast_config());

    runner.run(Suite::Crud).await.unwrap();
    let sweep = runner.context().sweep().await;

    let snapshot = runner.context().results().snapshot();
    let invalid = snapshot
        .outcomes
        .iter()
        .find(|o| o.name == "reject invalid callback body")
        .unwrap();
    assert_eq!(invalid.status, OutcomeStatus::Fail);
    assert_eq!(invalid.actual, "200");
    assert!(sweep.is_clean());
    assert_eq!(gateway.leftovers(), (0, 0));
}

#[tokio::test]
async fn invocable_after_undeploy_is_a_critical_issue() {
    let gateway = Arc::new(FakeGateway {
        invocable_after_undeploy: true,
        ..FakeGateway::default()
    });
    let runner = runner(gateway.clone(), fast_config());

    runner.run(Suite::Undeploy).await.unwrap();

    let snapshot = runner.context().results().snapshot();
    assert_eq!(snapshot.counts.failed, 1);
    assert!(
        snapshot
            .issues
            .iter()
            .any(|i| i.severity == Severity::Critical && i.title == "Undeployed function still invocable")
    );
    assert_eq!(gateway.leftovers(), (0, 0));
}

#[tokio::test]
async fn cancelled_run_stops_before_the_next_suite() {
    let gateway = Arc::new(FakeGateway::healthy());
    let runner = runner(gateway.clone(), fast_config());
    runner.context().cancel_token().cancel();

    let err = runner.run_all(&Suite::ALL).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(runner.context().results().counts().total, 0);
    assert_eq!(gateway.leftovers(), (0, 0));
}
