//! 장애 스위트
//!
//! 장애 유형마다 시나리오 하나를 실행합니다.
//!
//! | 결과 | 기록 |
//! |---|---|
//! | 시그니처 감지 | PASS |
//! | 감지 창 안에 미감지 | SKIP (유형별 사유) |
//! | 백엔드가 표현할 수 없는 유형 | SKIP |
//! | 제출 실패 | FAIL |
//! | 백엔드 연결 불가 | 실행 중단 (`EnvironmentUnavailable`) |

use faascheck_core::config::ChaosConfig;
use faascheck_core::types::{Issue, Severity, TestOutcome};
use faascheck_engine::{
    EngineError, Scenario, ScenarioState, Step, StepFailure, TestContext, observed,
};
use tracing::info;

use crate::cluster::ClusterClient;
use crate::error::ChaosError;
use crate::fault::{FaultKind, FaultSpec};
use crate::injector::FaultInjector;

const CATEGORY: &str = "faults";
const EVENT_LIMIT: usize = 5;

/// 장애 유형들을 순서대로 주입하고 감지 결과를 기록합니다.
pub async fn run_faults<C: ClusterClient>(
    ctx: &TestContext,
    injector: &FaultInjector<C>,
    config: &ChaosConfig,
    kinds: &[FaultKind],
) -> Result<(), EngineError> {
    let backend = injector.client().backend();
    if !reachable(ctx, injector).await {
        return Err(EngineError::unavailable(
            "cluster",
            format!("{backend} backend did not respond"),
        ));
    }

    for &kind in kinds {
        if ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let mut scenario = Scenario::begin(ctx, format!("fault-{kind}"), CATEGORY);
        let name = ctx.unique_name(&kind.as_str().replace('_', "-"));
        let spec = FaultSpec::from_config(kind, name, config);
        let lost = fault_steps(&mut scenario, injector, &spec).await;
        scenario.finish().await;
        if let Some(reason) = lost {
            return Err(EngineError::unavailable("cluster", reason));
        }
    }
    info!(backend, faults = kinds.len(), "fault suite finished");
    Ok(())
}

async fn reachable<C: ClusterClient>(ctx: &TestContext, injector: &FaultInjector<C>) -> bool {
    let mut scenario = Scenario::begin(ctx, "fault-backend", CATEGORY);
    let backend = injector.client().backend();
    let ok = scenario
        .step(
            Step::new(format!("{backend} backend reachable"), "ping ok"),
            async {
                injector
                    .client()
                    .ping()
                    .await
                    .map_err(|e| StepFailure::fail("unreachable").with_message(e.to_string()))?;
                observed((), "ping ok")
            },
        )
        .await
        .is_some();
    scenario.finish().await;
    if !ok && !ctx.is_cancelled() {
        ctx.record_issue(unavailable_issue(backend));
    }
    ok
}

/// 백엔드 클라이언트를 만들지 못했을 때 연결 실패를 기록합니다.
///
/// 연결 확인 시나리오와 같은 ID로 FAIL 결과와 Critical 이슈를 남깁니다.
pub fn record_backend_unavailable(ctx: &TestContext, backend: &str, reason: &str) {
    ctx.record(
        TestOutcome::fail(
            "fault-backend.1",
            format!("{backend} backend reachable"),
            CATEGORY,
            "ping ok",
            "unreachable",
        )
        .with_message(reason),
    );
    ctx.record_issue(unavailable_issue(backend));
}

fn unavailable_issue(backend: &str) -> Issue {
    Issue::new(
        Severity::Critical,
        "Orchestration backend unavailable",
        format!("the {backend} backend did not answer, fault scenarios were not run"),
    )
}

/// 시나리오 단계를 실행합니다. 백엔드 연결이 끊기면 그 사유를 반환합니다.
async fn fault_steps<C: ClusterClient>(
    scenario: &mut Scenario,
    injector: &FaultInjector<C>,
    spec: &FaultSpec,
) -> Option<String> {
    let kind = spec.kind;
    let mut lost = None;

    let submitted = scenario
        .step(
            Step::new(format!("submit {kind} workload"), "accepted")
                .advancing(ScenarioState::Deployed),
            async {
                match injector.submit(spec).await {
                    Ok(handle) => observed(handle, "accepted"),
                    Err(e @ ChaosError::Unsupported { .. }) => {
                        Err(StepFailure::skip("unsupported", e.to_string()))
                    }
                    Err(e) if e.is_connection() => {
                        lost = Some(e.to_string());
                        Err(StepFailure::fail("unreachable").with_message(e.to_string()))
                    }
                    Err(e) => Err(StepFailure::fail("rejected").with_message(e.to_string())),
                }
            },
        )
        .await;
    let Some(handle) = submitted else {
        return lost;
    };
    scenario.track(handle);

    scenario
        .step(
            Step::new(format!("detect {}", kind.signature()), kind.signature())
                .advancing(ScenarioState::Verified),
            async {
                let detection = injector.detect(spec).await;
                let mut history = detection.observation.events.clone();
                history.truncate(EVENT_LIMIT);
                match detection.signature {
                    Some(signature) => observed((), signature),
                    None => {
                        let mut message = kind.undetected_reason().to_owned();
                        if !history.is_empty() {
                            message.push_str(&format!(" (events: {})", history.join("; ")));
                        }
                        Err(StepFailure::skip(detection.observation.summary(), message))
                    }
                }
            },
        )
        .await;
    lost
}
