//! 부하 스위트
//!
//! 기본 백엔드에 함수를 배포한 뒤 [`LoadGenerator`]로 고정 개수의 요청을
//! 보내고 지연 시간 백분위수와 처리량을 성능 메트릭으로 남깁니다.
//! 통계는 실패한 요청까지 포함한 전체 샘플로 계산합니다.

use faascheck_core::types::{Issue, Severity};

use super::SuiteRunner;
use super::steps::{create_callback, deploy};
use crate::error::EngineError;
use crate::gateway::{GatewayClient, NewCallback};
use crate::load::{LoadGenerator, LoadPlan, LoadReport};
use crate::probe::{HttpMethod, Probe};
use crate::scenario::{Scenario, ScenarioState, Step, StepFailure, observed};

pub(crate) async fn run<P: Probe>(runner: &SuiteRunner<P>) -> Result<(), EngineError> {
    let backend = runner.primary_backend();
    let mut scenario = Scenario::begin(runner.context(), format!("load-{backend}"), "load");
    steps(runner, &mut scenario).await;
    scenario.finish().await;
    Ok(())
}

/// 부하 결과가 수집 개수와 백분위수 순서를 만족하는지 확인합니다.
fn check_report(report: &LoadReport, plan: LoadPlan) -> Result<(), StepFailure> {
    let summary = &report.summary;
    let actual = format!(
        "{} samples, p50={} p95={} p99={}",
        report.samples, summary.p50, summary.p95, summary.p99
    );
    if report.samples != plan.total_requests {
        return Err(StepFailure::fail(actual)
            .with_message(format!("expected {} samples", plan.total_requests)));
    }
    if !(summary.p50 <= summary.p95 && summary.p95 <= summary.p99) {
        return Err(StepFailure::fail(actual).with_message("percentiles out of order"));
    }
    Ok(())
}

async fn steps<P: Probe>(runner: &SuiteRunner<P>, scenario: &mut Scenario) {
    let ctx = runner.context();
    let gateway = runner.gateway();
    let config = runner.config();
    let backend = runner.primary_backend();
    let path = ctx.unique_name("load");

    let callback = NewCallback::echo(&path, &config.target.runtime);
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

    let plan = LoadPlan::from(&config.load);
    let generator = LoadGenerator::new(gateway.probe().clone(), plan)
        .with_cancellation(ctx.cancel_token().clone());
    let spec = GatewayClient::<P>::invoke_spec(backend, &path, HttpMethod::Get, None);

    let report = scenario
        .step(
            Step::new(
                format!("{} requests over {} workers", plan.total_requests, plan.concurrency),
                format!("{} samples, p99 >= p95 >= p50", plan.total_requests),
            )
            .advancing(ScenarioState::Verified),
            async {
                let report = generator
                    .run(&spec)
                    .await
                    .map_err(|e| StepFailure::fail("no samples").with_message(e.to_string()))?;
                check_report(&report, plan)?;
                let actual = format!(
                    "{} samples, {:.1}% success",
                    report.samples,
                    report.success_rate()
                );
                observed(report, actual)
            },
        )
        .await;
    let Some(report) = report else {
        return;
    };

    let summary = &report.summary;
    ctx.record_metric("p50_latency_ms", summary.p50 as f64);
    ctx.record_metric("p95_latency_ms", summary.p95 as f64);
    ctx.record_metric("p99_latency_ms", summary.p99 as f64);
    ctx.record_metric("mean_latency_ms", summary.mean);
    ctx.record_metric("min_latency_ms", summary.min as f64);
    ctx.record_metric("max_latency_ms", summary.max as f64);
    ctx.record_metric("throughput_rps", report.throughput_rps);
    ctx.record_metric("success_rate_pct", report.success_rate());

    if let Some(budget) = config.load.p95_budget_ms {
        if summary.p95 > budget {
            ctx.record_issue(Issue::new(
                Severity::Medium,
                "p95 latency over budget",
                format!(
                    "{backend} p95 latency {}ms exceeds the {budget}ms budget",
                    summary.p95
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::stats::summarize;

    fn report(latencies: &[u64]) -> LoadReport {
        LoadReport {
            samples: latencies.len(),
            successes: latencies.len(),
            failures: 0,
            summary: summarize(latencies).unwrap(),
            throughput_rps: 10.0,
            elapsed: Duration::from_secs(1),
        }
    }

    fn plan(total: usize) -> LoadPlan {
        LoadPlan {
            total_requests: total,
            concurrency: 2,
            expected_status: 200,
        }
    }

    #[test]
    fn complete_report_passes() {
        let latencies: Vec<u64> = (1..=20).collect();
        assert!(check_report(&report(&latencies), plan(20)).is_ok());
    }

    #[test]
    fn short_sample_count_fails() {
        let latencies: Vec<u64> = (1..=15).collect();
        let failure = check_report(&report(&latencies), plan(20)).unwrap_err();
        assert!(!failure.is_skip());
        assert!(failure.actual().starts_with("15 samples"));
    }
}
