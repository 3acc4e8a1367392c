//! 결과 원장: 테스트 결과, 이슈, 성능 메트릭의 추가 전용 기록
//!
//! [`ResultLedger`]는 실행 중에는 쓰기만 하고, 실행이 끝나면
//! [`LedgerSnapshot`]으로 리포터에 넘겨집니다.
//!
//! 카운터는 결과 추가와 같은 잠금 구간에서 갱신되므로
//! `total == passed + failed + skipped`가 모든 시점에 성립합니다.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::metrics as m;
use crate::types::{Issue, OutcomeStatus, PerformanceMetric, TestOutcome};

/// 결과 상태별 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    /// 전체 결과 수
    pub total: usize,
    /// 통과 수
    pub passed: usize,
    /// 실패 수
    pub failed: usize,
    /// 건너뜀 수
    pub skipped: usize,
}

impl OutcomeCounts {
    fn add(&mut self, status: OutcomeStatus) {
        self.total += 1;
        match status {
            OutcomeStatus::Pass => self.passed += 1,
            OutcomeStatus::Fail => self.failed += 1,
            OutcomeStatus::Skip => self.skipped += 1,
        }
    }

    /// 통과율(%)을 반환합니다. 결과가 없으면 0입니다.
    #[allow(clippy::cast_precision_loss)]
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passed as f64 * 100.0 / self.total as f64
    }
}

/// 리포터에 넘겨지는 원장 스냅샷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// 스냅샷 생성 시각
    pub generated_at: DateTime<Utc>,
    /// 상태별 집계
    #[serde(flatten)]
    pub counts: OutcomeCounts,
    /// 통과율 (%)
    pub pass_rate: f64,
    /// 전체 결과 목록 (기록 순서)
    pub outcomes: Vec<TestOutcome>,
    /// 발견된 이슈
    pub issues: Vec<Issue>,
    /// 성능 메트릭
    pub metrics: Vec<PerformanceMetric>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    counts: OutcomeCounts,
    outcomes: Vec<TestOutcome>,
    issues: Vec<Issue>,
    metrics: Vec<PerformanceMetric>,
}

/// 추가 전용 결과 원장
///
/// 여러 태스크에서 동시에 기록할 수 있도록 내부를 잠금으로 보호합니다.
#[derive(Debug, Default)]
pub struct ResultLedger {
    inner: Mutex<LedgerInner>,
}

impl ResultLedger {
    /// 빈 원장을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 테스트 결과를 추가하고 갱신된 집계를 반환합니다.
    pub fn record(&self, outcome: TestOutcome) -> OutcomeCounts {
        match outcome.status {
            OutcomeStatus::Pass => info!(
                id = %outcome.id,
                name = %outcome.name,
                duration_ms = outcome.duration_ms,
                "PASS"
            ),
            OutcomeStatus::Fail => warn!(
                id = %outcome.id,
                name = %outcome.name,
                expected = %outcome.expected,
                actual = %outcome.actual,
                message = outcome.message.as_deref().unwrap_or(""),
                "FAIL"
            ),
            OutcomeStatus::Skip => info!(
                id = %outcome.id,
                name = %outcome.name,
                message = outcome.message.as_deref().unwrap_or(""),
                "SKIP"
            ),
        }

        metrics::counter!(m::OUTCOMES_TOTAL, m::LABEL_STATUS => outcome.status.to_string())
            .increment(1);

        let mut inner = self.lock();
        inner.counts.add(outcome.status);
        inner.outcomes.push(outcome);
        inner.counts
    }

    /// 이슈를 추가합니다.
    pub fn record_issue(&self, issue: Issue) {
        warn!(severity = %issue.severity, title = %issue.title, "issue discovered");
        metrics::counter!(m::ISSUES_TOTAL, m::LABEL_SEVERITY => issue.severity.to_string())
            .increment(1);
        self.lock().issues.push(issue);
    }

    /// 성능 메트릭을 기록합니다.
    ///
    /// 같은 이름은 실행당 한 번만 기록할 수 있습니다.
    pub fn record_metric(&self, name: impl Into<String>, value: f64) -> Result<(), LedgerError> {
        let name = name.into();
        let mut inner = self.lock();
        if inner.metrics.iter().any(|metric| metric.name == name) {
            return Err(LedgerError::DuplicateMetric { name });
        }
        debug!(name = %name, value, "performance metric recorded");
        inner.metrics.push(PerformanceMetric { name, value });
        Ok(())
    }

    /// 현재 집계를 반환합니다.
    pub fn counts(&self) -> OutcomeCounts {
        self.lock().counts
    }

    /// 실패 결과가 하나라도 있는지 반환합니다.
    pub fn has_failures(&self) -> bool {
        self.lock().counts.failed > 0
    }

    /// 이름으로 기록된 메트릭 값을 조회합니다.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.lock()
            .metrics
            .iter()
            .find(|metric| metric.name == name)
            .map(|metric| metric.value)
    }

    /// 원장 전체의 스냅샷을 생성합니다.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let inner = self.lock();
        LedgerSnapshot {
            generated_at: Utc::now(),
            counts: inner.counts,
            pass_rate: inner.counts.pass_rate(),
            outcomes: inner.outcomes.clone(),
            issues: inner.issues.clone(),
            metrics: inner.metrics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::Severity;

    fn outcome(id: &str, status: OutcomeStatus) -> TestOutcome {
        match status {
            OutcomeStatus::Pass => TestOutcome::pass(id, "probe", "unit", "200", "200"),
            OutcomeStatus::Fail => TestOutcome::fail(id, "probe", "unit", "200", "500"),
            OutcomeStatus::Skip => TestOutcome::skip(id, "probe", "unit", "200", "n/a"),
        }
    }

    #[test]
    fn empty_ledger_has_zero_counts() {
        let ledger = ResultLedger::new();
        let counts = ledger.counts();
        assert_eq!(counts, OutcomeCounts::default());
        assert_eq!(counts.pass_rate(), 0.0);
        assert!(!ledger.has_failures());
    }

    #[test]
    fn totals_hold_after_every_record() {
        let ledger = ResultLedger::new();
        let statuses = [
            OutcomeStatus::Pass,
            OutcomeStatus::Fail,
            OutcomeStatus::Skip,
            OutcomeStatus::Pass,
            OutcomeStatus::Skip,
        ];
        for (i, status) in statuses.iter().enumerate() {
            let counts = ledger.record(outcome(&format!("T-{i}"), *status));
            assert_eq!(counts.total, counts.passed + counts.failed + counts.skipped);
            assert_eq!(counts.total, i + 1);
        }
        let counts = ledger.counts();
        assert_eq!(counts.passed, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.skipped, 2);
        assert!(ledger.has_failures());
    }

    #[test]
    fn skip_does_not_count_as_failure() {
        let ledger = ResultLedger::new();
        ledger.record(outcome("T-1", OutcomeStatus::Skip));
        ledger.record(outcome("T-2", OutcomeStatus::Pass));
        assert!(!ledger.has_failures());
        assert_eq!(ledger.counts().pass_rate(), 50.0);
    }

    #[test]
    fn metric_recorded_at_most_once() {
        let ledger = ResultLedger::new();
        ledger.record_metric("build_time_ms", 4200.0).unwrap();
        let err = ledger.record_metric("build_time_ms", 10.0).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateMetric { .. }));
        assert_eq!(ledger.metric("build_time_ms"), Some(4200.0));
    }

    #[test]
    fn snapshot_preserves_record_order() {
        let ledger = ResultLedger::new();
        ledger.record(outcome("A", OutcomeStatus::Pass));
        ledger.record(outcome("B", OutcomeStatus::Fail));
        ledger.record_issue(Issue::new(Severity::High, "duplicate path accepted", "409 expected"));
        ledger.record_metric("p95_latency_ms", 87.0).unwrap();

        let snapshot = ledger.snapshot();
        let ids: Vec<&str> = snapshot.outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(snapshot.issues.len(), 1);
        assert_eq!(snapshot.metrics.len(), 1);
        assert_eq!(snapshot.pass_rate, 50.0);
    }

    #[test]
    fn snapshot_serializes_flat_counts() {
        let ledger = ResultLedger::new();
        ledger.record(outcome("A", OutcomeStatus::Pass));
        let json = serde_json::to_value(ledger.snapshot()).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["passed"], 1);
        assert_eq!(json["outcomes"][0]["status"], "PASS");
    }

    #[tokio::test]
    async fn concurrent_records_keep_invariant() {
        let ledger = Arc::new(ResultLedger::new());
        let mut handles = Vec::new();
        for worker in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let status = if i % 3 == 0 {
                        OutcomeStatus::Fail
                    } else {
                        OutcomeStatus::Pass
                    };
                    let counts = ledger.record(outcome(&format!("W{worker}-{i}"), status));
                    assert_eq!(counts.total, counts.passed + counts.failed + counts.skipped);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(ledger.counts().total, 400);
    }
}
