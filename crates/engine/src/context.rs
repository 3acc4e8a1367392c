//! 실행 컨텍스트
//!
//! [`TestContext`]는 결과 원장, 리소스 원장, 취소 토큰을 묶어
//! 시나리오와 부하 생성기에 참조로 전달됩니다. 복제해도 같은 원장을 공유합니다.

use std::sync::Arc;

use faascheck_core::ledger::ResultLedger;
use faascheck_core::types::{Issue, TestOutcome};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::warn;

use crate::resources::{CleanupReport, ResourceLedger, ResourceReleaser};

/// 한 번의 하네스 실행에 대한 공유 상태
#[derive(Clone)]
pub struct TestContext {
    run_id: String,
    results: Arc<ResultLedger>,
    resources: Arc<ResourceLedger>,
    releaser: Arc<dyn ResourceReleaser>,
    cancel: CancellationToken,
    background: TaskTracker,
}

impl TestContext {
    /// 새 실행 컨텍스트를 만듭니다.
    pub fn new(releaser: Arc<dyn ResourceReleaser>) -> Self {
        let run_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_owned();
        Self {
            run_id,
            results: Arc::new(ResultLedger::new()),
            resources: Arc::new(ResourceLedger::new()),
            releaser,
            cancel: CancellationToken::new(),
            background: TaskTracker::new(),
        }
    }

    /// 외부 취소 토큰을 연결합니다.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 실행 식별자 (8자리)
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// 실행별로 겹치지 않는 리소스 이름을 만듭니다.
    ///
    /// 게이트웨이 콜백 경로와 클러스터 오브젝트 이름에 모두 쓸 수 있도록
    /// 소문자, 숫자, `-`만 사용합니다.
    pub fn unique_name(&self, prefix: &str) -> String {
        format!("fc-{prefix}-{}", self.run_id)
    }

    /// 결과 원장
    pub fn results(&self) -> &Arc<ResultLedger> {
        &self.results
    }

    /// 리소스 원장
    pub fn resources(&self) -> &Arc<ResourceLedger> {
        &self.resources
    }

    /// 리소스 삭제 구현
    pub fn releaser(&self) -> &Arc<dyn ResourceReleaser> {
        &self.releaser
    }

    /// 취소 토큰
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 시나리오 Drop에서 시작된 백그라운드 정리 작업
    pub(crate) fn background(&self) -> &TaskTracker {
        &self.background
    }

    /// 실행이 취소되었는지 반환합니다.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 테스트 결과를 기록합니다.
    pub fn record(&self, outcome: TestOutcome) {
        self.results.record(outcome);
    }

    /// 이슈를 기록합니다.
    pub fn record_issue(&self, issue: Issue) {
        self.results.record_issue(issue);
    }

    /// 성능 메트릭을 기록합니다. 이미 있는 이름이면 경고만 남깁니다.
    pub fn record_metric(&self, name: &str, value: f64) {
        if let Err(e) = self.results.record_metric(name, value) {
            warn!(error = %e, "performance metric dropped");
        }
    }

    /// 남은 모든 리소스를 정리합니다. 종료 직전에 호출합니다.
    ///
    /// 백그라운드 정리가 잡아 둔 항목은 그 작업이 끝날 때까지 기다린 뒤 셉니다.
    pub async fn sweep(&self) -> CleanupReport {
        self.background.close();
        self.background.wait().await;
        self.resources.release_all(self.releaser.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use faascheck_core::error::FaascheckError;
    use faascheck_core::types::{ResourceHandle, ResourceKind};

    use super::*;
    use crate::resources::ReleaseOutcome;
    use crate::resources::tests::RecordingReleaser;

    #[test]
    fn clones_share_ledgers() {
        let ctx = TestContext::new(Arc::new(RecordingReleaser::default()));
        let other = ctx.clone();
        other.record(TestOutcome::pass("a.1", "x", "unit", "200", "200"));
        assert_eq!(ctx.results().counts().total, 1);
        assert_eq!(ctx.run_id(), other.run_id());
    }

    #[test]
    fn unique_names_embed_run_id() {
        let ctx = TestContext::new(Arc::new(RecordingReleaser::default()));
        let name = ctx.unique_name("echo");
        assert!(name.starts_with("fc-echo-"));
        assert!(name.ends_with(ctx.run_id()));
        assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn duplicate_metric_is_dropped_not_fatal() {
        let ctx = TestContext::new(Arc::new(RecordingReleaser::default()));
        ctx.record_metric("build_time_ms", 1200.0);
        ctx.record_metric("build_time_ms", 900.0);
        assert_eq!(ctx.results().metric("build_time_ms"), Some(1200.0));
    }

    #[tokio::test]
    async fn sweep_releases_everything_left() {
        let releaser = Arc::new(RecordingReleaser::default());
        let ctx = TestContext::new(releaser.clone());
        ctx.resources()
            .register("a", ResourceHandle::new(ResourceKind::ChatRoom, "1"));
        ctx.resources()
            .register("b", ResourceHandle::new(ResourceKind::Callback, "2"));

        let report = ctx.sweep().await;
        assert_eq!(report.released, 2);
        assert!(ctx.resources().outstanding(None).is_empty());
    }

    /// 삭제마다 잠시 멈추는 releaser
    struct SlowReleaser(Arc<RecordingReleaser>);

    impl ResourceReleaser for SlowReleaser {
        fn handles(&self, kind: ResourceKind) -> bool {
            self.0.handles(kind)
        }

        fn release<'a>(
            &'a self,
            handle: &'a ResourceHandle,
        ) -> faascheck_core::BoxFuture<'a, Result<ReleaseOutcome, FaascheckError>> {
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                self.0.release(handle).await
            })
        }
    }

    #[tokio::test]
    async fn sweep_waits_for_background_release() {
        let recorder = Arc::new(RecordingReleaser::default());
        let ctx = TestContext::new(Arc::new(SlowReleaser(recorder.clone())));
        ctx.resources()
            .register("s", ResourceHandle::new(ResourceKind::ChatRoom, "1"));

        let background = ctx.clone();
        ctx.background().spawn(async move {
            background
                .resources()
                .release_scope("s", background.releaser().as_ref())
                .await;
        });
        // 백그라운드 작업이 항목을 잡고 삭제 중인 상태
        tokio::task::yield_now().await;

        let report = ctx.sweep().await;
        assert!(report.is_clean());
        assert_eq!(recorder.order(), vec!["1"]);
        assert!(ctx.resources().outstanding(None).is_empty());
    }

    #[test]
    fn external_cancellation_is_observed() {
        let token = CancellationToken::new();
        let ctx = TestContext::new(Arc::new(RecordingReleaser::default()))
            .with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
