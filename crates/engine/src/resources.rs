//! 리소스 원장: 시나리오가 만든 외부 리소스의 정리 보장
//!
//! 프로비저닝에 성공한 리소스는 즉시 [`ResourceLedger::register`]로 등록됩니다.
//! 정리는 시나리오 범위별로 등록 역순(LIFO)으로 실행되며,
//! 같은 핸들을 두 번 정리해도 에러가 아닙니다.
//!
//! 개별 삭제 실패는 로그만 남기고 나머지 정리를 계속합니다.
//! 실패한 항목은 종료 직전의 최종 정리([`ResourceLedger::release_all`])에서
//! 한 번 더 시도됩니다.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use faascheck_core::BoxFuture;
use faascheck_core::error::{FaascheckError, ProbeError};
use faascheck_core::metrics as m;
use faascheck_core::types::{ResourceHandle, ResourceKind};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::gateway::GatewayClient;
use crate::poller::StatePoller;
use crate::probe::Probe;

/// 삭제 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// 이번 호출로 삭제됨
    Deleted,
    /// 이미 없음 (에러 아님)
    AlreadyGone,
}

/// 리소스 종류별 삭제 구현
///
/// 트레이트 객체로 보관되므로 박싱된 Future를 반환합니다.
pub trait ResourceReleaser: Send + Sync {
    /// 이 구현이 삭제할 수 있는 종류인지 반환합니다.
    fn handles(&self, kind: ResourceKind) -> bool;

    /// 리소스 하나를 삭제합니다.
    fn release<'a>(
        &'a self,
        handle: &'a ResourceHandle,
    ) -> BoxFuture<'a, Result<ReleaseOutcome, FaascheckError>>;
}

/// 정리 결과 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// 삭제된 수
    pub released: usize,
    /// 이미 없던 수
    pub already_gone: usize,
    /// 삭제 실패 수
    pub failed: usize,
}

impl CleanupReport {
    /// 실패 없이 끝났는지 반환합니다.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// 다른 집계를 더합니다.
    pub fn merge(&mut self, other: CleanupReport) {
        self.released += other.released;
        self.already_gone += other.already_gone;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Pending,
    Releasing,
    Released,
    Failed,
}

#[derive(Debug)]
struct Entry {
    scope: String,
    handle: ResourceHandle,
    state: EntryState,
}

/// 외부 리소스 원장
#[derive(Debug, Default)]
pub struct ResourceLedger {
    entries: Mutex<Vec<Entry>>,
}

impl ResourceLedger {
    /// 빈 원장을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 리소스를 시나리오 범위에 등록합니다.
    pub fn register(&self, scope: &str, handle: ResourceHandle) {
        debug!(scope, resource = %handle, "resource registered");
        metrics::counter!(m::RESOURCES_CREATED_TOTAL, m::LABEL_KIND => handle.kind.to_string())
            .increment(1);
        self.lock().push(Entry {
            scope: scope.to_owned(),
            handle,
            state: EntryState::Pending,
        });
    }

    /// 아직 정리되지 않은 핸들 (등록 순서)
    pub fn outstanding(&self, scope: Option<&str>) -> Vec<ResourceHandle> {
        self.lock()
            .iter()
            .filter(|e| matches!(e.state, EntryState::Pending | EntryState::Failed))
            .filter(|e| scope.is_none_or(|s| e.scope == s))
            .map(|e| e.handle.clone())
            .collect()
    }

    /// 등록된 전체 핸들 수
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 비어 있는지 반환합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 시나리오 범위의 리소스를 역순으로 정리합니다.
    ///
    /// 이전에 실패한 항목은 다시 시도하지 않습니다.
    pub async fn release_scope(&self, scope: &str, releaser: &dyn ResourceReleaser) -> CleanupReport {
        let claimed = self.claim(|e| e.scope == scope && e.state == EntryState::Pending);
        self.release_claimed(claimed, releaser).await
    }

    /// 남은 모든 리소스를 역순으로 정리합니다. 실패했던 항목도 다시 시도합니다.
    pub async fn release_all(&self, releaser: &dyn ResourceReleaser) -> CleanupReport {
        let claimed =
            self.claim(|e| matches!(e.state, EntryState::Pending | EntryState::Failed));
        if !claimed.is_empty() {
            info!(count = claimed.len(), "sweeping outstanding resources");
        }
        self.release_claimed(claimed, releaser).await
    }

    /// 조건에 맞는 항목을 `Releasing`으로 표시하고 역순 인덱스를 반환합니다.
    ///
    /// 같은 항목을 동시에 두 번 정리하지 않도록 잠금 안에서 표시합니다.
    fn claim(&self, predicate: impl Fn(&Entry) -> bool) -> Vec<(usize, ResourceHandle)> {
        let mut entries = self.lock();
        let mut claimed = Vec::new();
        for (idx, entry) in entries.iter_mut().enumerate().rev() {
            if predicate(entry) {
                entry.state = EntryState::Releasing;
                claimed.push((idx, entry.handle.clone()));
            }
        }
        claimed
    }

    async fn release_claimed(
        &self,
        claimed: Vec<(usize, ResourceHandle)>,
        releaser: &dyn ResourceReleaser,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        for (idx, handle) in claimed {
            let outcome = if releaser.handles(handle.kind) {
                releaser.release(&handle).await
            } else {
                Err(FaascheckError::EnvironmentUnavailable {
                    component: handle.kind.to_string(),
                    reason: "no releaser registered for resource kind".to_owned(),
                })
            };

            let (state, result) = match outcome {
                Ok(ReleaseOutcome::Deleted) => {
                    report.released += 1;
                    debug!(resource = %handle, "resource released");
                    (EntryState::Released, "deleted")
                }
                Ok(ReleaseOutcome::AlreadyGone) => {
                    report.already_gone += 1;
                    debug!(resource = %handle, "resource already gone");
                    (EntryState::Released, "already_gone")
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(resource = %handle, error = %e, "failed to release resource");
                    (EntryState::Failed, "failed")
                }
            };
            metrics::counter!(
                m::RESOURCES_RELEASED_TOTAL,
                m::LABEL_KIND => handle.kind.to_string(),
                m::LABEL_RESULT => result
            )
            .increment(1);

            if let Some(entry) = self.lock().get_mut(idx) {
                entry.state = state;
            }
        }
        report
    }
}

/// 게이트웨이 챗룸과 콜백을 삭제하는 releaser
///
/// 빌드 중인 콜백은 400을 반환하므로 빌드가 끝날 때까지 폴러로 재시도합니다.
pub struct GatewayReleaser<P> {
    gateway: GatewayClient<P>,
    busy_poller: StatePoller,
}

impl<P: Probe> GatewayReleaser<P> {
    /// 새 releaser를 생성합니다.
    pub fn new(gateway: GatewayClient<P>, busy_poller: StatePoller) -> Self {
        Self {
            gateway,
            busy_poller,
        }
    }

    async fn delete_once(&self, handle: &ResourceHandle) -> Result<u16, ProbeError> {
        let id = parse_id(handle)?;
        let result = match handle.kind {
            ResourceKind::ChatRoom => self.gateway.delete_room(id).await?,
            _ => self.gateway.delete_callback(id).await?,
        };
        Ok(result.status_code)
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<ReleaseOutcome, FaascheckError> {
        let mut status = self.delete_once(handle).await?;
        if status == 400 && handle.kind == ResourceKind::Callback {
            debug!(resource = %handle, "callback busy, waiting for build to settle");
            let outcome = self
                .busy_poller
                .await_state(move || self.delete_once(handle), |code| *code != 400)
                .await;
            status = outcome.state.unwrap_or(400);
        }
        match status {
            200 | 204 => Ok(ReleaseOutcome::Deleted),
            404 => Ok(ReleaseOutcome::AlreadyGone),
            other => Err(ProbeError::Request {
                target: format!("DELETE {handle}"),
                reason: format!("unexpected status {other}"),
            }
            .into()),
        }
    }
}

impl<P: Probe> ResourceReleaser for GatewayReleaser<P> {
    fn handles(&self, kind: ResourceKind) -> bool {
        kind.is_gateway()
    }

    fn release<'a>(
        &'a self,
        handle: &'a ResourceHandle,
    ) -> BoxFuture<'a, Result<ReleaseOutcome, FaascheckError>> {
        Box::pin(self.delete(handle))
    }
}

fn parse_id(handle: &ResourceHandle) -> Result<i64, ProbeError> {
    handle.identifier.parse().map_err(|_| ProbeError::Request {
        target: handle.to_string(),
        reason: "identifier is not a numeric id".to_owned(),
    })
}

/// 종류별로 첫 번째로 처리 가능한 releaser에 위임
#[derive(Default, Clone)]
pub struct CompositeReleaser {
    releasers: Vec<Arc<dyn ResourceReleaser>>,
}

impl CompositeReleaser {
    /// 빈 조합을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// releaser를 추가합니다.
    pub fn with(mut self, releaser: Arc<dyn ResourceReleaser>) -> Self {
        self.releasers.push(releaser);
        self
    }

    fn find(&self, kind: ResourceKind) -> Option<&Arc<dyn ResourceReleaser>> {
        self.releasers.iter().find(|r| r.handles(kind))
    }
}

impl ResourceReleaser for CompositeReleaser {
    fn handles(&self, kind: ResourceKind) -> bool {
        self.find(kind).is_some()
    }

    fn release<'a>(
        &'a self,
        handle: &'a ResourceHandle,
    ) -> BoxFuture<'a, Result<ReleaseOutcome, FaascheckError>> {
        match self.find(handle.kind) {
            Some(releaser) => releaser.release(handle),
            None => Box::pin(async move {
                Err(FaascheckError::EnvironmentUnavailable {
                    component: handle.kind.to_string(),
                    reason: "no releaser registered for resource kind".to_owned(),
                })
            }),
        }
    }
}
