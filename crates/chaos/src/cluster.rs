//! 오케스트레이션 백엔드 추상화
//!
//! 모든 백엔드 호출은 [`ClusterClient`] 트레이트를 거칩니다.
//! 운영 코드는 [`KubeClusterClient`](crate::kubernetes::KubeClusterClient)와
//! [`DockerFaultClient`](crate::docker::DockerFaultClient)를 사용하고,
//! 테스트는 `MockClusterClient`를 사용합니다.
//!
//! # 에러 처리
//!
//! - 404: `delete`에서는 [`ReleaseOutcome::AlreadyGone`], 그 외에는 `ChaosError::NotFound`
//! - 백엔드에 닿지 못함: `ChaosError::Connection`
//! - 표현할 수 없는 장애 유형: `ChaosError::Unsupported`

use std::future::Future;

use faascheck_core::config::ChaosConfig;
use faascheck_core::types::ResourceHandle;
use faascheck_engine::ReleaseOutcome;

use crate::docker::DockerFaultClient;
use crate::error::ChaosError;
use crate::fault::{FaultKind, FaultSpec, Observation};
use crate::kubernetes::KubeClusterClient;

/// 오케스트레이션 백엔드 연산
///
/// `Send + Sync + 'static`이므로 `Arc`로 감싸 여러 태스크에서 공유할 수 있습니다.
pub trait ClusterClient: Send + Sync + 'static {
    /// 백엔드 이름
    fn backend(&self) -> &'static str;

    /// 장애 유형을 표현할 수 있는지 반환합니다.
    fn supports(&self, kind: FaultKind) -> bool;

    /// 백엔드 연결을 확인합니다.
    fn ping(&self) -> impl Future<Output = Result<(), ChaosError>> + Send;

    /// 장애 작업을 제출하고 정리용 핸들을 반환합니다.
    fn submit(
        &self,
        spec: &FaultSpec,
    ) -> impl Future<Output = Result<ResourceHandle, ChaosError>> + Send;

    /// 제출한 작업의 현재 사유와 이벤트를 읽습니다.
    fn observe(
        &self,
        spec: &FaultSpec,
    ) -> impl Future<Output = Result<Observation, ChaosError>> + Send;

    /// 리소스를 삭제합니다. 이미 없으면 `AlreadyGone`입니다.
    fn delete(
        &self,
        handle: &ResourceHandle,
    ) -> impl Future<Output = Result<ReleaseOutcome, ChaosError>> + Send;
}

/// 설정으로 선택되는 백엔드
pub enum BackendClient {
    /// Kubernetes API
    Kube(KubeClusterClient),
    /// Docker 데몬
    Docker(DockerFaultClient),
}

impl BackendClient {
    /// `chaos.backend` 설정에 따라 백엔드에 연결합니다.
    pub async fn connect(config: &ChaosConfig) -> Result<Self, ChaosError> {
        match config.backend.as_str() {
            "kube" | "kubernetes" => Ok(Self::Kube(KubeClusterClient::connect().await?)),
            "docker" => Ok(Self::Docker(DockerFaultClient::connect_with_socket(
                &config.docker_socket,
            )?)),
            other => Err(ChaosError::InvalidSpec {
                field: "chaos.backend".to_owned(),
                reason: format!("unknown backend '{other}'"),
            }),
        }
    }
}

impl ClusterClient for BackendClient {
    fn backend(&self) -> &'static str {
        match self {
            Self::Kube(client) => client.backend(),
            Self::Docker(client) => client.backend(),
        }
    }

    fn supports(&self, kind: FaultKind) -> bool {
        match self {
            Self::Kube(client) => client.supports(kind),
            Self::Docker(client) => client.supports(kind),
        }
    }

    async fn ping(&self) -> Result<(), ChaosError> {
        match self {
            Self::Kube(client) => client.ping().await,
            Self::Docker(client) => client.ping().await,
        }
    }

    async fn submit(&self, spec: &FaultSpec) -> Result<ResourceHandle, ChaosError> {
        match self {
            Self::Kube(client) => client.submit(spec).await,
            Self::Docker(client) => client.submit(spec).await,
        }
    }

    async fn observe(&self, spec: &FaultSpec) -> Result<Observation, ChaosError> {
        match self {
            Self::Kube(client) => client.observe(spec).await,
            Self::Docker(client) => client.observe(spec).await,
        }
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<ReleaseOutcome, ChaosError> {
        match self {
            Self::Kube(client) => client.delete(handle).await,
            Self::Docker(client) => client.delete(handle).await,
        }
    }
}

/// 테스트용 Mock 클러스터 클라이언트
///
/// 장애 유형별로 관측값을 순서대로 돌려주며, 마지막 값은 계속 반복합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockClusterClient {
    /// 지원하지 않는 장애 유형
    pub unsupported: Vec<FaultKind>,
    /// 연결 실패를 흉내 낼지 여부
    pub unreachable: bool,
    /// 제출 실패 사유
    pub submit_failure: Option<String>,
    pub(crate) observations: std::sync::Mutex<
        std::collections::HashMap<FaultKind, std::collections::VecDeque<Observation>>,
    >,
    pub(crate) submitted: std::sync::Mutex<Vec<ResourceHandle>>,
    pub(crate) deleted: std::sync::Mutex<Vec<ResourceHandle>>,
}

#[cfg(test)]
impl MockClusterClient {
    /// 모든 장애 유형을 지원하는 mock 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 장애 유형의 관측값을 추가합니다.
    pub fn with_observation(self, kind: FaultKind, reasons: &[&str]) -> Self {
        self.observations
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(Observation {
                reasons: reasons.iter().map(|r| (*r).to_owned()).collect(),
                events: vec![format!("Scheduled: {kind} workload assigned")],
            });
        self
    }

    /// 지원하지 않는 장애 유형을 지정합니다.
    pub fn without(mut self, kind: FaultKind) -> Self {
        self.unsupported.push(kind);
        self
    }

    /// 제출된 리소스 목록
    pub fn submitted(&self) -> Vec<ResourceHandle> {
        self.submitted.lock().unwrap().clone()
    }

    /// 삭제된 리소스 목록
    pub fn deleted(&self) -> Vec<ResourceHandle> {
        self.deleted.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ClusterClient for MockClusterClient {
    fn backend(&self) -> &'static str {
        "mock"
    }

    fn supports(&self, kind: FaultKind) -> bool {
        !self.unsupported.contains(&kind)
    }

    async fn ping(&self) -> Result<(), ChaosError> {
        if self.unreachable {
            return Err(ChaosError::Connection("mock cluster unreachable".to_owned()));
        }
        Ok(())
    }

    async fn submit(&self, spec: &FaultSpec) -> Result<ResourceHandle, ChaosError> {
        self.ping().await?;
        if let Some(reason) = &self.submit_failure {
            return Err(ChaosError::api("mock", reason.clone()));
        }
        let handle = spec.handle();
        self.submitted.lock().unwrap().push(handle.clone());
        Ok(handle)
    }

    async fn observe(&self, spec: &FaultSpec) -> Result<Observation, ChaosError> {
        let mut observations = self.observations.lock().unwrap();
        let queue = observations.entry(spec.kind).or_default();
        let observation = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(observation.unwrap_or_default())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<ReleaseOutcome, ChaosError> {
        let mut deleted = self.deleted.lock().unwrap();
        if deleted.contains(handle) {
            return Ok(ReleaseOutcome::AlreadyGone);
        }
        deleted.push(handle.clone());
        Ok(ReleaseOutcome::Deleted)
    }
}
