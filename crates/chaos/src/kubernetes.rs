//! Kubernetes 백엔드
//!
//! 장애 유형별로 Job, Pod, ServiceAccount를 생성하고
//! 컨테이너 상태 사유, Job 조건, 이벤트 이력을 읽어 [`Observation`]을 만듭니다.
//! 권한 거부는 바인딩이 없는 ServiceAccount에 대해 SubjectAccessReview를 요청해
//! 확인합니다.

use std::collections::BTreeMap;

use faascheck_core::types::{ResourceHandle, ResourceKind};
use faascheck_engine::ReleaseOutcome;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, Event, Pod, PodSpec, PodTemplateSpec, ResourceRequirements, ServiceAccount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::Client;
use kube::api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams};
use tracing::{debug, warn};

use crate::cluster::ClusterClient;
use crate::error::ChaosError;
use crate::fault::{FaultKind, FaultSpec, Observation};

const BACKEND: &str = "kube";
const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
const FAULT_LABEL: &str = "faascheck.io/fault";

/// kube 클라이언트 기반 백엔드
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// kubeconfig 또는 클러스터 내부 설정으로 연결합니다.
    pub async fn connect() -> Result<Self, ChaosError> {
        let client = Client::try_default().await.map_err(|e| {
            ChaosError::Connection(format!("failed to build kubernetes client: {e}"))
        })?;
        Ok(Self::from_client(client))
    }

    /// 이미 구성된 클라이언트를 사용합니다.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn service_accounts(&self, namespace: &str) -> Api<ServiceAccount> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn events_for(&self, namespace: &str, names: &[String]) -> Vec<String> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let mut events = Vec::new();
        for name in names {
            let params = ListParams::default().fields(&format!("involvedObject.name={name}"));
            match api.list(&params).await {
                Ok(list) => events.extend(list.items.iter().map(describe_event)),
                Err(e) => debug!(object = %name, error = %e, "event lookup failed"),
            }
        }
        events
    }

    async fn observe_job(&self, spec: &FaultSpec) -> Result<Observation, ChaosError> {
        let job = self
            .jobs(&spec.namespace)
            .get(&spec.name)
            .await
            .map_err(|e| kube_error(e, "job", &spec.name))?;
        let pods = self
            .pods(&spec.namespace)
            .list(&ListParams::default().labels(&format!("job-name={}", spec.name)))
            .await
            .map_err(|e| kube_error(e, "pod", &spec.name))?;

        let mut reasons = job_reasons(&job);
        let mut names = vec![spec.name.clone()];
        for pod in &pods.items {
            reasons.extend(container_reasons(pod));
            if let Some(name) = &pod.metadata.name {
                names.push(name.clone());
            }
        }
        let events = self.events_for(&spec.namespace, &names).await;
        Ok(Observation { reasons, events })
    }

    async fn observe_pod(&self, spec: &FaultSpec) -> Result<Observation, ChaosError> {
        let pod = self
            .pods(&spec.namespace)
            .get(&spec.name)
            .await
            .map_err(|e| kube_error(e, "pod", &spec.name))?;
        let reasons = container_reasons(&pod);
        let events = self
            .events_for(&spec.namespace, std::slice::from_ref(&spec.name))
            .await;
        Ok(Observation { reasons, events })
    }

    async fn review_access(&self, spec: &FaultSpec) -> Result<Observation, ChaosError> {
        let api: Api<SubjectAccessReview> = Api::all(self.client.clone());
        let review = api
            .create(&PostParams::default(), &access_review(spec))
            .await
            .map_err(|e| kube_error(e, "subjectaccessreview", &spec.name))?;

        let mut observation = Observation::default();
        if let Some(status) = review.status {
            if !status.allowed {
                observation.reasons.push("Forbidden".to_owned());
            }
            if let Some(reason) = status.reason.filter(|r| !r.is_empty()) {
                observation.events.push(format!("AccessReview: {reason}"));
            }
        }
        Ok(observation)
    }
}

impl ClusterClient for KubeClusterClient {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn supports(&self, _kind: FaultKind) -> bool {
        true
    }

    async fn ping(&self) -> Result<(), ChaosError> {
        self.client
            .apiserver_version()
            .await
            .map_err(|e| ChaosError::Connection(format!("kubernetes api unreachable: {e}")))?;
        Ok(())
    }

    async fn submit(&self, spec: &FaultSpec) -> Result<ResourceHandle, ChaosError> {
        let params = PostParams::default();
        match spec.kind.resource_kind() {
            ResourceKind::Job => {
                self.jobs(&spec.namespace)
                    .create(&params, &fault_job(spec))
                    .await
                    .map_err(|e| kube_error(e, "job", &spec.name))?;
            }
            ResourceKind::Pod => {
                self.pods(&spec.namespace)
                    .create(&params, &fault_pod(spec))
                    .await
                    .map_err(|e| kube_error(e, "pod", &spec.name))?;
            }
            _ => {
                self.service_accounts(&spec.namespace)
                    .create(&params, &unbound_service_account(spec))
                    .await
                    .map_err(|e| kube_error(e, "serviceaccount", &spec.name))?;
            }
        }
        debug!(
            fault = %spec.kind,
            name = %spec.name,
            namespace = %spec.namespace,
            "fault workload submitted"
        );
        Ok(spec.handle())
    }

    async fn observe(&self, spec: &FaultSpec) -> Result<Observation, ChaosError> {
        match spec.kind.resource_kind() {
            ResourceKind::Job => self.observe_job(spec).await,
            ResourceKind::Pod => self.observe_pod(spec).await,
            _ => self.review_access(spec).await,
        }
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<ReleaseOutcome, ChaosError> {
        let namespace = handle.scope.as_deref().unwrap_or("default");
        let name = handle.identifier.as_str();
        // Job 삭제 시 하위 Pod까지 지우도록 background 전파
        let result = match handle.kind {
            ResourceKind::Job => self
                .jobs(namespace)
                .delete(name, &DeleteParams::background())
                .await
                .map(|_| ()),
            ResourceKind::Pod => self
                .pods(namespace)
                .delete(name, &DeleteParams::default())
                .await
                .map(|_| ()),
            ResourceKind::ServiceAccount => self
                .service_accounts(namespace)
                .delete(name, &DeleteParams::default())
                .await
                .map(|_| ()),
            other => {
                warn!(resource = %handle, "kubernetes backend cannot delete {other}");
                return Err(ChaosError::api(BACKEND, format!("unsupported resource kind {other}")));
            }
        };
        match result {
            Ok(()) => Ok(ReleaseOutcome::Deleted),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                Ok(ReleaseOutcome::AlreadyGone)
            }
            Err(e) => Err(kube_error(e, &handle.kind.to_string(), name)),
        }
    }
}

fn kube_error(err: kube::Error, kind: &str, name: &str) -> ChaosError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ChaosError::NotFound {
            kind: kind.to_owned(),
            name: name.to_owned(),
        },
        kube::Error::Api(response) => ChaosError::api(
            BACKEND,
            format!("{kind} '{name}': {} ({})", response.message, response.reason),
        ),
        other => ChaosError::Connection(other.to_string()),
    }
}

fn labels(spec: &FaultSpec) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY.to_owned(), "faascheck".to_owned()),
        (FAULT_LABEL.to_owned(), spec.kind.as_str().to_owned()),
    ])
}

fn metadata(spec: &FaultSpec) -> ObjectMeta {
    ObjectMeta {
        name: Some(spec.name.clone()),
        namespace: Some(spec.namespace.clone()),
        labels: Some(labels(spec)),
        ..Default::default()
    }
}

fn fault_container(spec: &FaultSpec) -> Container {
    let resources = spec.memory_limit.as_ref().map(|limit| {
        let memory = BTreeMap::from([("memory".to_owned(), Quantity(limit.clone()))]);
        ResourceRequirements {
            limits: Some(memory.clone()),
            requests: Some(memory),
            ..Default::default()
        }
    });
    Container {
        name: "fault".to_owned(),
        image: Some(spec.image.clone()),
        command: (!spec.command.is_empty()).then(|| spec.command.clone()),
        resources,
        ..Default::default()
    }
}

fn pod_spec(spec: &FaultSpec, restart_policy: &str) -> PodSpec {
    PodSpec {
        containers: vec![fault_container(spec)],
        restart_policy: Some(restart_policy.to_owned()),
        automount_service_account_token: Some(false),
        ..Default::default()
    }
}

/// OOM과 기한 초과용 Job. 재시도 없이 한 번만 실행합니다.
pub(crate) fn fault_job(spec: &FaultSpec) -> Job {
    Job {
        metadata: metadata(spec),
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            active_deadline_seconds: spec.deadline_secs.map(|s| s as i64),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(spec)),
                    ..Default::default()
                }),
                spec: Some(pod_spec(spec, "Never")),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// 이미지 풀 실패와 재시작 반복용 Pod
pub(crate) fn fault_pod(spec: &FaultSpec) -> Pod {
    let restart_policy = match spec.kind {
        FaultKind::CrashLoopBackOff => "Always",
        _ => "Never",
    };
    Pod {
        metadata: metadata(spec),
        spec: Some(pod_spec(spec, restart_policy)),
        ..Default::default()
    }
}

fn unbound_service_account(spec: &FaultSpec) -> ServiceAccount {
    ServiceAccount {
        metadata: metadata(spec),
        automount_service_account_token: Some(false),
        ..Default::default()
    }
}

/// ServiceAccount가 같은 네임스페이스에 Pod를 만들 수 있는지 묻는 리뷰
pub(crate) fn access_review(spec: &FaultSpec) -> SubjectAccessReview {
    let namespace = &spec.namespace;
    SubjectAccessReview {
        metadata: ObjectMeta::default(),
        spec: SubjectAccessReviewSpec {
            user: Some(format!("system:serviceaccount:{namespace}:{}", spec.name)),
            groups: Some(vec![
                "system:serviceaccounts".to_owned(),
                format!("system:serviceaccounts:{namespace}"),
            ]),
            resource_attributes: Some(ResourceAttributes {
                namespace: Some(namespace.clone()),
                verb: Some("create".to_owned()),
                resource: Some("pods".to_owned()),
                ..Default::default()
            }),
            ..Default::default()
        },
        status: None,
    }
}

/// 모든 컨테이너의 현재/직전 상태 사유
pub(crate) fn container_reasons(pod: &Pod) -> Vec<String> {
    let Some(status) = &pod.status else {
        return Vec::new();
    };
    let mut reasons = Vec::new();
    for container in status.container_statuses.iter().flatten() {
        for state in [&container.state, &container.last_state].into_iter().flatten() {
            if let Some(reason) = state.waiting.as_ref().and_then(|w| w.reason.clone()) {
                reasons.push(reason);
            }
            if let Some(reason) = state.terminated.as_ref().and_then(|t| t.reason.clone()) {
                reasons.push(reason);
            }
        }
    }
    reasons
}

/// 참인 Job 조건의 사유 (예: `DeadlineExceeded`)
pub(crate) fn job_reasons(job: &Job) -> Vec<String> {
    job.status
        .iter()
        .flat_map(|status| status.conditions.iter().flatten())
        .filter(|condition| condition.status == "True")
        .filter_map(|condition| condition.reason.clone())
        .collect()
}

fn describe_event(event: &Event) -> String {
    format!(
        "{}: {}",
        event.reason.as_deref().unwrap_or("Unknown"),
        event.message.as_deref().unwrap_or_default()
    )
}
