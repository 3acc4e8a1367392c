//! Docker backend for fault injection.
//!
//! Docker has no Job, ServiceAccount or image-pull back-off concepts, so only
//! two fault classes are expressible here:
//!
//! - [`FaultKind::OomKilled`]: a stress container under a hard memory cap
//!   (swap disabled). Detected via the container's `OOMKilled` state flag.
//! - [`FaultKind::CrashLoopBackOff`]: a container that exits non-zero under an
//!   `on-failure` restart policy. Detected once the daemon has restarted it
//!   [`CRASH_LOOP_RESTARTS`] times.
//!
//! Other classes return `ChaosError::Unsupported`, which the fault suite
//! records as SKIP.
//!
//! # Container Name Validation
//!
//! Names are generated per run, but are still validated before every API call:
//! 1-128 characters, `[a-zA-Z0-9][a-zA-Z0-9_.-]*`.

use std::collections::HashMap;
use std::sync::Arc;

use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, HostConfig, RestartPolicy, RestartPolicyNameEnum};
use faascheck_core::types::{ResourceHandle, ResourceKind};
use faascheck_engine::ReleaseOutcome;
use futures::TryStreamExt;
use tracing::{debug, warn};

use crate::cluster::ClusterClient;
use crate::error::ChaosError;
use crate::fault::{FaultKind, FaultSpec, Observation, parse_memory};

const BACKEND: &str = "docker";

/// Restarts after which a crashing container counts as a restart loop.
pub const CRASH_LOOP_RESTARTS: i64 = 2;

fn validate_container_name(name: &str) -> Result<(), ChaosError> {
    if name.is_empty() || name.len() > 128 {
        return Err(ChaosError::InvalidSpec {
            field: "container name".to_owned(),
            reason: format!("length {} (must be 1-128)", name.len()),
        });
    }
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(ChaosError::InvalidSpec {
            field: "container name".to_owned(),
            reason: format!("'{name}' contains characters docker rejects"),
        });
    }
    Ok(())
}

/// Fault backend talking to the Docker daemon through `bollard`.
///
/// Internally uses `Arc<bollard::Docker>` for sharing across tasks.
pub struct DockerFaultClient {
    docker: Arc<bollard::Docker>,
}

impl DockerFaultClient {
    /// Connects to Docker using the default local socket.
    ///
    /// # Errors
    ///
    /// Returns `ChaosError::Connection` if the client cannot be built.
    pub fn connect_local() -> Result<Self, ChaosError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            ChaosError::Connection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    ///
    /// # Errors
    ///
    /// Returns `ChaosError::Connection` if the client cannot be built.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, ChaosError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    ChaosError::Connection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    async fn pull(&self, image: &str) -> Result<(), ChaosError> {
        let options = CreateImageOptions {
            from_image: image.to_owned(),
            ..Default::default()
        };
        self.docker
            .create_image(Some(options), None, None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| docker_error(e, "image", image))?;
        Ok(())
    }
}

/// Builds the container configuration for a supported fault.
pub(crate) fn container_config(spec: &FaultSpec) -> Result<Config<String>, ChaosError> {
    let mut host_config = HostConfig::default();
    match spec.kind {
        FaultKind::OomKilled => {
            let limit = parse_memory(spec.memory_limit.as_deref().unwrap_or("32Mi"))?;
            host_config.memory = Some(limit);
            // equal to memory: no swap headroom
            host_config.memory_swap = Some(limit);
        }
        FaultKind::CrashLoopBackOff => {
            host_config.restart_policy = Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::ON_FAILURE),
                maximum_retry_count: Some(CRASH_LOOP_RESTARTS + 3),
            });
        }
        other => {
            return Err(ChaosError::Unsupported {
                backend: BACKEND.to_owned(),
                fault: other.to_string(),
            });
        }
    }
    let labels = HashMap::from([
        ("app.kubernetes.io/managed-by".to_owned(), "faascheck".to_owned()),
        ("faascheck.io/fault".to_owned(), spec.kind.as_str().to_owned()),
    ]);
    Ok(Config {
        image: Some(spec.image.clone()),
        cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
        labels: Some(labels),
        host_config: Some(host_config),
        ..Default::default()
    })
}

/// Reads fault reasons off an inspect response.
pub(crate) fn inspect_observation(details: &ContainerInspectResponse) -> Observation {
    let mut observation = Observation::default();
    let restarts = details.restart_count.unwrap_or(0);
    if let Some(state) = &details.state {
        if state.oom_killed == Some(true) {
            observation.reasons.push("OOMKilled".to_owned());
        }
        let exit_code = state.exit_code.unwrap_or(0);
        if exit_code != 0 && restarts >= CRASH_LOOP_RESTARTS {
            observation.reasons.push("CrashLoopBackOff".to_owned());
        } else if exit_code != 0 {
            observation.reasons.push("Error".to_owned());
        }
        let status = state
            .status
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_owned());
        observation
            .events
            .push(format!("State: status={status} exit_code={exit_code} restarts={restarts}"));
        if let Some(error) = state.error.as_deref().filter(|e| !e.is_empty()) {
            observation.events.push(format!("Error: {error}"));
        }
    }
    observation
}

/// A created container that fails to start is never handed to the caller,
/// so it is force-removed here before the start error is returned.
async fn start_or_discard<D, Fut>(
    started: Result<(), ChaosError>,
    discard: D,
) -> Result<(), ChaosError>
where
    D: FnOnce() -> Fut,
    Fut: Future<Output = Result<ReleaseOutcome, ChaosError>>,
{
    let Err(err) = started else {
        return Ok(());
    };
    if let Err(cleanup) = discard().await {
        warn!(error = %cleanup, "failed to remove container that did not start");
    }
    Err(err)
}

fn docker_error(err: bollard::errors::Error, kind: &str, name: &str) -> ChaosError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => ChaosError::NotFound {
            kind: kind.to_owned(),
            name: name.to_owned(),
        },
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => ChaosError::api(BACKEND, format!("{kind} '{name}': {status_code} {message}")),
        other => ChaosError::Connection(format!("docker request failed: {other}")),
    }
}

impl ClusterClient for DockerFaultClient {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn supports(&self, kind: FaultKind) -> bool {
        matches!(kind, FaultKind::OomKilled | FaultKind::CrashLoopBackOff)
    }

    async fn ping(&self) -> Result<(), ChaosError> {
        self.docker
            .ping()
            .await
            .map_err(|e| ChaosError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }

    async fn submit(&self, spec: &FaultSpec) -> Result<ResourceHandle, ChaosError> {
        validate_container_name(&spec.name)?;
        let config = container_config(spec)?;
        self.pull(&spec.image).await?;

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };
        self.docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| docker_error(e, "container", &spec.name))?;
        let started = self
            .docker
            .start_container(&spec.name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| docker_error(e, "container", &spec.name));
        let handle = ResourceHandle::new(ResourceKind::Container, &spec.name);
        start_or_discard(started, || self.delete(&handle)).await?;

        debug!(fault = %spec.kind, container = %spec.name, "fault container started");
        Ok(handle)
    }

    async fn observe(&self, spec: &FaultSpec) -> Result<Observation, ChaosError> {
        validate_container_name(&spec.name)?;
        let details = self
            .docker
            .inspect_container(&spec.name, None)
            .await
            .map_err(|e| docker_error(e, "container", &spec.name))?;
        Ok(inspect_observation(&details))
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<ReleaseOutcome, ChaosError> {
        let name = handle.identifier.as_str();
        validate_container_name(name)?;
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => Ok(ReleaseOutcome::Deleted),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(ReleaseOutcome::AlreadyGone),
            Err(e) => Err(docker_error(e, "container", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use bollard::models::{ContainerState, ContainerStateStatusEnum};
    use faascheck_core::config::ChaosConfig;

    use super::*;

    fn spec(kind: FaultKind) -> FaultSpec {
        FaultSpec::from_config(kind, format!("fc-{kind}-a1b2"), &ChaosConfig::default())
    }

    #[test]
    fn container_names_are_validated() {
        assert!(validate_container_name("fc-oom_killed-a1b2").is_ok());
        assert!(validate_container_name("").is_err());
        assert!(validate_container_name("-leading-dash").is_err());
        assert!(validate_container_name("name;rm -rf").is_err());
        assert!(validate_container_name(&"a".repeat(129)).is_err());
    }

    #[test]
    fn oom_config_caps_memory_without_swap() {
        let config = container_config(&spec(FaultKind::OomKilled)).unwrap();
        let host = config.host_config.unwrap();
        assert_eq!(host.memory, Some(32 * 1024 * 1024));
        assert_eq!(host.memory_swap, host.memory);
        assert_eq!(config.cmd.unwrap()[0], "stress");
    }

    #[test]
    fn crash_config_restarts_on_failure() {
        let config = container_config(&spec(FaultKind::CrashLoopBackOff)).unwrap();
        let policy = config.host_config.unwrap().restart_policy.unwrap();
        assert_eq!(policy.name, Some(RestartPolicyNameEnum::ON_FAILURE));
    }

    #[test]
    fn kubernetes_only_faults_are_unsupported() {
        for kind in [
            FaultKind::ImagePullBackOff,
            FaultKind::DeadlineExceeded,
            FaultKind::AuthorizationDenied,
        ] {
            let err = container_config(&spec(kind)).unwrap_err();
            assert!(err.is_unsupported(), "{kind} should be unsupported");
        }
    }

    #[test]
    fn oom_flag_becomes_oom_signature() {
        let details = ContainerInspectResponse {
            state: Some(ContainerState {
                status: Some(ContainerStateStatusEnum::EXITED),
                oom_killed: Some(true),
                exit_code: Some(137),
                ..Default::default()
            }),
            restart_count: Some(0),
            ..Default::default()
        };
        let observation = inspect_observation(&details);
        assert_eq!(observation.signature_for(FaultKind::OomKilled), Some("OOMKilled"));
        assert!(observation.events[0].contains("exit_code=137"));
    }

    #[test]
    fn repeated_non_zero_exits_become_crash_loop() {
        let mut details = ContainerInspectResponse {
            state: Some(ContainerState {
                status: Some(ContainerStateStatusEnum::RESTARTING),
                exit_code: Some(1),
                ..Default::default()
            }),
            restart_count: Some(1),
            ..Default::default()
        };
        assert_eq!(
            inspect_observation(&details).signature_for(FaultKind::CrashLoopBackOff),
            None
        );

        details.restart_count = Some(CRASH_LOOP_RESTARTS);
        assert_eq!(
            inspect_observation(&details).signature_for(FaultKind::CrashLoopBackOff),
            Some("CrashLoopBackOff")
        );
    }

    #[tokio::test]
    async fn failed_start_removes_created_container() {
        let removed = std::sync::atomic::AtomicBool::new(false);
        let started = Err(ChaosError::Connection("port already allocated".to_owned()));

        let err = start_or_discard(started, || async {
            removed.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(ReleaseOutcome::Deleted)
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("port already allocated"));
        assert!(removed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn start_error_survives_failed_removal() {
        let started = Err(ChaosError::Connection("no such image".to_owned()));
        let err = start_or_discard(started, || async {
            Err(ChaosError::Connection("daemon gone".to_owned()))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no such image"));
    }

    #[tokio::test]
    async fn started_container_is_kept() {
        let removed = std::sync::atomic::AtomicBool::new(false);
        let result = start_or_discard(Ok(()), || async {
            removed.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(ReleaseOutcome::Deleted)
        })
        .await;
        assert!(result.is_ok());
        assert!(!removed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<DockerFaultClient>();
    }
}
