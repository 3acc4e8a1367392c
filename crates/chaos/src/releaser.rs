//! 클러스터 리소스 정리

use std::sync::Arc;

use faascheck_core::BoxFuture;
use faascheck_core::error::FaascheckError;
use faascheck_core::types::{ResourceHandle, ResourceKind};
use faascheck_engine::{ReleaseOutcome, ResourceReleaser};

use crate::cluster::ClusterClient;

/// Job, Pod, ServiceAccount, 컨테이너를 백엔드에서 삭제하는 releaser
pub struct ClusterReleaser<C> {
    client: Arc<C>,
}

impl<C: ClusterClient> ClusterReleaser<C> {
    /// 새 releaser를 생성합니다.
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

impl<C: ClusterClient> ResourceReleaser for ClusterReleaser<C> {
    fn handles(&self, kind: ResourceKind) -> bool {
        !kind.is_gateway()
    }

    fn release<'a>(
        &'a self,
        handle: &'a ResourceHandle,
    ) -> BoxFuture<'a, Result<ReleaseOutcome, FaascheckError>> {
        Box::pin(async move { Ok(self.client.delete(handle).await?) })
    }
}
