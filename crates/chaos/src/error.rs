//! 장애 주입 에러 타입
//!
//! [`ChaosError`]는 오케스트레이션 백엔드 호출과 장애 명세에서 발생하는 에러를 표현합니다.
//! `From<ChaosError> for FaascheckError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use faascheck_core::error::{ClusterError, ConfigError, FaascheckError};

/// 장애 주입 도메인 에러
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChaosError {
    /// 백엔드에 연결할 수 없음
    #[error("cluster connection error: {0}")]
    Connection(String),

    /// 백엔드 API 호출 실패
    #[error("{backend} api error: {reason}")]
    Api {
        /// 백엔드 이름 (kube, docker)
        backend: String,
        /// 실패 사유
        reason: String,
    },

    /// 대상 리소스가 없음
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// 리소스 종류
        kind: String,
        /// 리소스 이름
        name: String,
    },

    /// 백엔드가 표현할 수 없는 장애 유형
    #[error("{backend} cannot express fault '{fault}'")]
    Unsupported {
        /// 백엔드 이름
        backend: String,
        /// 장애 유형
        fault: String,
    },

    /// 장애 명세 값이 잘못됨
    #[error("invalid fault spec: {field}: {reason}")]
    InvalidSpec {
        /// 필드 이름
        field: String,
        /// 사유
        reason: String,
    },
}

impl ChaosError {
    /// 백엔드 자체에 닿지 못한 에러인지 반환합니다.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// 백엔드가 장애 유형을 표현하지 못하는 경우인지 반환합니다.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    pub(crate) fn api(backend: &str, reason: impl Into<String>) -> Self {
        Self::Api {
            backend: backend.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<ChaosError> for FaascheckError {
    fn from(err: ChaosError) -> Self {
        match err {
            ChaosError::Connection(reason) => FaascheckError::EnvironmentUnavailable {
                component: "cluster".to_owned(),
                reason,
            },
            ChaosError::Api { backend, reason } => {
                FaascheckError::Cluster(ClusterError::Api { backend, reason })
            }
            ChaosError::NotFound { kind, name } => {
                FaascheckError::Cluster(ClusterError::NotFound { kind, name })
            }
            ChaosError::Unsupported { backend, fault } => {
                FaascheckError::Cluster(ClusterError::Unsupported { backend, fault })
            }
            ChaosError::InvalidSpec { field, reason } => {
                FaascheckError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
