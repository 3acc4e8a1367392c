//! 엔진 에러 타입
//!
//! [`EngineError`]는 시나리오 엔진 내부에서 발생하는 에러를 표현합니다.
//! `From<EngineError> for FaascheckError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use faascheck_core::error::{FaascheckError, LedgerError, ProbeError};

/// 시나리오 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 대상 시스템에 접근할 수 없음. 전체 실행을 중단합니다.
    #[error("environment unavailable: {component}: {reason}")]
    EnvironmentUnavailable {
        /// 접근할 수 없는 구성 요소
        component: String,
        /// 실패 사유
        reason: String,
    },

    /// 통계를 계산할 샘플이 없음
    #[error("insufficient data: {context}")]
    InsufficientData {
        /// 어떤 집계였는지
        context: String,
    },

    /// 프로브 실패
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    /// 결과 원장 에러
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// 실행이 외부 신호로 취소됨
    #[error("run cancelled")]
    Cancelled,

    /// HTTP 클라이언트 구성 실패
    #[error("http client build failed: {0}")]
    ClientBuild(String),
}

impl EngineError {
    /// 환경 불가 에러를 생성합니다.
    pub fn unavailable(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvironmentUnavailable {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

impl From<EngineError> for FaascheckError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::EnvironmentUnavailable { component, reason } => {
                FaascheckError::EnvironmentUnavailable { component, reason }
            }
            EngineError::Probe(e) => FaascheckError::Probe(e),
            EngineError::Ledger(e) => FaascheckError::Ledger(e),
            EngineError::InsufficientData { context } => {
                FaascheckError::InsufficientData { context }
            }
            EngineError::Cancelled => FaascheckError::Cancelled,
            EngineError::ClientBuild(reason) => FaascheckError::EnvironmentUnavailable {
                component: "http-client".to_owned(),
                reason,
            },
        }
    }
}
