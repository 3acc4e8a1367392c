//! 에러 타입: 도메인별 에러 정의

/// faascheck 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum FaascheckError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 네트워크 프로브 에러
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    /// 결과 원장 에러
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// 오케스트레이션 백엔드 에러
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// 대상 시스템 또는 오케스트레이션 제어면에 접근할 수 없음
    #[error("environment unavailable: {component}: {reason}")]
    EnvironmentUnavailable {
        /// 접근할 수 없는 구성 요소 (gateway, kube, docker)
        component: String,
        /// 실패 사유
        reason: String,
    },

    /// 통계를 계산할 샘플이 없음
    #[error("insufficient data: {context}")]
    InsufficientData { context: String },

    /// 외부 신호로 실행이 취소됨
    #[error("run cancelled")]
    Cancelled,

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 단일 네트워크 요청 에러
///
/// `Timeout`과 `Connection`은 원격 응답이 없었음을 뜻하며,
/// HTTP 상태 코드가 있는 응답은 에러가 아니라 [`ProbeResult`](crate::types)로 반환됩니다.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    /// 요청 타임아웃
    #[error("request to {target} timed out after {timeout_ms}ms")]
    Timeout { target: String, timeout_ms: u64 },

    /// 연결 실패
    #[error("connection to {target} failed: {reason}")]
    Connection { target: String, reason: String },

    /// 요청 구성 또는 전송 실패
    #[error("request to {target} failed: {reason}")]
    Request { target: String, reason: String },

    /// 응답 본문 디코딩 실패
    #[error("failed to decode {shape} from response: {reason}")]
    Decode { shape: String, reason: String },
}

impl ProbeError {
    /// 타임아웃 여부를 반환합니다.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// 원격 종단에 도달하지 못한 에러인지 반환합니다.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection { .. })
    }

    /// 결과 기록용 `actual` 값을 반환합니다.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Connection { .. } => "connection failed",
            Self::Request { .. } => "request failed",
            Self::Decode { .. } => "undecodable body",
        }
    }
}

/// 결과 원장 에러
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// 같은 이름의 성능 메트릭이 이미 기록됨
    #[error("performance metric '{name}' already recorded")]
    DuplicateMetric { name: String },
}

/// 오케스트레이션 백엔드 에러
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// API 호출 실패
    #[error("{backend} api error: {reason}")]
    Api { backend: String, reason: String },

    /// 리소스를 찾을 수 없음
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    /// 백엔드가 표현할 수 없는 장애 유형
    #[error("{backend} cannot express fault '{fault}'")]
    Unsupported { backend: String, fault: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_display_and_label() {
        let err = ProbeError::Timeout {
            target: "GET /health".to_owned(),
            timeout_ms: 5000,
        };
        assert!(err.to_string().contains("5000ms"));
        assert!(err.is_timeout());
        assert!(err.is_unreachable());
        assert_eq!(err.outcome_label(), "timeout");
    }

    #[test]
    fn connection_error_is_unreachable_but_not_timeout() {
        let err = ProbeError::Connection {
            target: "GET /health".to_owned(),
            reason: "connection refused".to_owned(),
        };
        assert!(!err.is_timeout());
        assert!(err.is_unreachable());
        assert_eq!(err.outcome_label(), "connection failed");
    }

    #[test]
    fn decode_error_is_reachable() {
        let err = ProbeError::Decode {
            shape: "ChatRoom".to_owned(),
            reason: "missing field `chat_id`".to_owned(),
        };
        assert!(!err.is_unreachable());
        assert!(err.to_string().contains("ChatRoom"));
    }

    #[test]
    fn probe_error_converts_to_top_level() {
        let err: FaascheckError = ProbeError::Request {
            target: "POST /deploy/".to_owned(),
            reason: "builder error".to_owned(),
        }
        .into();
        assert!(matches!(err, FaascheckError::Probe(_)));
    }

    #[test]
    fn environment_unavailable_display() {
        let err = FaascheckError::EnvironmentUnavailable {
            component: "gateway".to_owned(),
            reason: "health check returned 503".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("gateway"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn duplicate_metric_display() {
        let err = LedgerError::DuplicateMetric {
            name: "build_time_ms".to_owned(),
        };
        assert!(err.to_string().contains("build_time_ms"));
    }

    #[test]
    fn unsupported_fault_display() {
        let err = ClusterError::Unsupported {
            backend: "docker".to_owned(),
            fault: "DeadlineExceeded".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("docker"));
        assert!(msg.contains("DeadlineExceeded"));
    }
}
