//! 도메인 타입: 하네스 전역에서 사용되는 공통 타입
//!
//! 엔진, 장애 주입기, 리포터가 공유하는 데이터 구조를 정의합니다.
//! 모든 레코드는 한 번 생성된 뒤 변경되지 않습니다.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// 단일 네트워크 요청 결과
///
/// 요청마다 한 번 생성되고 호출자가 즉시 소비합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// 응답 본문 (원문)
    pub body: String,
    /// HTTP 상태 코드
    pub status_code: u16,
    /// 요청 시작부터 본문 수신까지의 경과 시간 (밀리초)
    pub latency_ms: u64,
}

impl ProbeResult {
    /// 기대 상태 코드와 일치하는지 확인합니다.
    pub fn has_status(&self, expected: u16) -> bool {
        self.status_code == expected
    }

    /// 본문에 특정 문자열이 포함되어 있는지 확인합니다.
    pub fn body_contains(&self, needle: &str) -> bool {
        self.body.contains(needle)
    }

    /// 선언된 응답 형태로 본문을 디코딩합니다.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProbeError> {
        serde_json::from_str(&self.body).map_err(|e| ProbeError::Decode {
            shape: std::any::type_name::<T>()
                .rsplit("::")
                .next()
                .unwrap_or("body")
                .to_owned(),
            reason: e.to_string(),
        })
    }
}

/// 테스트 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    /// 통과
    Pass,
    /// 실패. 종료 코드에 반영됨
    Fail,
    /// 건너뜀 (환경 의존적 미검출 등). 종료 코드에 반영되지 않음
    Skip,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

/// 단일 검증(assertion)의 결과
///
/// 검증마다 정확히 한 번 생성되어 결과 원장에 추가됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    /// 결과 ID (예: `"LC-02.3"`)
    pub id: String,
    /// 검증 이름
    pub name: String,
    /// 분류 (crud, lifecycle, performance, faults 등)
    pub category: String,
    /// 결과 상태
    pub status: OutcomeStatus,
    /// 소요 시간 (밀리초)
    pub duration_ms: u64,
    /// 기대값
    pub expected: String,
    /// 실제값
    pub actual: String,
    /// 부가 메시지
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestOutcome {
    /// 통과 결과를 생성합니다.
    pub fn pass(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(OutcomeStatus::Pass, id, name, category, expected, actual)
    }

    /// 실패 결과를 생성합니다.
    pub fn fail(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(OutcomeStatus::Fail, id, name, category, expected, actual)
    }

    /// 건너뜀 결과를 생성합니다.
    pub fn skip(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(OutcomeStatus::Skip, id, name, category, expected, actual)
    }

    fn new(
        status: OutcomeStatus,
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            status,
            duration_ms: 0,
            expected: expected.into(),
            actual: actual.into(),
            message: None,
        }
    }

    /// 소요 시간을 설정합니다.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// 부가 메시지를 설정합니다.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} (expected: {}, actual: {})",
            self.status, self.id, self.name, self.expected, self.actual,
        )
    }
}

/// 이슈 심각도
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 낮은 심각도
    #[default]
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적. 실행 중단 사유
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 단순 통과/실패를 넘어서는 결함 기록
///
/// 보안 또는 정합성 결함이 드러났을 때 생성되며, `TestOutcome`과 독립적입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// 심각도
    pub severity: Severity,
    /// 제목
    pub title: String,
    /// 상세 설명
    pub description: String,
}

impl Issue {
    /// 새 이슈를 생성합니다.
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.title)
    }
}

/// 하네스가 생성하는 외부 리소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// 게이트웨이 챗룸
    ChatRoom,
    /// 게이트웨이 콜백
    Callback,
    /// Kubernetes Job
    Job,
    /// Kubernetes Pod
    Pod,
    /// Kubernetes ServiceAccount
    ServiceAccount,
    /// Docker 컨테이너
    Container,
}

impl ResourceKind {
    /// 게이트웨이 HTTP 표면으로 삭제하는 리소스인지 반환합니다.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::ChatRoom | Self::Callback)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChatRoom => write!(f, "chatroom"),
            Self::Callback => write!(f, "callback"),
            Self::Job => write!(f, "job"),
            Self::Pod => write!(f, "pod"),
            Self::ServiceAccount => write!(f, "serviceaccount"),
            Self::Container => write!(f, "container"),
        }
    }
}

/// 시나리오가 생성한 외부 리소스 핸들
///
/// 프로비저닝 성공 직후 생성되고, 정리 시 정확히 한 번 소비됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// 리소스 종류
    pub kind: ResourceKind,
    /// 리소스 식별자 (ID 또는 이름)
    pub identifier: String,
    /// 네임스페이스 (클러스터 리소스만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl ResourceHandle {
    /// 네임스페이스 없는 핸들을 생성합니다.
    pub fn new(kind: ResourceKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            scope: None,
        }
    }

    /// 네임스페이스 핸들을 생성합니다.
    pub fn namespaced(
        kind: ResourceKind,
        identifier: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            scope: Some(namespace.into()),
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.identifier),
            None => write!(f, "{}/{}", self.kind, self.identifier),
        }
    }
}

/// 이름 붙은 성능 수치
///
/// 실행당 이름별로 최대 한 번 기록되며, 리포터만 읽습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    /// 메트릭 이름 (예: `"p95_latency_ms"`)
    pub name: String,
    /// 값
    pub value: f64,
}

/// 지연 시간 샘플 (밀리초)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LatencySample {
    pub value_ms: u64,
}

impl From<u64> for LatencySample {
    fn from(value_ms: u64) -> Self {
        Self { value_ms }
    }
}
