//! 장애 유형과 명세
//!
//! 각 장애 유형은 백엔드에 제출할 병적인 작업과, 감지해야 할 실패 시그니처
//! (컨테이너의 종료/대기 사유, Job 조건 사유 등)를 함께 정의합니다.

use std::fmt;
use std::str::FromStr;

use faascheck_core::config::ChaosConfig;
use faascheck_core::types::{ResourceHandle, ResourceKind};
use serde::Serialize;

use crate::error::ChaosError;

/// 장애 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// 메모리 제한 초과로 인한 강제 종료
    OomKilled,
    /// 해석할 수 없는 이미지 참조
    ImagePullBackOff,
    /// 즉시 비정상 종료하는 명령의 재시작 반복
    CrashLoopBackOff,
    /// 도달할 수 없는 실행 기한
    DeadlineExceeded,
    /// 권한이 없는 ServiceAccount
    AuthorizationDenied,
}

impl FaultKind {
    /// 기본 실행 순서
    pub const ALL: [FaultKind; 5] = [
        FaultKind::OomKilled,
        FaultKind::ImagePullBackOff,
        FaultKind::CrashLoopBackOff,
        FaultKind::DeadlineExceeded,
        FaultKind::AuthorizationDenied,
    ];

    /// 유형 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OomKilled => "oom_killed",
            Self::ImagePullBackOff => "image_pull_backoff",
            Self::CrashLoopBackOff => "crash_loop_backoff",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::AuthorizationDenied => "authorization_denied",
        }
    }

    /// 감지로 인정하는 사유 값. 첫 번째가 대표 시그니처입니다.
    ///
    /// 이미지 풀 실패는 back-off 전에 `ErrImagePull`로 먼저 보고됩니다.
    pub fn signatures(&self) -> &'static [&'static str] {
        match self {
            Self::OomKilled => &["OOMKilled"],
            Self::ImagePullBackOff => &["ImagePullBackOff", "ErrImagePull"],
            Self::CrashLoopBackOff => &["CrashLoopBackOff"],
            Self::DeadlineExceeded => &["DeadlineExceeded"],
            Self::AuthorizationDenied => &["Forbidden"],
        }
    }

    /// 대표 시그니처
    pub fn signature(&self) -> &'static str {
        self.signatures()[0]
    }

    /// 제출되는 리소스 종류
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            Self::OomKilled | Self::DeadlineExceeded => ResourceKind::Job,
            Self::ImagePullBackOff | Self::CrashLoopBackOff => ResourceKind::Pod,
            Self::AuthorizationDenied => ResourceKind::ServiceAccount,
        }
    }

    /// 감지 창 안에 시그니처가 나타나지 않았을 때의 SKIP 메시지
    pub fn undetected_reason(&self) -> &'static str {
        match self {
            Self::OomKilled => "insufficient memory pressure: OOMKilled not observed",
            Self::ImagePullBackOff => "image pull failure not reported by the backend",
            Self::CrashLoopBackOff => "restart back-off not reached within the window",
            Self::DeadlineExceeded => "active deadline not enforced within the window",
            Self::AuthorizationDenied => "access review did not deny the unbound identity",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "oom" | "oom_killed" | "oomkilled" => Ok(Self::OomKilled),
            "image_pull" | "image_pull_backoff" | "imagepullbackoff" => Ok(Self::ImagePullBackOff),
            "crash_loop" | "crash_loop_backoff" | "crashloopbackoff" => Ok(Self::CrashLoopBackOff),
            "deadline" | "deadline_exceeded" => Ok(Self::DeadlineExceeded),
            "auth" | "authorization_denied" | "forbidden" => Ok(Self::AuthorizationDenied),
            _ => Err(format!("unknown fault kind '{s}'")),
        }
    }
}

/// 백엔드에 제출할 장애 작업 명세
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultSpec {
    /// 장애 유형
    pub kind: FaultKind,
    /// 리소스 이름 (실행마다 고유)
    pub name: String,
    /// 네임스페이스
    pub namespace: String,
    /// 컨테이너 이미지 (ServiceAccount 유형은 빈 값)
    pub image: String,
    /// 컨테이너 명령
    pub command: Vec<String>,
    /// 메모리 제한 (Kubernetes 수량 표기)
    pub memory_limit: Option<String>,
    /// 실행 기한 (초)
    pub deadline_secs: Option<u64>,
}

impl FaultSpec {
    /// 설정에서 장애 유형별 명세를 만듭니다.
    pub fn from_config(kind: FaultKind, name: impl Into<String>, config: &ChaosConfig) -> Self {
        let mut spec = Self {
            kind,
            name: name.into(),
            namespace: config.namespace.clone(),
            image: config.busybox_image.clone(),
            command: Vec::new(),
            memory_limit: None,
            deadline_secs: None,
        };
        match kind {
            FaultKind::OomKilled => {
                spec.image = config.stress_image.clone();
                spec.command = args(&[
                    "stress",
                    "--vm",
                    "1",
                    "--vm-bytes",
                    "256M",
                    "--vm-hang",
                    "1",
                ]);
                spec.memory_limit = Some(config.memory_limit.clone());
            }
            FaultKind::ImagePullBackOff => {
                spec.image = config.unresolvable_image.clone();
            }
            FaultKind::CrashLoopBackOff => {
                spec.command = args(&["sh", "-c", "echo faascheck crash probe; exit 1"]);
            }
            FaultKind::DeadlineExceeded => {
                spec.command = args(&["sleep", "3600"]);
                spec.deadline_secs = Some(config.deadline_secs);
            }
            FaultKind::AuthorizationDenied => {
                spec.image.clear();
            }
        }
        spec
    }

    /// 정리용 리소스 핸들
    pub fn handle(&self) -> ResourceHandle {
        ResourceHandle::namespaced(self.kind.resource_kind(), &self.name, &self.namespace)
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
}

/// 백엔드에서 읽은 상태 사유와 이벤트 이력
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// 컨테이너 종료/대기 사유, Job 조건 사유 등
    pub reasons: Vec<String>,
    /// 관련 이벤트 (`reason: message`)
    pub events: Vec<String>,
}

impl Observation {
    /// 장애 유형의 시그니처와 일치하는 첫 사유를 반환합니다.
    pub fn signature_for(&self, kind: FaultKind) -> Option<&str> {
        let signatures = kind.signatures();
        self.reasons
            .iter()
            .map(String::as_str)
            .find(|reason| signatures.contains(reason))
    }

    /// 관측된 사유를 요약합니다.
    pub fn summary(&self) -> String {
        if self.reasons.is_empty() {
            "no reason reported".to_owned()
        } else {
            self.reasons.join(", ")
        }
    }
}

/// Kubernetes 메모리 수량을 바이트로 변환합니다 (`32Mi`, `64M`, `1Gi`, `1048576`).
pub fn parse_memory(quantity: &str) -> Result<i64, ChaosError> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(quantity.len());
    let (digits, unit) = quantity.split_at(split);
    let invalid = |reason: &str| ChaosError::InvalidSpec {
        field: "chaos.memory_limit".to_owned(),
        reason: format!("'{quantity}': {reason}"),
    };

    let value: i64 = digits.parse().map_err(|_| invalid("missing number"))?;
    let multiplier: i64 = match unit {
        "" => 1,
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "K" | "k" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        _ => return Err(invalid("unknown unit")),
    };
    value
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("value too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oom_spec_carries_memory_limit_and_stress_image() {
        let config = ChaosConfig::default();
        let spec = FaultSpec::from_config(FaultKind::OomKilled, "fc-oom-1", &config);
        assert_eq!(spec.memory_limit.as_deref(), Some("32Mi"));
        assert_eq!(spec.image, config.stress_image);
        assert_eq!(spec.command[0], "stress");
        assert_eq!(spec.handle().kind, ResourceKind::Job);
        assert_eq!(spec.handle().scope.as_deref(), Some("default"));
    }

    #[test]
    fn deadline_spec_uses_configured_deadline() {
        let config = ChaosConfig {
            deadline_secs: 3,
            ..ChaosConfig::default()
        };
        let spec = FaultSpec::from_config(FaultKind::DeadlineExceeded, "fc-deadline", &config);
        assert_eq!(spec.deadline_secs, Some(3));
        assert_eq!(spec.command, vec!["sleep", "3600"]);
    }

    #[test]
    fn image_pull_matches_either_pull_reason() {
        let observation = Observation {
            reasons: vec!["ContainerCreating".to_owned(), "ErrImagePull".to_owned()],
            events: Vec::new(),
        };
        assert_eq!(
            observation.signature_for(FaultKind::ImagePullBackOff),
            Some("ErrImagePull")
        );
        assert_eq!(observation.signature_for(FaultKind::OomKilled), None);
    }

    #[test]
    fn error_exit_is_not_an_oom_signature() {
        let observation = Observation {
            reasons: vec!["Error".to_owned()],
            events: Vec::new(),
        };
        assert_eq!(observation.signature_for(FaultKind::OomKilled), None);
        assert_eq!(observation.summary(), "Error");
        assert_eq!(Observation::default().summary(), "no reason reported");
    }

    #[test]
    fn fault_kind_parses_short_and_long_names() {
        assert_eq!("oom".parse::<FaultKind>().unwrap(), FaultKind::OomKilled);
        assert_eq!(
            "crash-loop-backoff".parse::<FaultKind>().unwrap(),
            FaultKind::CrashLoopBackOff
        );
        for kind in FaultKind::ALL {
            assert_eq!(kind.as_str().parse::<FaultKind>().unwrap(), kind);
        }
        assert!("meltdown".parse::<FaultKind>().is_err());
    }

    #[test]
    fn memory_quantities() {
        assert_eq!(parse_memory("32Mi").unwrap(), 32 * 1024 * 1024);
        assert_eq!(parse_memory("64M").unwrap(), 64_000_000);
        assert_eq!(parse_memory("1Gi").unwrap(), 1 << 30);
        assert_eq!(parse_memory("4096").unwrap(), 4096);
        assert!(parse_memory("Mi").is_err());
        assert!(parse_memory("32Xi").is_err());
    }
}
