//! 설정 관리: faascheck.toml 파싱 및 런타임 설정
//!
//! [`FaascheckConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`FAASCHECK_TARGET_BASE_URL=http://gateway:8000` 형식)
//! 3. 설정 파일 (`faascheck.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), faascheck_core::error::FaascheckError> {
//! use faascheck_core::config::FaascheckConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = FaascheckConfig::load("faascheck.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = FaascheckConfig::parse("[load]\nconcurrency = 4")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, FaascheckError};

/// 허용되는 로그 레벨
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// 허용되는 로그 형식
const LOG_FORMATS: &[&str] = &["json", "pretty"];

/// 배포 백엔드 이름 (`c_type`)
pub const BACKENDS: &[&str] = &["docker", "kube"];

/// faascheck 통합 설정
///
/// `faascheck.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaascheckConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 대상 게이트웨이 설정
    #[serde(default)]
    pub target: TargetConfig,
    /// 상태 폴러 설정
    #[serde(default)]
    pub poller: PollerConfig,
    /// 부하 생성기 설정
    #[serde(default)]
    pub load: LoadConfig,
    /// 장애 주입 설정
    #[serde(default)]
    pub chaos: ChaosConfig,
}

impl FaascheckConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FaascheckError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 주어지면 로드하고, 없으면 기본값에 환경변수만 적용합니다.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, FaascheckError> {
        match path {
            Some(path) => Self::load(path).await,
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, FaascheckError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FaascheckError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                FaascheckError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, FaascheckError> {
        toml::from_str(toml_str).map_err(|e| {
            FaascheckError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `FAASCHECK_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "FAASCHECK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "FAASCHECK_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.report_dir, "FAASCHECK_GENERAL_REPORT_DIR");

        // Target
        override_string(&mut self.target.base_url, "FAASCHECK_TARGET_BASE_URL");
        override_u64(
            &mut self.target.connect_timeout_ms,
            "FAASCHECK_TARGET_CONNECT_TIMEOUT_MS",
        );
        override_u64(
            &mut self.target.request_timeout_ms,
            "FAASCHECK_TARGET_REQUEST_TIMEOUT_MS",
        );
        override_u64(
            &mut self.target.deploy_timeout_secs,
            "FAASCHECK_TARGET_DEPLOY_TIMEOUT_SECS",
        );
        override_string(&mut self.target.runtime, "FAASCHECK_TARGET_RUNTIME");
        override_csv(&mut self.target.backends, "FAASCHECK_TARGET_BACKENDS");

        // Poller
        override_u64(
            &mut self.poller.build_timeout_secs,
            "FAASCHECK_POLLER_BUILD_TIMEOUT_SECS",
        );
        override_u64(&mut self.poller.interval_ms, "FAASCHECK_POLLER_INTERVAL_MS");
        override_u64(
            &mut self.poller.cascade_grace_secs,
            "FAASCHECK_POLLER_CASCADE_GRACE_SECS",
        );
        override_u64(
            &mut self.poller.delete_race_delay_ms,
            "FAASCHECK_POLLER_DELETE_RACE_DELAY_MS",
        );

        // Load
        override_usize(&mut self.load.total_requests, "FAASCHECK_LOAD_TOTAL_REQUESTS");
        override_usize(&mut self.load.concurrency, "FAASCHECK_LOAD_CONCURRENCY");
        override_u16(&mut self.load.expected_status, "FAASCHECK_LOAD_EXPECTED_STATUS");
        override_usize(
            &mut self.load.warm_invocations,
            "FAASCHECK_LOAD_WARM_INVOCATIONS",
        );
        override_opt_u64(&mut self.load.p95_budget_ms, "FAASCHECK_LOAD_P95_BUDGET_MS");

        // Chaos
        override_bool(&mut self.chaos.enabled, "FAASCHECK_CHAOS_ENABLED");
        override_string(&mut self.chaos.backend, "FAASCHECK_CHAOS_BACKEND");
        override_string(&mut self.chaos.namespace, "FAASCHECK_CHAOS_NAMESPACE");
        override_string(&mut self.chaos.docker_socket, "FAASCHECK_CHAOS_DOCKER_SOCKET");
        override_u64(
            &mut self.chaos.detection_window_secs,
            "FAASCHECK_CHAOS_DETECTION_WINDOW_SECS",
        );
        override_string(&mut self.chaos.memory_limit, "FAASCHECK_CHAOS_MEMORY_LIMIT");
        override_string(&mut self.chaos.stress_image, "FAASCHECK_CHAOS_STRESS_IMAGE");
        override_string(&mut self.chaos.busybox_image, "FAASCHECK_CHAOS_BUSYBOX_IMAGE");
        override_string(
            &mut self.chaos.unresolvable_image,
            "FAASCHECK_CHAOS_UNRESOLVABLE_IMAGE",
        );
        override_u64(&mut self.chaos.deadline_secs, "FAASCHECK_CHAOS_DEADLINE_SECS");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FaascheckError> {
        self.general.validate()?;
        self.target.validate()?;
        self.poller.validate()?;
        self.load.validate()?;
        self.chaos.validate()?;
        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> FaascheckError {
    FaascheckError::Config(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    })
}

fn require_positive(field: &str, value: u64) -> Result<(), FaascheckError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than 0"));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 리포트 출력 디렉토리
    pub report_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            report_dir: "faascheck-reports".to_owned(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), FaascheckError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of {LOG_LEVELS:?}"),
            ));
        }
        if !LOG_FORMATS.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of {LOG_FORMATS:?}"),
            ));
        }
        if self.report_dir.trim().is_empty() {
            return Err(invalid("general.report_dir", "must not be empty"));
        }
        Ok(())
    }
}

/// 대상 게이트웨이 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// 게이트웨이 기본 URL
    pub base_url: String,
    /// TCP 연결 타임아웃 (밀리초)
    pub connect_timeout_ms: u64,
    /// 요청 전체 타임아웃 (밀리초)
    pub request_timeout_ms: u64,
    /// 배포 요청 타임아웃 (초)
    ///
    /// 빌드를 시작시키는 요청은 일반 요청보다 오래 걸릴 수 있습니다.
    pub deploy_timeout_secs: u64,
    /// 콜백 런타임 (`type` 필드)
    pub runtime: String,
    /// 생명주기 시나리오를 실행할 백엔드 목록
    pub backends: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_owned(),
            connect_timeout_ms: 3_000,
            request_timeout_ms: 10_000,
            deploy_timeout_secs: 60,
            runtime: "python".to_owned(),
            backends: vec!["docker".to_owned(), "kube".to_owned()],
        }
    }
}

impl TargetConfig {
    /// 연결 타임아웃
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 배포 요청 타임아웃
    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_secs)
    }

    fn validate(&self) -> Result<(), FaascheckError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(invalid(
                "target.base_url",
                "must start with http:// or https://",
            ));
        }
        require_positive("target.connect_timeout_ms", self.connect_timeout_ms)?;
        require_positive("target.request_timeout_ms", self.request_timeout_ms)?;
        require_positive("target.deploy_timeout_secs", self.deploy_timeout_secs)?;
        if self.runtime.trim().is_empty() {
            return Err(invalid("target.runtime", "must not be empty"));
        }
        for backend in &self.backends {
            if !BACKENDS.contains(&backend.as_str()) {
                return Err(invalid(
                    "target.backends",
                    format!("unknown backend '{backend}', expected one of {BACKENDS:?}"),
                ));
            }
        }
        Ok(())
    }
}

/// 상태 폴러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// 빌드 완료 대기 시간 (초)
    pub build_timeout_secs: u64,
    /// 폴링 간격 (밀리초)
    pub interval_ms: u64,
    /// 연쇄 삭제 확인 전 유예 시간 (초)
    pub cascade_grace_secs: u64,
    /// 빌드 중 삭제 시나리오에서 배포 시작 후 삭제까지의 지연 (밀리초)
    pub delete_race_delay_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            build_timeout_secs: 30,
            interval_ms: 1_000,
            cascade_grace_secs: 2,
            delete_race_delay_ms: 500,
        }
    }
}

impl PollerConfig {
    /// 빌드 대기 타임아웃
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// 폴링 간격
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// 연쇄 삭제 유예 시간
    pub fn cascade_grace(&self) -> Duration {
        Duration::from_secs(self.cascade_grace_secs)
    }

    /// 빌드 중 삭제 지연
    pub fn delete_race_delay(&self) -> Duration {
        Duration::from_millis(self.delete_race_delay_ms)
    }

    fn validate(&self) -> Result<(), FaascheckError> {
        require_positive("poller.build_timeout_secs", self.build_timeout_secs)?;
        require_positive("poller.interval_ms", self.interval_ms)?;
        require_positive("poller.cascade_grace_secs", self.cascade_grace_secs)?;
        Ok(())
    }
}

/// 부하 생성기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// 전체 요청 수
    pub total_requests: usize,
    /// 동시 워커 수
    pub concurrency: usize,
    /// 성공으로 간주하는 상태 코드
    pub expected_status: u16,
    /// 콜드 스타트 이후 웜 호출 횟수
    pub warm_invocations: usize,
    /// p95 지연 예산 (밀리초). 초과하면 Medium 이슈로 기록됩니다.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_budget_ms: Option<u64>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            concurrency: 10,
            expected_status: 200,
            warm_invocations: 5,
            p95_budget_ms: None,
        }
    }
}

impl LoadConfig {
    fn validate(&self) -> Result<(), FaascheckError> {
        if self.total_requests == 0 {
            return Err(invalid("load.total_requests", "must be greater than 0"));
        }
        if self.concurrency == 0 {
            return Err(invalid("load.concurrency", "must be greater than 0"));
        }
        if !(100..=599).contains(&self.expected_status) {
            return Err(invalid(
                "load.expected_status",
                "must be an HTTP status code (100-599)",
            ));
        }
        Ok(())
    }
}

/// 장애 주입 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 오케스트레이션 백엔드 (kube, docker)
    pub backend: String,
    /// 작업을 생성할 네임스페이스
    pub namespace: String,
    /// Docker 소켓 경로
    pub docker_socket: String,
    /// 장애 시그니처 감지 대기 시간 (초)
    pub detection_window_secs: u64,
    /// OOM 유도용 메모리 제한 (예: "32Mi")
    pub memory_limit: String,
    /// 메모리 부하 이미지
    pub stress_image: String,
    /// 셸 명령 실행용 이미지
    pub busybox_image: String,
    /// 존재하지 않는 이미지 참조
    pub unresolvable_image: String,
    /// 도달할 수 없는 실행 기한 (초)
    pub deadline_secs: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: "kube".to_owned(),
            namespace: "default".to_owned(),
            docker_socket: "/var/run/docker.sock".to_owned(),
            detection_window_secs: 60,
            memory_limit: "32Mi".to_owned(),
            stress_image: "polinux/stress:1.0.4".to_owned(),
            busybox_image: "busybox:1.36".to_owned(),
            unresolvable_image: "registry.invalid/faascheck/nonexistent:0.0.0".to_owned(),
            deadline_secs: 5,
        }
    }
}

impl ChaosConfig {
    /// 감지 대기 시간
    pub fn detection_window(&self) -> Duration {
        Duration::from_secs(self.detection_window_secs)
    }

    fn validate(&self) -> Result<(), FaascheckError> {
        // 비활성화 상태에서는 검증하지 않음
        if !self.enabled {
            return Ok(());
        }
        if !BACKENDS.contains(&self.backend.as_str()) {
            return Err(invalid(
                "chaos.backend",
                format!("must be one of {BACKENDS:?}"),
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(invalid("chaos.namespace", "must not be empty"));
        }
        require_positive("chaos.detection_window_secs", self.detection_window_secs)?;
        require_positive("chaos.deadline_secs", self.deadline_secs)?;
        if self.memory_limit.trim().is_empty() {
            return Err(invalid("chaos.memory_limit", "must not be empty"));
        }
        Ok(())
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

/// 빈 문자열은 값 해제로 취급합니다.
fn override_opt_u64(target: &mut Option<u64>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        if val.trim().is_empty() {
            *target = None;
            return;
        }
        match val.parse::<u64>() {
            Ok(parsed) => *target = Some(parsed),
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
