//! 메트릭 상수 및 설명 등록
//!
//! 하네스가 내보내는 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `faascheck_`
//! - 구성 요소: `probe_`, `poller_`, `load_`, `resources_`, `faults_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 상태 레이블 키 (PASS, FAIL, SKIP)
pub const LABEL_STATUS: &str = "status";

/// 심각도 레이블 키 (Low, Medium, High, Critical)
pub const LABEL_SEVERITY: &str = "severity";

/// HTTP 메서드 레이블 키
pub const LABEL_METHOD: &str = "method";

/// 리소스 종류 레이블 키 (chatroom, callback, job, ...)
pub const LABEL_KIND: &str = "kind";

/// 장애 유형 레이블 키 (OOMKilled, ImagePullBackOff, ...)
pub const LABEL_FAULT: &str = "fault";

/// 결과 레이블 키 (success, failure, timeout)
pub const LABEL_RESULT: &str = "result";

// ─── Probe 메트릭 ───────────────────────────────────────────────────

/// Probe: 전송한 요청 수 (counter, labels: method, result)
pub const PROBE_REQUESTS_TOTAL: &str = "faascheck_probe_requests_total";

/// Probe: 요청 지연 시간 (histogram, 초)
pub const PROBE_LATENCY_SECONDS: &str = "faascheck_probe_latency_seconds";

// ─── Poller 메트릭 ──────────────────────────────────────────────────

/// Poller: 상태 확인 시도 수 (counter)
pub const POLLER_ATTEMPTS_TOTAL: &str = "faascheck_poller_attempts_total";

/// Poller: 타임아웃으로 끝난 폴링 수 (counter)
pub const POLLER_TIMEOUTS_TOTAL: &str = "faascheck_poller_timeouts_total";

// ─── Load 메트릭 ────────────────────────────────────────────────────

/// Load: 부하 실행에서 수집한 샘플 수 (counter, label: result)
pub const LOAD_SAMPLES_TOTAL: &str = "faascheck_load_samples_total";

// ─── 결과 원장 메트릭 ───────────────────────────────────────────────

/// Ledger: 기록된 결과 수 (counter, label: status)
pub const OUTCOMES_TOTAL: &str = "faascheck_outcomes_total";

/// Ledger: 기록된 이슈 수 (counter, label: severity)
pub const ISSUES_TOTAL: &str = "faascheck_issues_total";

// ─── Resource 메트릭 ────────────────────────────────────────────────

/// Resources: 등록된 외부 리소스 수 (counter, label: kind)
pub const RESOURCES_CREATED_TOTAL: &str = "faascheck_resources_created_total";

/// Resources: 정리된 외부 리소스 수 (counter, labels: kind, result)
pub const RESOURCES_RELEASED_TOTAL: &str = "faascheck_resources_released_total";

// ─── Fault 메트릭 ───────────────────────────────────────────────────

/// Faults: 주입한 장애 수 (counter, label: fault)
pub const FAULTS_INJECTED_TOTAL: &str = "faascheck_faults_injected_total";

/// Faults: 시그니처가 관측된 장애 수 (counter, label: fault)
pub const FAULTS_DETECTED_TOTAL: &str = "faascheck_faults_detected_total";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 요청 지연 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 60s 범위 (콜드 스타트와 빌드 포함)
pub const PROBE_LATENCY_BUCKETS: [f64; 11] = [
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 15.0, 60.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        PROBE_REQUESTS_TOTAL,
        "Total number of HTTP requests issued against the target gateway"
    );
    describe_histogram!(
        PROBE_LATENCY_SECONDS,
        "Wall-clock latency of a single gateway request in seconds"
    );
    describe_counter!(
        POLLER_ATTEMPTS_TOTAL,
        "Total number of state checks issued by the state poller"
    );
    describe_counter!(
        POLLER_TIMEOUTS_TOTAL,
        "Total number of polls that exhausted their timeout"
    );
    describe_counter!(
        LOAD_SAMPLES_TOTAL,
        "Total number of latency samples collected by the load generator"
    );
    describe_counter!(OUTCOMES_TOTAL, "Test outcomes recorded, by status");
    describe_counter!(ISSUES_TOTAL, "Issues discovered, by severity");
    describe_counter!(
        RESOURCES_CREATED_TOTAL,
        "External resources registered for teardown, by kind"
    );
    describe_counter!(
        RESOURCES_RELEASED_TOTAL,
        "External resources released during teardown, by kind and result"
    );
    describe_counter!(FAULTS_INJECTED_TOTAL, "Faults injected, by fault class");
    describe_counter!(
        FAULTS_DETECTED_TOTAL,
        "Faults whose failure signature was observed, by fault class"
    );
}
