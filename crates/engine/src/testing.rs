//! 테스트 전용 스크립트 프로브

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use faascheck_core::error::ProbeError;
use faascheck_core::types::ProbeResult;

use crate::probe::{HttpMethod, Probe, RequestSpec};

type Scripted = Result<ProbeResult, ProbeError>;

/// (메서드, 경로)별로 미리 준비한 응답을 순서대로 돌려주는 프로브
///
/// 큐에 응답이 하나만 남으면 그 응답을 계속 반복합니다.
/// 등록되지 않은 경로는 404를 반환합니다.
#[derive(Debug, Default)]
pub struct MockProbe {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<RequestSpec>>,
}

pub fn response(status_code: u16, body: &str) -> ProbeResult {
    ProbeResult {
        body: body.to_owned(),
        status_code,
        latency_ms: 5,
    }
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: HttpMethod, path: &str, status_code: u16, body: &str) -> Self {
        self.push(method, path, Ok(response(status_code, body)))
    }

    pub fn on_latency(
        self,
        method: HttpMethod,
        path: &str,
        status_code: u16,
        latency_ms: u64,
    ) -> Self {
        let mut result = response(status_code, "{}");
        result.latency_ms = latency_ms;
        self.push(method, path, Ok(result))
    }

    pub fn on_error(self, method: HttpMethod, path: &str, err: ProbeError) -> Self {
        self.push(method, path, Err(err))
    }

    fn push(self, method: HttpMethod, path: &str, scripted: Scripted) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_owned()))
            .or_default()
            .push_back(scripted);
        self
    }

    pub fn calls(&self) -> Vec<(HttpMethod, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|spec| (spec.method, spec.path.clone()))
            .collect()
    }

    pub fn call_count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|spec| spec.method == method && spec.path == path)
            .count()
    }

    /// 해당 경로로 마지막에 보낸 JSON 본문
    pub fn last_body(&self, method: HttpMethod, path: &str) -> Option<serde_json::Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|spec| spec.method == method && spec.path == path)
            .and_then(|spec| spec.body.clone())
    }
}

impl Probe for MockProbe {
    async fn execute(&self, spec: &RequestSpec) -> Result<ProbeResult, ProbeError> {
        self.requests.lock().unwrap().push(spec.clone());

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(spec.method, spec.path.clone())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Ok(response(404, r#"{"detail":"Not Found"}"#)),
        }
    }
}

pub fn timeout_error(target: &str) -> ProbeError {
    ProbeError::Timeout {
        target: target.to_owned(),
        timeout_ms: 100,
    }
}

pub fn connection_error(target: &str) -> ProbeError {
    ProbeError::Connection {
        target: target.to_owned(),
        reason: "connection refused".to_owned(),
    }
}
