//! 타임드 프로브: 단일 HTTP 요청 실행 및 지연 시간 측정
//!
//! [`Probe`] trait은 네트워크 요청 하나를 실행하여 [`ProbeResult`]를 반환합니다.
//! 운영 코드는 [`TimedProbe`](reqwest 기반)를, 테스트는 스크립트된 mock을 사용합니다.
//!
//! 프로브는 절대 재시도하지 않습니다. 재시도는 상태 폴러만의 책임입니다.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use faascheck_core::config::TargetConfig;
use faascheck_core::error::ProbeError;
use faascheck_core::metrics as m;
use faascheck_core::types::ProbeResult;
use tracing::debug;

use crate::error::EngineError;

/// HTTP 메서드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// 메서드 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// 요청 명세
///
/// 경로는 프로브의 기본 URL에 대한 상대 경로입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// HTTP 메서드
    pub method: HttpMethod,
    /// 요청 경로 (예: `/chatroom/`)
    pub path: String,
    /// 추가 헤더
    pub headers: Vec<(String, String)>,
    /// JSON 본문
    pub body: Option<serde_json::Value>,
    /// 요청별 전체 타임아웃 (없으면 프로브 기본값)
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    /// 주어진 메서드와 경로로 요청 명세를 생성합니다.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// GET 요청
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// POST 요청
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// PUT 요청
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// DELETE 요청
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// JSON 본문을 설정합니다.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// 헤더를 추가합니다.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 요청별 타임아웃을 설정합니다.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 로그와 에러 메시지에 쓰는 `METHOD /path` 표기
    pub fn target(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// 단일 요청 실행 추상화
///
/// `Send + Sync + 'static`이므로 부하 생성기 워커 사이에서 `Arc`로 공유할 수 있습니다.
pub trait Probe: Send + Sync + 'static {
    /// 요청을 한 번 실행합니다.
    ///
    /// HTTP 상태 코드가 있는 응답은 상태와 무관하게 `Ok`입니다.
    /// 원격 종단이 제때 응답하지 않으면 `ProbeError::Timeout` 또는
    /// `ProbeError::Connection`을 반환합니다.
    fn execute(
        &self,
        spec: &RequestSpec,
    ) -> impl Future<Output = Result<ProbeResult, ProbeError>> + Send;
}

impl<P: Probe> Probe for Arc<P> {
    fn execute(
        &self,
        spec: &RequestSpec,
    ) -> impl Future<Output = Result<ProbeResult, ProbeError>> + Send {
        (**self).execute(spec)
    }
}

/// reqwest 기반 운영용 프로브
#[derive(Debug, Clone)]
pub struct TimedProbe {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl TimedProbe {
    /// 기본 URL과 타임아웃으로 프로브를 생성합니다.
    ///
    /// 연결 타임아웃과 전체 타임아웃은 모든 요청에 강제됩니다.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| EngineError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            request_timeout,
        })
    }

    /// 대상 설정으로 프로브를 생성합니다.
    pub fn from_config(config: &TargetConfig) -> Result<Self, EngineError> {
        Self::new(
            config.base_url.clone(),
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    /// 기본 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(&self, spec: &RequestSpec, err: reqwest::Error) -> ProbeError {
        let target = spec.target();
        if err.is_timeout() {
            ProbeError::Timeout {
                target,
                timeout_ms: spec.timeout.unwrap_or(self.request_timeout).as_millis() as u64,
            }
        } else if err.is_connect() {
            ProbeError::Connection {
                target,
                reason: err.to_string(),
            }
        } else {
            ProbeError::Request {
                target,
                reason: err.to_string(),
            }
        }
    }
}

impl Probe for TimedProbe {
    async fn execute(&self, spec: &RequestSpec) -> Result<ProbeResult, ProbeError> {
        let url = format!("{}{}", self.base_url, spec.path);
        let mut request = self.client.request(spec.method.into(), &url);
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }
        if let Some(timeout) = spec.timeout {
            request = request.timeout(timeout);
        }

        let started = Instant::now();
        let outcome = async {
            let response = request.send().await?;
            let status_code = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status_code, body))
        }
        .await;
        let elapsed = started.elapsed();

        metrics::histogram!(m::PROBE_LATENCY_SECONDS).record(elapsed.as_secs_f64());

        match outcome {
            Ok((status_code, body)) => {
                metrics::counter!(
                    m::PROBE_REQUESTS_TOTAL,
                    m::LABEL_METHOD => spec.method.as_str(),
                    m::LABEL_RESULT => "response"
                )
                .increment(1);
                let latency_ms = elapsed.as_millis() as u64;
                debug!(target = %spec.target(), status_code, latency_ms, "probe completed");
                Ok(ProbeResult {
                    body,
                    status_code,
                    latency_ms,
                })
            }
            Err(e) => {
                let err = self.classify(spec, e);
                let result = if err.is_timeout() { "timeout" } else { "error" };
                metrics::counter!(
                    m::PROBE_REQUESTS_TOTAL,
                    m::LABEL_METHOD => spec.method.as_str(),
                    m::LABEL_RESULT => result
                )
                .increment(1);
                debug!(target = %spec.target(), error = %err, "probe failed");
                Err(err)
            }
        }
    }
}
