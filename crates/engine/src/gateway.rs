//! 게이트웨이 HTTP 표면에 대한 타입 있는 클라이언트
//!
//! 모든 요청은 [`Probe`]를 통해 나가며 응답은 [`ProbeResult`] 그대로 반환됩니다.
//! 상태 코드 판정은 시나리오 단계가 담당하고, 본문은 선언된 응답 형태
//! ([`ChatRoom`], [`Callback`])로 디코딩합니다.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use faascheck_core::error::ProbeError;
use faascheck_core::types::ProbeResult;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::probe::{HttpMethod, Probe, RequestSpec};

/// 배포 백엔드 (`c_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// 컨테이너 엔진 직접 실행
    Docker,
    /// 오케스트레이션 클러스터
    Kube,
}

impl Backend {
    /// `c_type` 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Kube => "kube",
        }
    }

    /// 함수 호출 경로 접두어
    pub fn invoke_prefix(&self) -> &'static str {
        match self {
            Self::Docker => "/api",
            Self::Kube => "/api/kube",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "kube" | "kubernetes" => Ok(Self::Kube),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// 콜백 배포 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    /// 등록만 됨
    #[default]
    Pending,
    /// 빌드 중
    Build,
    /// 배포 완료
    Deployed,
    /// 빌드 실패
    Failed,
    /// 배포 해제됨
    Undeployed,
    /// 알 수 없는 값
    #[serde(other)]
    Unknown,
}

impl DeployStatus {
    /// 빌드 대기의 종료 상태인지 반환합니다.
    pub fn is_build_terminal(&self) -> bool {
        matches!(self, Self::Deployed | Self::Failed)
    }

    /// 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Build => "build",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::Undeployed => "undeployed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 챗룸 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub chat_id: i64,
    pub title: String,
    #[serde(default)]
    pub callback_id: Option<i64>,
}

/// 콜백 응답
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callback {
    pub callback_id: i64,
    pub path: String,
    pub method: String,
    #[serde(rename = "type")]
    pub runtime: String,
    #[serde(default)]
    pub status: DeployStatus,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub env: Option<serde_json::Map<String, serde_json::Value>>,
}

/// 콜백 등록/수정 요청
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCallback {
    pub path: String,
    pub method: String,
    #[serde(rename = "type")]
    pub runtime: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<serde_json::Value>,
}

impl NewCallback {
    /// 입력 이벤트를 그대로 돌려주는 최소 함수
    pub fn echo(path: impl Into<String>, runtime: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: "POST".to_owned(),
            runtime: runtime.into(),
            code: "def lambda_handler(event, context):\n    return {\"echo\": event}\n".to_owned(),
            chat_id: None,
            library: None,
            env: None,
        }
    }

    /// 챗룸에 연결합니다.
    pub fn linked_to(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }
}

/// 게이트웨이 클라이언트
pub struct GatewayClient<P> {
    probe: Arc<P>,
    deploy_timeout: Duration,
}

impl<P> Clone for GatewayClient<P> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            deploy_timeout: self.deploy_timeout,
        }
    }
}

impl<P: Probe> GatewayClient<P> {
    /// 프로브와 배포 요청 타임아웃으로 클라이언트를 생성합니다.
    pub fn new(probe: Arc<P>, deploy_timeout: Duration) -> Self {
        Self {
            probe,
            deploy_timeout,
        }
    }

    /// 내부 프로브
    pub fn probe(&self) -> &Arc<P> {
        &self.probe
    }

    async fn send(&self, spec: RequestSpec) -> Result<ProbeResult, ProbeError> {
        self.probe.execute(&spec).await
    }

    // --- health ---

    /// `GET /health`
    pub async fn health(&self) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::get("/health")).await
    }

    // --- chatroom ---

    /// `POST /chatroom/`
    pub async fn create_room(&self, title: &str) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::post("/chatroom/").json(json!({ "title": title })))
            .await
    }

    /// `GET /chatroom/{id}`
    pub async fn get_room(&self, chat_id: i64) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::get(format!("/chatroom/{chat_id}")))
            .await
    }

    /// `PUT /chatroom/{id}`
    pub async fn update_room(&self, chat_id: i64, title: &str) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::put(format!("/chatroom/{chat_id}")).json(json!({ "title": title })))
            .await
    }

    /// `DELETE /chatroom/{id}`. 연결된 콜백도 함께 삭제됩니다.
    pub async fn delete_room(&self, chat_id: i64) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::delete(format!("/chatroom/{chat_id}")))
            .await
    }

    /// `GET /chatroom/`
    pub async fn list_rooms(&self) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::get("/chatroom/")).await
    }

    // --- callbacks ---

    /// `POST /callbacks/`
    pub async fn create_callback(&self, callback: &NewCallback) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::post("/callbacks/").json(to_json(callback)?))
            .await
    }

    /// 원시 JSON 본문으로 `POST /callbacks/` (입력 검증 확인용)
    pub async fn create_callback_raw(
        &self,
        body: serde_json::Value,
    ) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::post("/callbacks/").json(body)).await
    }

    /// `GET /callbacks/{id}`
    pub async fn get_callback(&self, callback_id: i64) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::get(format!("/callbacks/{callback_id}")))
            .await
    }

    /// `PUT /callbacks/{id}`
    pub async fn update_callback(
        &self,
        callback_id: i64,
        changes: serde_json::Value,
    ) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::put(format!("/callbacks/{callback_id}")).json(changes))
            .await
    }

    /// `DELETE /callbacks/{id}`. 빌드 중이면 400이 기대됩니다.
    pub async fn delete_callback(&self, callback_id: i64) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::delete(format!("/callbacks/{callback_id}")))
            .await
    }

    /// `GET /callbacks/`
    pub async fn list_callbacks(&self) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::get("/callbacks/")).await
    }

    /// `GET /callbacks/path/{path}`
    pub async fn callback_by_path(&self, path: &str) -> Result<ProbeResult, ProbeError> {
        self.send(RequestSpec::get(format!("/callbacks/path/{path}")))
            .await
    }

    /// 콜백의 현재 배포 상태를 조회합니다.
    ///
    /// 200이 아닌 응답은 에러로 반환되어 상태 폴러가 재시도합니다.
    pub async fn callback_status(&self, callback_id: i64) -> Result<DeployStatus, ProbeError> {
        let result = self.get_callback(callback_id).await?;
        if !result.has_status(200) {
            return Err(ProbeError::Request {
                target: format!("GET /callbacks/{callback_id}"),
                reason: format!("unexpected status {}", result.status_code),
            });
        }
        Ok(result.decode::<Callback>()?.status)
    }

    // --- deploy ---

    /// `POST /deploy/`. `status=false`는 배포 해제입니다.
    pub async fn deploy(
        &self,
        callback_id: i64,
        status: bool,
        backend: Backend,
    ) -> Result<ProbeResult, ProbeError> {
        self.send(
            RequestSpec::post("/deploy/")
                .json(json!({
                    "callback_id": callback_id,
                    "status": status,
                    "c_type": backend.as_str(),
                }))
                .timeout(self.deploy_timeout),
        )
        .await
    }

    // --- invoke ---

    /// 배포된 함수 호출 요청 명세
    pub fn invoke_spec(
        backend: Backend,
        path: &str,
        method: HttpMethod,
        event: Option<serde_json::Value>,
    ) -> RequestSpec {
        let spec = RequestSpec::new(
            method,
            format!("{}/{}", backend.invoke_prefix(), path.trim_start_matches('/')),
        );
        match event {
            Some(event) => spec.json(event),
            None => spec,
        }
    }

    /// `GET|POST /api/{path}` 또는 `/api/kube/{path}`
    pub async fn invoke(
        &self,
        backend: Backend,
        path: &str,
        method: HttpMethod,
        event: Option<serde_json::Value>,
    ) -> Result<ProbeResult, ProbeError> {
        self.send(Self::invoke_spec(backend, path, method, event))
            .await
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ProbeError> {
    serde_json::to_value(value).map_err(|e| ProbeError::Request {
        target: "request body".to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProbe;

    fn client(probe: MockProbe) -> (Arc<MockProbe>, GatewayClient<MockProbe>) {
        let probe = Arc::new(probe);
        (
            Arc::clone(&probe),
            GatewayClient::new(probe, Duration::from_secs(60)),
        )
    }

    #[test]
    fn backend_parsing_and_prefix() {
        assert_eq!("docker".parse::<Backend>().unwrap(), Backend::Docker);
        assert_eq!("Kubernetes".parse::<Backend>().unwrap(), Backend::Kube);
        assert!("lambda".parse::<Backend>().is_err());
        assert_eq!(Backend::Kube.invoke_prefix(), "/api/kube");
    }

    #[test]
    fn deploy_status_decoding_tolerates_unknown_values() {
        let cb: Callback = serde_json::from_str(
            r#"{"callback_id":7,"path":"hello","method":"POST","type":"python","status":"warming","updated_at":"2024-01-01T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(cb.status, DeployStatus::Unknown);
        assert_eq!(cb.runtime, "python");
        assert!(DeployStatus::Failed.is_build_terminal());
        assert!(!DeployStatus::Build.is_build_terminal());
    }

    #[test]
    fn new_callback_serializes_gateway_field_names() {
        let body = serde_json::to_value(NewCallback::echo("hello", "python").linked_to(3)).unwrap();
        assert_eq!(body["type"], "python");
        assert_eq!(body["chat_id"], 3);
        assert!(body.get("library").is_none());
    }

    #[test]
    fn invoke_spec_routes_by_backend() {
        let spec = GatewayClient::<MockProbe>::invoke_spec(
            Backend::Kube,
            "/hello",
            HttpMethod::Post,
            Some(json!({"x": 1})),
        );
        assert_eq!(spec.path, "/api/kube/hello");
        assert!(spec.body.is_some());

        let spec = GatewayClient::<MockProbe>::invoke_spec(Backend::Docker, "hello", HttpMethod::Get, None);
        assert_eq!(spec.path, "/api/hello");
    }

    #[tokio::test]
    async fn create_room_decodes_typed_shape() {
        let (_, gateway) = client(MockProbe::new().on(
            HttpMethod::Post,
            "/chatroom/",
            200,
            r#"{"chat_id":11,"title":"faascheck","callback_id":null,"created_at":"2024-01-01T00:00:00"}"#,
        ));
        let result = gateway.create_room("faascheck").await.unwrap();
        let room: ChatRoom = result.decode().unwrap();
        assert_eq!(room.chat_id, 11);
        assert_eq!(room.callback_id, None);
    }

    #[tokio::test]
    async fn deploy_sends_c_type_and_status() {
        let (probe, gateway) = client(MockProbe::new().on(HttpMethod::Post, "/deploy/", 200, "{}"));
        gateway.deploy(5, false, Backend::Kube).await.unwrap();

        let body = probe.last_body(HttpMethod::Post, "/deploy/").unwrap();
        assert_eq!(body, json!({"callback_id": 5, "status": false, "c_type": "kube"}));
    }

    #[tokio::test]
    async fn callback_status_reports_non_200_as_error() {
        let (_, gateway) = client(
            MockProbe::new()
                .on(HttpMethod::Get, "/callbacks/9", 404, r#"{"detail":"Callback not found"}"#),
        );
        let err = gateway.callback_status(9).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn callback_status_decodes_status_field() {
        let (_, gateway) = client(MockProbe::new().on(
            HttpMethod::Get,
            "/callbacks/9",
            200,
            r#"{"callback_id":9,"path":"p","method":"GET","type":"python","status":"build"}"#,
        ));
        assert_eq!(gateway.callback_status(9).await.unwrap(), DeployStatus::Build);
    }
}
