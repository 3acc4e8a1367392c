//! 장애 주입기/감지기
//!
//! 병적인 작업을 제출한 뒤 [`StatePoller`]로 실패 시그니처를 기다립니다.
//! 성공 조건 대신 "사유가 시그니처와 일치"를 종료 조건으로 사용합니다.
//! 감지 창 안에 나타나지 않은 시그니처는 환경 의존 결과이므로
//! 호출자가 SKIP으로 기록합니다.

use std::sync::Arc;
use std::time::Duration;

use faascheck_core::config::FaascheckConfig;
use faascheck_core::metrics as m;
use faascheck_core::types::ResourceHandle;
use faascheck_engine::StatePoller;
use serde::Serialize;
use tracing::{debug, info};

use crate::cluster::ClusterClient;
use crate::error::ChaosError;
use crate::fault::{FaultSpec, Observation};

/// 감지 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// 시그니처가 감지되었는지
    pub detected: bool,
    /// 감지된 시그니처 (감지되지 않았으면 `None`)
    pub signature: Option<String>,
    /// 마지막 관측값
    pub observation: Observation,
    /// 관측 시도 횟수
    pub attempts: u32,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

/// 장애 주입기
pub struct FaultInjector<C> {
    client: Arc<C>,
    poller: StatePoller,
}

impl<C: ClusterClient> FaultInjector<C> {
    /// 감지 창과 폴링 간격으로 주입기를 생성합니다.
    pub fn new(client: Arc<C>, detection_window: Duration, interval: Duration) -> Self {
        Self {
            client,
            poller: StatePoller::new(detection_window, interval),
        }
    }

    /// `[chaos].detection_window_secs`와 `[poller].interval_ms`로 생성합니다.
    pub fn from_config(client: Arc<C>, config: &FaascheckConfig) -> Self {
        Self::new(
            client,
            config.chaos.detection_window(),
            config.poller.interval(),
        )
    }

    /// 백엔드 클라이언트
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// 장애 작업을 제출합니다. 표현할 수 없는 유형은 제출하지 않습니다.
    pub async fn submit(&self, spec: &FaultSpec) -> Result<ResourceHandle, ChaosError> {
        if !self.client.supports(spec.kind) {
            return Err(ChaosError::Unsupported {
                backend: self.client.backend().to_owned(),
                fault: spec.kind.to_string(),
            });
        }
        let handle = self.client.submit(spec).await?;
        metrics::counter!(m::FAULTS_INJECTED_TOTAL, m::LABEL_FAULT => spec.kind.as_str())
            .increment(1);
        info!(
            fault = %spec.kind,
            resource = %handle,
            backend = self.client.backend(),
            "fault injected"
        );
        Ok(handle)
    }

    /// 감지 창 동안 실패 시그니처를 기다립니다.
    ///
    /// 관측 중 에러는 일시적인 것으로 보고 계속 폴링합니다.
    pub async fn detect(&self, spec: &FaultSpec) -> Detection {
        let kind = spec.kind;
        let client = &self.client;
        let outcome = self
            .poller
            .await_state(
                move || client.observe(spec),
                move |observation: &Observation| observation.signature_for(kind).is_some(),
            )
            .await;

        let observation = outcome.state.unwrap_or_default();
        let signature = observation.signature_for(kind).map(str::to_owned);
        let detected = signature.is_some();
        let result = if detected { "detected" } else { "undetected" };
        metrics::counter!(
            m::FAULTS_DETECTED_TOTAL,
            m::LABEL_FAULT => kind.as_str(),
            m::LABEL_RESULT => result
        )
        .increment(1);
        debug!(
            fault = %kind,
            result,
            attempts = outcome.attempts,
            reasons = %observation.summary(),
            "fault detection finished"
        );

        Detection {
            detected,
            signature,
            observation,
            attempts: outcome.attempts,
            elapsed: outcome.elapsed,
        }
    }

    /// 제출과 감지를 한 번에 수행합니다.
    pub async fn inject_and_detect(
        &self,
        spec: &FaultSpec,
    ) -> Result<(ResourceHandle, Detection), ChaosError> {
        let handle = self.submit(spec).await?;
        let detection = self.detect(spec).await;
        Ok((handle, detection))
    }
}
