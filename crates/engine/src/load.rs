//! 부하 생성기: 제한된 워커 풀로 고정 개수의 요청 전송
//!
//! 전체 요청 수를 공유 카운터로 나누어 최대 `concurrency`개의 워커가
//! 순차적으로 요청을 보냅니다. 샘플 순서는 보장하지 않으며
//! 집계 개수와 통계만 의미가 있습니다.
//!
//! 실패한 요청 하나가 실행을 중단시키지 않습니다. 샘플이 하나도 없을 때만
//! 통계를 만들지 못합니다.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use faascheck_core::config::LoadConfig;
use faascheck_core::metrics as m;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::probe::{Probe, RequestSpec};
use crate::stats::{LatencySummary, summarize};

/// 부하 실행 계획
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPlan {
    /// 전체 요청 수
    pub total_requests: usize,
    /// 동시 워커 수
    pub concurrency: usize,
    /// 성공으로 간주하는 상태 코드
    pub expected_status: u16,
}

impl From<&LoadConfig> for LoadPlan {
    fn from(config: &LoadConfig) -> Self {
        Self {
            total_requests: config.total_requests,
            concurrency: config.concurrency,
            expected_status: config.expected_status,
        }
    }
}

/// 요청 하나의 샘플
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadSample {
    /// 지연 시간 (ms)
    pub latency_ms: u64,
    /// 상태 코드. 응답이 없었으면 `None`
    pub status: Option<u16>,
}

/// 부하 실행 결과
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// 수집한 샘플 수
    pub samples: usize,
    /// 기대 상태 코드를 받은 요청 수
    pub successes: usize,
    /// 그 외 요청 수 (타임아웃 포함)
    pub failures: usize,
    /// 전체 샘플의 지연 시간 요약
    pub summary: LatencySummary,
    /// 처리량 (요청/초)
    pub throughput_rps: f64,
    /// 전체 실행 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl LoadReport {
    /// 성공률 (%)
    pub fn success_rate(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.successes as f64 / self.samples as f64 * 100.0
    }
}

/// 제한된 동시성의 부하 생성기
pub struct LoadGenerator<P> {
    probe: Arc<P>,
    plan: LoadPlan,
    cancel: CancellationToken,
}

impl<P: Probe> LoadGenerator<P> {
    /// 새 부하 생성기를 만듭니다.
    pub fn new(probe: Arc<P>, plan: LoadPlan) -> Self {
        Self {
            probe,
            plan,
            cancel: CancellationToken::new(),
        }
    }

    /// 취소 토큰을 연결합니다. 취소되면 워커는 새 요청을 시작하지 않습니다.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 실행 계획
    pub fn plan(&self) -> LoadPlan {
        self.plan
    }

    /// 요청 명세를 대상으로 부하를 실행합니다.
    pub async fn run(&self, spec: &RequestSpec) -> Result<LoadReport, EngineError> {
        let total = self.plan.total_requests;
        let workers = self.plan.concurrency.min(total).max(1);
        let expected = self.plan.expected_status;

        info!(
            target = %spec.target(),
            total_requests = total,
            workers,
            "load run starting"
        );

        let next = Arc::new(AtomicUsize::new(0));
        let samples = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let spec = Arc::new(spec.clone());
        let started = Instant::now();

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let probe = Arc::clone(&self.probe);
            let next = Arc::clone(&next);
            let samples = Arc::clone(&samples);
            let spec = Arc::clone(&spec);
            let cancel = self.cancel.clone();

            set.spawn(async move {
                let mut issued = 0usize;
                while !cancel.is_cancelled() && next.fetch_add(1, Ordering::Relaxed) < total {
                    let request_started = Instant::now();
                    let sample = match probe.execute(&spec).await {
                        Ok(result) => LoadSample {
                            latency_ms: result.latency_ms,
                            status: Some(result.status_code),
                        },
                        Err(e) => {
                            debug!(worker, error = %e, "load request failed");
                            LoadSample {
                                latency_ms: request_started.elapsed().as_millis() as u64,
                                status: None,
                            }
                        }
                    };
                    let label = if sample.status == Some(expected) {
                        "success"
                    } else {
                        "failure"
                    };
                    metrics::counter!(m::LOAD_SAMPLES_TOTAL, m::LABEL_RESULT => label)
                        .increment(1);
                    samples
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(sample);
                    issued += 1;
                }
                debug!(worker, issued, "load worker finished");
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "load worker terminated abnormally");
            }
        }

        let elapsed = started.elapsed();
        let samples: Vec<LoadSample> =
            std::mem::take(&mut *samples.lock().unwrap_or_else(PoisonError::into_inner));

        if self.cancel.is_cancelled() && samples.len() < total {
            warn!(
                collected = samples.len(),
                total_requests = total,
                "load run cancelled before completion"
            );
        }

        let latencies: Vec<u64> = samples.iter().map(|s| s.latency_ms).collect();
        let summary = summarize(&latencies).map_err(|_| EngineError::InsufficientData {
            context: format!("load run against {} collected no samples", spec.target()),
        })?;

        let successes = samples
            .iter()
            .filter(|s| s.status == Some(expected))
            .count();
        let secs = elapsed.as_secs_f64();
        let throughput_rps = if secs > 0.0 {
            samples.len() as f64 / secs
        } else {
            samples.len() as f64
        };

        let report = LoadReport {
            samples: samples.len(),
            successes,
            failures: samples.len() - successes,
            summary,
            throughput_rps,
            elapsed,
        };

        info!(
            samples = report.samples,
            successes = report.successes,
            p50_ms = report.summary.p50,
            p95_ms = report.summary.p95,
            p99_ms = report.summary.p99,
            throughput_rps = report.throughput_rps,
            "load run finished"
        );
        Ok(report)
    }
}
