//! 통계 엔진: 지연 시간 샘플 요약
//!
//! 백분위수는 정렬된 샘플에서 인덱스 `floor(n * k / 100)`의 값을 사용합니다
//! (하위 순위, 보간 없음). 결과가 재현 가능해야 하므로 이 규칙을 바꾸지 않습니다.

use serde::{Deserialize, Serialize};

use faascheck_core::types::LatencySample;

use crate::error::EngineError;

/// 지연 시간 요약
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// 샘플 수
    pub count: usize,
    /// 최솟값 (ms)
    pub min: u64,
    /// 최댓값 (ms)
    pub max: u64,
    /// 평균 (ms)
    pub mean: f64,
    /// 50번째 백분위수 (ms)
    pub p50: u64,
    /// 95번째 백분위수 (ms)
    pub p95: u64,
    /// 99번째 백분위수 (ms)
    pub p99: u64,
}

/// 정렬된 샘플에서 `k`번째 백분위수를 구합니다.
///
/// `sorted`는 오름차순이어야 하며 비어 있으면 안 됩니다.
fn percentile(sorted: &[u64], k: usize) -> u64 {
    let idx = (sorted.len() * k / 100).min(sorted.len() - 1);
    sorted[idx]
}

/// 샘플 집합을 요약합니다.
///
/// 샘플이 없으면 0으로 나누는 대신 `InsufficientData`를 반환합니다.
pub fn summarize(samples: &[u64]) -> Result<LatencySummary, EngineError> {
    if samples.is_empty() {
        return Err(EngineError::InsufficientData {
            context: "no latency samples to summarize".to_owned(),
        });
    }

    let mut sorted = samples.to_vec();
    sorted.sort_unstable();

    let n = sorted.len();
    let sum: u128 = sorted.iter().map(|&v| u128::from(v)).sum();

    Ok(LatencySummary {
        count: n,
        min: sorted[0],
        max: sorted[n - 1],
        mean: sum as f64 / n as f64,
        p50: percentile(&sorted, 50),
        p95: percentile(&sorted, 95),
        p99: percentile(&sorted, 99),
    })
}

/// [`LatencySample`] 목록을 요약합니다. 샘플은 집계 후 버려집니다.
pub fn summarize_samples(samples: Vec<LatencySample>) -> Result<LatencySummary, EngineError> {
    let values: Vec<u64> = samples.into_iter().map(|s| s.value_ms).collect();
    summarize(&values)
}
