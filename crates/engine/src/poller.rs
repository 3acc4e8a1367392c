//! 상태 폴러: 비동기 상태 전이를 제한 시간 안에서 기다림
//!
//! [`StatePoller::await_state`]는 상태 확인 함수를 일정 간격으로 호출하다가
//! 종료 상태에 도달하거나 타임아웃이 지나면 마지막으로 관측한 상태를 반환합니다.
//!
//! 빌드 완료 대기(`deployed`/`failed`), 연쇄 삭제 확인(404),
//! 오케스트레이션 장애 시그니처 감지에 동일한 계약이 재사용됩니다.
//!
//! # 시간 보장
//!
//! 상태 확인 하나가 멈춰도 폴러는 `timeout + interval` 안에 반환합니다.
//! 마지막 확인은 타임아웃 이전에 시작되고, 모든 확인은
//! `시작 + timeout + interval` 시점에서 강제로 끊깁니다.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use faascheck_core::config::PollerConfig;
use faascheck_core::metrics as m;
use tokio::time::Instant;
use tracing::debug;

/// 폴링 결과
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<S> {
    /// 마지막으로 관측한 상태 (한 번도 관측하지 못했으면 `None`)
    pub state: Option<S>,
    /// 종료 상태에 도달하지 못하고 시간이 다 되었는지
    pub timed_out: bool,
    /// 상태 확인 시도 횟수
    pub attempts: u32,
    /// 경과 시간
    pub elapsed: Duration,
}

/// 호출자가 구분하는 세 가지 폴링 결말
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    /// 기대한 종료 상태에 도달
    Reached,
    /// 다른 종료 상태에 도달 (예: 빌드 실패)
    OtherTerminal,
    /// 어떤 종료 상태에도 도달하지 못함
    TimedOut,
}

impl<S> PollOutcome<S> {
    /// 기대 상태 판정 함수로 결말을 분류합니다.
    pub fn verdict(&self, expected: impl Fn(&S) -> bool) -> PollVerdict {
        match (&self.state, self.timed_out) {
            (_, true) | (None, false) => PollVerdict::TimedOut,
            (Some(state), false) if expected(state) => PollVerdict::Reached,
            (Some(_), false) => PollVerdict::OtherTerminal,
        }
    }
}

/// 고정 간격 상태 폴러
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatePoller {
    timeout: Duration,
    interval: Duration,
}

impl StatePoller {
    /// 타임아웃과 간격으로 폴러를 생성합니다.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// 빌드 완료 대기용 폴러를 설정에서 생성합니다.
    pub fn for_build(config: &PollerConfig) -> Self {
        Self::new(config.build_timeout(), config.interval())
    }

    /// 연쇄 삭제 확인용 폴러. 유예 시간 안에서 최대 500ms 간격으로 조회합니다.
    pub fn for_cascade(config: &PollerConfig) -> Self {
        Self::new(
            config.cascade_grace(),
            config.interval().min(Duration::from_millis(500)),
        )
    }

    /// 타임아웃
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 폴링 간격
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 종료 상태에 도달하거나 시간이 다 될 때까지 `check`를 반복 호출합니다.
    ///
    /// `check`가 에러를 반환하면 일시적인 장애로 보고 폴링을 계속합니다.
    pub async fn await_state<S, E, F, Fut, T>(&self, mut check: F, is_terminal: T) -> PollOutcome<S>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        E: Display,
        T: Fn(&S) -> bool,
    {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let hard_deadline = deadline + self.interval;
        let mut state = None;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            metrics::counter!(m::POLLER_ATTEMPTS_TOTAL).increment(1);

            match tokio::time::timeout_at(hard_deadline, check()).await {
                Ok(Ok(observed)) => {
                    let terminal = is_terminal(&observed);
                    state = Some(observed);
                    if terminal {
                        return PollOutcome {
                            state,
                            timed_out: false,
                            attempts,
                            elapsed: start.elapsed(),
                        };
                    }
                }
                Ok(Err(e)) => {
                    debug!(attempt = attempts, error = %e, "state check failed, continuing");
                }
                Err(_) => {
                    debug!(attempt = attempts, "state check overran the poll deadline");
                    break;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }

        metrics::counter!(m::POLLER_TIMEOUTS_TOTAL).increment(1);
        debug!(
            attempts,
            timeout_ms = self.timeout.as_millis() as u64,
            "poll timed out"
        );
        PollOutcome {
            state,
            timed_out: true,
            attempts,
            elapsed: start.elapsed(),
        }
    }
}
