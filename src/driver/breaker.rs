//! Admission Control
//!
//! 전송 실패가 누적되면 요청을 즉시 거절하는 브레이커

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::error::{DriverError, DriverResult};

/// 요청 승인 브레이커
pub trait Breaker: Send + Sync {
    /// 요청 승인 여부 (거절 시 `AdmissionDenied`)
    fn allow(&self) -> DriverResult<()>;

    /// 전송 성공 기록
    fn mark_success(&self);

    /// 전송 실패 기록
    fn mark_failed(&self);
}

/// 항상 승인하는 브레이커
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBreaker;

impl Breaker for NoopBreaker {
    fn allow(&self) -> DriverResult<()> {
        Ok(())
    }

    fn mark_success(&self) {}

    fn mark_failed(&self) {}
}

// ============================================================================
// CircuitBreaker - 기본 브레이커
// ============================================================================

/// 브레이커 설정
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// 차단까지의 연속 실패 수
    pub failure_threshold: u32,
    /// 차단 유지 시간
    pub cool_down: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(5),
        }
    }
}

/// 브레이커 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// 정상 (모두 승인)
    Closed,
    /// 차단 (모두 거절)
    Open,
    /// 시험 요청 1건만 승인
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    trial_started: Option<Instant>,
}

/// closed → open → half-open 브레이커
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// 새 브레이커 생성
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                opened_at: None,
                trial_in_flight: false,
                trial_started: None,
            }),
        }
    }

    /// 현재 상태
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        inner.state
    }

    fn refresh(&self, inner: &mut Inner) {
        let cool_down = self.config.cool_down;

        // 응답 없이 cool-down을 넘긴 시험 요청은 실패로 간주
        if inner.state == BreakerState::HalfOpen && inner.trial_in_flight {
            if let Some(started) = inner.trial_started {
                if started.elapsed() >= cool_down {
                    inner.failures = inner.failures.saturating_add(1);
                    self.open_at(inner, started + cool_down);
                }
            }
        }

        if inner.state == BreakerState::Open {
            let cooled = inner
                .opened_at
                .map_or(true, |at| at.elapsed() >= cool_down);
            if cooled {
                inner.state = BreakerState::HalfOpen;
                inner.trial_in_flight = false;
                inner.trial_started = None;
            }
        }
    }

    fn open(&self, inner: &mut Inner) {
        self.open_at(inner, Instant::now());
    }

    fn open_at(&self, inner: &mut Inner, at: Instant) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(at);
        inner.trial_in_flight = false;
        inner.trial_started = None;
        tracing::warn!(failures = inner.failures, "circuit breaker opened");
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl Breaker for CircuitBreaker {
    fn allow(&self) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                inner.trial_started = Some(Instant::now());
                Ok(())
            }
            BreakerState::HalfOpen => Err(DriverError::admission_denied("breaker half-open, trial in flight")),
            BreakerState::Open => Err(DriverError::admission_denied("breaker open")),
        }
    }

    fn mark_success(&self) {
        let mut inner = self.inner.lock();
        inner.failures = 0;
        inner.trial_in_flight = false;
        inner.trial_started = None;
        inner.opened_at = None;
        inner.state = BreakerState::Closed;
    }

    fn mark_failed(&self) {
        let mut inner = self.inner.lock();
        inner.failures = inner.failures.saturating_add(1);
        match inner.state {
            BreakerState::HalfOpen => self.open(&mut inner),
            BreakerState::Closed if inner.failures >= self.config.failure_threshold => {
                self.open(&mut inner)
            }
            _ => {}
        }
    }
}
