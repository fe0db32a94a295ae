//! Request Context
//!
//! 호출 단위 데드라인과 취소

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::error::{DriverError, DriverResult};

/// 호출 컨텍스트 (데드라인 + 취소)
///
/// 취소는 로컬 대기만 멈춥니다. 이미 전송된 요청은 서버에서 계속 실행됩니다.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl Context {
    /// 데드라인/취소 없는 컨텍스트
    pub fn background() -> Self {
        Self::default()
    }

    /// 지금부터 `timeout` 후 만료
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline(Instant::now() + timeout)
    }

    /// 지정 시각에 만료
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline(deadline)
    }

    /// 취소 토큰 연결
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self::background().cancellation(token)
    }

    /// 데드라인 설정 (기존보다 이를 때만)
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// 취소 토큰 설정
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 데드라인
    pub fn get_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 남은 시간
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// 취소 여부
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancellationToken::is_cancelled)
    }

    /// 만료 또는 취소 여부 확인
    pub fn check(&self) -> DriverResult<()> {
        if self.is_cancelled() {
            return Err(DriverError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(DriverError::timeout("context deadline exceeded"));
            }
        }
        Ok(())
    }

    /// 취소될 때까지 대기 (토큰이 없으면 영원히)
    pub async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// 데드라인까지 대기 (데드라인이 없으면 영원히)
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
            None => std::future::pending().await,
        }
    }
}
