//! Session Client
//!
//! 단일 연결 위의 서버 세션과 배치 트랜잭션

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use super::client::{ClientBuilder, ClientCore, ClientShell};
use super::context::Context;
use super::error::{DriverError, DriverResult};
use super::future::{response_error, ResultSetFuture};
use super::pool::PoolMetrics;
use super::settings::Settings;
use super::transaction::{TransactionState, COMMIT_SCRIPT, OPEN_SCRIPT, ROLLBACK_SCRIPT};
use crate::graphson::{make_close_session_request, RequestOptions};

// ============================================================================
// SessionClient - 세션 클라이언트
// ============================================================================

/// 세션 클라이언트
///
/// 연결 1개(동시 요청 2개)를 쓰므로 한 세션의 문장은 순서대로 서버에 도착합니다.
/// 같은 세션에서 `batch_submit`을 동시에 호출하면 안 됩니다.
///
/// # Example
///
/// ```rust,no_run
/// use gdb_driver::driver::{ClientShell, Context, SessionClient, Settings};
///
/// # async fn example() -> gdb_driver::driver::DriverResult<()> {
/// let session = SessionClient::new("session-1", Settings::builder().host("localhost").port(8182).build())?;
/// let ctx = Context::background();
/// session
///     .batch_submit(&ctx, |ctx, shell| async move {
///         shell.submit_script(&ctx, "g.addV('person').property('name', 'marko')").await?;
///         shell.submit_script(&ctx, "g.addV('person').property('name', 'vadas')").await?;
///         Ok(())
///     })
///     .await?;
/// session.close(&ctx).await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionClient {
    core: Arc<ClientCore>,
    state: Mutex<TransactionState>,
}

impl SessionClient {
    /// 세션 클라이언트 생성 (연결은 첫 요청 때 생성)
    pub fn new(session_id: impl Into<String>, settings: Settings) -> DriverResult<Self> {
        ClientBuilder::new(settings).build_session(session_id)
    }

    /// 세션 클라이언트 생성 후 연결 확인
    pub async fn connect(session_id: impl Into<String>, settings: Settings) -> DriverResult<Self> {
        ClientBuilder::new(settings).connect_session(session_id).await
    }

    pub(crate) fn from_core(core: Arc<ClientCore>) -> Self {
        Self {
            core,
            state: Mutex::new(TransactionState::Idle),
        }
    }

    pub(crate) fn core(&self) -> &ClientCore {
        &self.core
    }

    /// 세션 ID
    pub fn session_id(&self) -> &str {
        self.core.session_id().unwrap_or_default()
    }

    /// 적용된 설정
    pub fn settings(&self) -> &Settings {
        self.core.settings()
    }

    /// 현재 트랜잭션 상태
    pub fn transaction_state(&self) -> TransactionState {
        *self.state.lock()
    }

    /// 풀 메트릭
    pub fn metrics(&self) -> PoolMetrics {
        self.core.pool.metrics()
    }

    /// 트랜잭션 배치 실행
    ///
    /// OPEN을 보낸 뒤 `batch`를 실행하고, 성공하면 COMMIT합니다. `batch`나 COMMIT이
    /// 실패하면 ROLLBACK을 보내고 원래 에러를 돌려줍니다. ROLLBACK마저 실패하면
    /// 상태는 `Unstable`이 되고 [`DriverError::TransactionUnstable`]을 돌려줍니다.
    pub async fn batch_submit<F, Fut>(&self, ctx: &Context, batch: F) -> DriverResult<()>
    where
        F: FnOnce(Context, SessionShell) -> Fut,
        Fut: Future<Output = DriverResult<()>>,
    {
        let current = self.transaction_state();
        if !current.can_begin() {
            return Err(DriverError::session(format!(
                "cannot begin a batch while the transaction is {}",
                current
            )));
        }

        self.control(ctx, OPEN_SCRIPT).await?;
        self.set_state(TransactionState::Open);

        let shell = SessionShell {
            core: self.core.clone(),
        };
        let outcome = match batch(ctx.clone(), shell).await {
            Ok(()) => self.control(ctx, COMMIT_SCRIPT).await,
            Err(err) => Err(err),
        };

        let cause = match outcome {
            Ok(()) => {
                self.set_state(TransactionState::Committed);
                return Ok(());
            }
            Err(cause) => cause,
        };

        match self.control(ctx, ROLLBACK_SCRIPT).await {
            Ok(()) => {
                self.set_state(TransactionState::RolledBack);
                Err(cause)
            }
            Err(rollback) => {
                self.core.log(|| {
                    tracing::error!(
                        session_id = %self.session_id(),
                        error = %rollback,
                        cause = %cause,
                        "unstable transaction as rollback failed"
                    )
                });
                self.set_state(TransactionState::Unstable);
                Err(DriverError::TransactionUnstable {
                    rollback: Box::new(rollback),
                    cause: Box::new(cause),
                })
            }
        }
    }

    /// 세션 종료 요청 후 연결 풀 닫기
    ///
    /// 종료 요청의 실패나 타임아웃은 로그만 남깁니다.
    pub async fn close(&self, ctx: &Context) -> DriverResult<()> {
        if self.core.pool.is_closed() {
            return Ok(());
        }

        let session_id = self.session_id();
        let timeout = self.core.settings().session_close_timeout;
        let request = make_close_session_request(session_id);
        let failure = match self.core.dispatch(ctx, request).await {
            Ok(future) => match future.response_future().get_or_timeout(timeout).await {
                None => Some(format!("timed out after {:?}", timeout)),
                Some(response) => response_error(&response).map(|err| err.to_string()),
            },
            Err(err) => Some(err.to_string()),
        };
        if let Some(reason) = failure {
            self.core
                .log(|| tracing::warn!(session_id, reason = %reason, "session close failed"));
        }

        self.core.pool.close();
        Ok(())
    }

    async fn control(&self, ctx: &Context, script: &str) -> DriverResult<()> {
        self.core
            .submit(ctx, script, None)
            .await?
            .get_results_in(ctx)
            .await
            .map(|_| ())
    }

    fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }
}

impl ClientShell for SessionClient {
    async fn submit_script_options_async(
        &self,
        ctx: &Context,
        script: &str,
        options: &RequestOptions,
    ) -> DriverResult<ResultSetFuture> {
        self.core.submit(ctx, script, Some(options)).await
    }
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("session_id", &self.session_id())
            .field("state", &self.transaction_state())
            .finish()
    }
}

// ============================================================================
// SessionShell - 배치 안의 제출 핸들
// ============================================================================

/// `batch_submit` 안에서 문장을 보내는 핸들
#[derive(Clone)]
pub struct SessionShell {
    core: Arc<ClientCore>,
}

impl ClientShell for SessionShell {
    async fn submit_script_options_async(
        &self,
        ctx: &Context,
        script: &str,
        options: &RequestOptions,
    ) -> DriverResult<ResultSetFuture> {
        self.core.submit(ctx, script, Some(options)).await
    }
}

impl fmt::Debug for SessionShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionShell")
            .field("session_id", &self.core.session_id())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
