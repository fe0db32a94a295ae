//! Client
//!
//! 세션 없는 클라이언트, 공통 요청 경로, 빌더

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::Dispatch;

use super::breaker::{Breaker, CircuitBreaker};
use super::context::Context;
use super::error::{DriverError, DriverResult};
use super::future::{response_error, ResultSetFuture};
use super::pool::{ConnectionPool, PoolMetrics};
use super::result::GraphResult;
use super::session::{SessionClient, SessionShell};
use super::settings::Settings;
use super::telemetry::{classify_operation, NoopTelemetry, SpanInfo, Telemetry};
use super::transport::{Dialer, WebSocketDialer};
use crate::graph::Value;
use crate::graphson::{make_request, Request, RequestOptions, SessionContext};

// ============================================================================
// ClientShell - 공통 제출 API
// ============================================================================

/// 스크립트 제출 API
///
/// [`Client`], [`SessionClient`], 배치 안의 [`SessionShell`]이 구현합니다.
/// 동기 형태는 결과 목록을 기다리고, `_async` 형태는 [`ResultSetFuture`]를 돌려줍니다.
pub trait ClientShell: Send + Sync {
    /// 옵션과 함께 제출 (비동기 결과)
    fn submit_script_options_async(
        &self,
        ctx: &Context,
        script: &str,
        options: &RequestOptions,
    ) -> impl Future<Output = DriverResult<ResultSetFuture>> + Send;

    /// 스크립트 제출 (비동기 결과)
    fn submit_script_async(
        &self,
        ctx: &Context,
        script: &str,
    ) -> impl Future<Output = DriverResult<ResultSetFuture>> + Send {
        async move {
            self.submit_script_options_async(ctx, script, &RequestOptions::new())
                .await
        }
    }

    /// 바인딩과 함께 제출 (비동기 결과)
    fn submit_script_bound_async(
        &self,
        ctx: &Context,
        script: &str,
        bindings: HashMap<String, Value>,
    ) -> impl Future<Output = DriverResult<ResultSetFuture>> + Send {
        async move {
            let options = RequestOptions::with_bindings(bindings);
            self.submit_script_options_async(ctx, script, &options).await
        }
    }

    /// 스크립트 실행
    fn submit_script(
        &self,
        ctx: &Context,
        script: &str,
    ) -> impl Future<Output = DriverResult<Vec<GraphResult>>> + Send {
        async move {
            self.submit_script_async(ctx, script)
                .await?
                .get_results_in(ctx)
                .await
        }
    }

    /// 바인딩과 함께 실행
    fn submit_script_bound(
        &self,
        ctx: &Context,
        script: &str,
        bindings: HashMap<String, Value>,
    ) -> impl Future<Output = DriverResult<Vec<GraphResult>>> + Send {
        async move {
            self.submit_script_bound_async(ctx, script, bindings)
                .await?
                .get_results_in(ctx)
                .await
        }
    }

    /// 옵션과 함께 실행
    fn submit_script_options(
        &self,
        ctx: &Context,
        script: &str,
        options: &RequestOptions,
    ) -> impl Future<Output = DriverResult<Vec<GraphResult>>> + Send {
        async move {
            self.submit_script_options_async(ctx, script, options)
                .await?
                .get_results_in(ctx)
                .await
        }
    }
}

// ============================================================================
// ClientCore - 공통 요청 경로
// ============================================================================

pub(crate) struct ClientCore {
    settings: Settings,
    pub(crate) pool: ConnectionPool,
    breaker: Arc<dyn Breaker>,
    telemetry: Arc<dyn Telemetry>,
    session: Option<SessionContext>,
    dispatch: Dispatch,
}

impl ClientCore {
    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    /// 주입된 디스패처로 로그 기록
    pub(crate) fn log<F: FnOnce()>(&self, f: F) {
        tracing::dispatcher::with_default(&self.dispatch, f);
    }

    pub(crate) fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.session_id.as_str())
    }

    /// eval 요청 생성 후 전송
    pub(crate) async fn submit(
        &self,
        ctx: &Context,
        script: &str,
        options: Option<&RequestOptions>,
    ) -> DriverResult<ResultSetFuture> {
        ctx.check()?;
        let request = make_request(script, options, self.session.as_ref(), ctx.get_deadline())?;
        self.dispatch(ctx, request).await
    }

    /// 브레이커 확인 → 풀 획득 → 전송
    ///
    /// 브레이커에는 전송 계층 결과만 실패로 기록됩니다.
    pub(crate) async fn dispatch(
        &self,
        ctx: &Context,
        request: Request,
    ) -> DriverResult<ResultSetFuture> {
        if let Err(err) = self.breaker.allow() {
            self.telemetry.incr("gdb:submit", "breaker");
            return Err(err);
        }

        let script = request.gremlin().unwrap_or_default().to_string();
        self.log(|| {
            tracing::debug!(
                request_id = %request.request_id,
                op = %request.op,
                script = %script,
                "dispatching request"
            )
        });

        let started = Instant::now();
        let span = self.telemetry.start_span(SpanInfo {
            name: format!("gdb:{}", classify_operation(&script)),
            instance: self.settings.address.to_string(),
            user: self.settings.username.clone().unwrap_or_default(),
            statement: script.clone(),
        });

        let submitted = match self.pool.get(ctx).await {
            Ok(handle) => handle.submit(&request).await,
            Err(err) => Err(err),
        };
        let future = match submitted {
            Ok(future) => future,
            Err(err) => {
                self.record(&err);
                span.finish(Some(err.to_string()));
                return Err(err);
            }
        };

        let breaker = self.breaker.clone();
        let telemetry = self.telemetry.clone();
        let dispatch = self.dispatch.clone();
        future.on_complete(move |response| {
            let error = response_error(response);
            tracing::dispatcher::with_default(&dispatch, || match &error {
                Some(err) if err.trips_breaker() => breaker.mark_failed(),
                _ => breaker.mark_success(),
            });
            span.finish(error.map(|err| err.to_string()));
            telemetry.timing(&format!("gremlin:{}", script), started.elapsed());
        });

        Ok(ResultSetFuture::new(future))
    }

    fn record(&self, err: &DriverError) {
        self.log(|| {
            if err.trips_breaker() {
                self.breaker.mark_failed();
            } else {
                self.breaker.mark_success();
            }
        });
    }
}

impl fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCore")
            .field("url", &self.settings.url())
            .field("session", &self.session)
            .field("pool", &self.pool)
            .finish()
    }
}

// ============================================================================
// Client - 세션 없는 클라이언트
// ============================================================================

/// 세션 없는 클라이언트
///
/// 모든 요청은 서버가 자동 커밋하는 독립 단위입니다.
///
/// # Example
///
/// ```rust,no_run
/// use gdb_driver::driver::{Client, ClientShell, Context, Settings};
///
/// # async fn example() -> gdb_driver::driver::DriverResult<()> {
/// let client = Client::connect(Settings::builder().host("localhost").port(8182).build()).await?;
/// let ctx = Context::background();
/// for result in client.submit_script(&ctx, "g.V().limit(10)").await? {
///     println!("{}", result);
/// }
/// client.close(&ctx).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    core: Arc<ClientCore>,
}

impl Client {
    /// 클라이언트 생성 (연결은 첫 요청 때 생성)
    pub fn new(settings: Settings) -> DriverResult<Self> {
        ClientBuilder::new(settings).build()
    }

    /// 클라이언트 생성 후 연결 하나를 미리 열어 둠
    pub async fn connect(settings: Settings) -> DriverResult<Self> {
        ClientBuilder::new(settings).connect().await
    }

    /// 빌더 시작
    pub fn builder(settings: Settings) -> ClientBuilder {
        ClientBuilder::new(settings)
    }

    /// 적용된 설정
    pub fn settings(&self) -> &Settings {
        self.core.settings()
    }

    /// 풀 메트릭
    pub fn metrics(&self) -> PoolMetrics {
        self.core.pool.metrics()
    }

    /// 세션 없는 클라이언트는 배치를 지원하지 않음
    pub async fn batch_submit<F, Fut>(&self, _ctx: &Context, _batch: F) -> DriverResult<()>
    where
        F: FnOnce(Context, SessionShell) -> Fut,
        Fut: Future<Output = DriverResult<()>>,
    {
        Err(DriverError::session(
            "batch submit requires a session client",
        ))
    }

    /// 연결 풀 닫기
    pub async fn close(&self, _ctx: &Context) -> DriverResult<()> {
        self.core.pool.close();
        Ok(())
    }
}

impl ClientShell for Client {
    async fn submit_script_options_async(
        &self,
        ctx: &Context,
        script: &str,
        options: &RequestOptions,
    ) -> DriverResult<ResultSetFuture> {
        self.core.submit(ctx, script, Some(options)).await
    }
}

// ============================================================================
// ClientBuilder - 클라이언트 빌더
// ============================================================================

/// 클라이언트 빌더
///
/// 브레이커, 텔레메트리, 다이얼러, 로그 디스패처를 주입합니다.
pub struct ClientBuilder {
    settings: Settings,
    breaker: Option<Arc<dyn Breaker>>,
    telemetry: Arc<dyn Telemetry>,
    dialer: Arc<dyn Dialer>,
    dispatch: Option<Dispatch>,
}

impl ClientBuilder {
    /// 새 빌더
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            breaker: None,
            telemetry: Arc::new(NoopTelemetry),
            dialer: Arc::new(WebSocketDialer),
            dispatch: None,
        }
    }

    /// 브레이커 설정 (기본값: 설정의 `CircuitBreaker`)
    pub fn with_breaker(mut self, breaker: Arc<dyn Breaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// 텔레메트리 설정 (기본값: no-op)
    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// 다이얼러 설정 (기본값: WebSocket)
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// 로그 디스패처 설정 (기본값: 생성 시점의 기본 디스패처)
    pub fn with_log_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// 세션 없는 클라이언트 생성
    pub fn build(self) -> DriverResult<Client> {
        Ok(Client {
            core: Arc::new(self.build_core(None)?),
        })
    }

    /// 세션 없는 클라이언트 생성 후 연결 확인
    pub async fn connect(self) -> DriverResult<Client> {
        let client = self.build()?;
        client.core.pool.warmup(&Context::background()).await?;
        Ok(client)
    }

    /// 세션 클라이언트 생성
    pub fn build_session(self, session_id: impl Into<String>) -> DriverResult<SessionClient> {
        let session_id = session_id.into();
        if session_id.is_empty() {
            return Err(DriverError::configuration("session id must not be empty"));
        }
        let session = SessionContext::new(session_id, self.settings.manage_transaction);
        Ok(SessionClient::from_core(Arc::new(self.build_core(Some(session))?)))
    }

    /// 세션 클라이언트 생성 후 연결 확인
    pub async fn connect_session(self, session_id: impl Into<String>) -> DriverResult<SessionClient> {
        let client = self.build_session(session_id)?;
        client.core().pool.warmup(&Context::background()).await?;
        Ok(client)
    }

    fn build_core(self, session: Option<SessionContext>) -> DriverResult<ClientCore> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(DriverError::configuration(
                "client must be created inside a tokio runtime",
            ));
        }
        self.settings.validate()?;
        let settings = self.settings.resolved();

        let pool_config = match session {
            Some(_) => settings.session_pool_config(),
            None => settings.pool_config(),
        };
        let dispatch = self
            .dispatch
            .unwrap_or_else(|| tracing::dispatcher::get_default(Dispatch::clone));
        let breaker = self
            .breaker
            .unwrap_or_else(|| Arc::new(CircuitBreaker::new(settings.breaker.clone())));

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::debug!(url = %settings.url(), session = ?session, "client created")
        });
        Ok(ClientCore {
            pool: ConnectionPool::new(pool_config, self.dialer, dispatch.clone()),
            dispatch,
            settings,
            breaker,
            telemetry: self.telemetry,
            session,
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
