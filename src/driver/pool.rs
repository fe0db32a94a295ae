//! Connection Pool
//!
//! 다중화 연결 풀링, 헬스 체크, 퇴역과 재연결

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use super::connection::{Connection, ConnectionOptions, ConnectionState, PoolEvent, Slot};
use super::context::Context;
use super::error::{DriverError, DriverResult};
use super::future::ResponseFuture;
use super::transport::{DialConfig, Dialer};
use crate::graphson::Request;

// ============================================================================
// PoolConfig - 풀 설정
// ============================================================================

/// 연결 풀 설정
///
/// 보통 [`Settings::pool_config`](super::Settings::pool_config)로 만듭니다.
///
/// # 필드
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `max_size` | 8 | 최대 연결 수 |
/// | `max_in_flight` | 4 | 연결당 동시 요청 수 |
/// | `acquire_timeout` | 6초 | 획득 대기 시간 |
/// | `alive_check_interval` | 1분 | 헬스 체크 주기 (`None`이면 비활성) |
/// | `max_lifetime` | 없음 | 연결 최대 수명 |
/// | `max_backoff` | 5초 | 재연결 backoff 상한 |
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 접속 URL
    pub url: String,
    /// 인증 정보
    pub credentials: Option<(String, String)>,
    /// 최대 연결 수
    pub max_size: usize,
    /// 연결당 동시 요청 수
    pub max_in_flight: usize,
    /// 획득 대기 시간
    pub acquire_timeout: Duration,
    /// 쓰기 타임아웃
    pub write_timeout: Duration,
    /// 헬스 프로브 응답 대기 시간
    pub read_timeout: Duration,
    /// keep-alive ping 주기
    pub ping_interval: Duration,
    /// 헬스 체크 주기
    pub alive_check_interval: Option<Duration>,
    /// 연결 최대 수명
    pub max_lifetime: Option<Duration>,
    /// 읽기 버퍼 크기
    pub read_buffer_size: usize,
    /// 쓰기 버퍼 크기
    pub write_buffer_size: usize,
    /// 핸드셰이크 타임아웃
    pub handshake_timeout: Duration,
    /// 재연결 backoff 상한
    pub max_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        super::Settings::default().pool_config()
    }
}

impl PoolConfig {
    fn dial_config(&self) -> DialConfig {
        DialConfig {
            url: self.url.clone(),
            read_buffer_size: self.read_buffer_size,
            write_buffer_size: self.write_buffer_size,
            handshake_timeout: self.handshake_timeout,
        }
    }

    fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            max_in_flight: self.max_in_flight,
            write_timeout: self.write_timeout,
            ping_interval: self.ping_interval,
            credentials: self.credentials.clone(),
        }
    }
}

// ============================================================================
// Backoff - 재연결 지연
// ============================================================================

const BACKOFF_BASE: Duration = Duration::from_millis(100);

/// 지수 backoff (100ms부터 두 배씩, 상한 적용)
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    max: Duration,
    current: Option<Duration>,
    retry_at: Option<Instant>,
}

impl Backoff {
    pub(crate) fn new(max: Duration) -> Self {
        Self {
            max,
            current: None,
            retry_at: None,
        }
    }

    /// 실패 기록
    pub(crate) fn fail(&mut self) {
        let next = match self.current {
            Some(current) => current.saturating_mul(2),
            None => BACKOFF_BASE,
        };
        let next = next.min(self.max);
        self.current = Some(next);
        self.retry_at = Some(Instant::now() + next);
    }

    /// 성공 기록
    pub(crate) fn reset(&mut self) {
        self.current = None;
        self.retry_at = None;
    }

    /// 현재 지연
    pub(crate) fn delay(&self) -> Option<Duration> {
        self.current
    }

    /// 아직 다이얼하면 안 되는 경우 재시도 시각
    pub(crate) fn wait_until(&self, now: Instant) -> Option<Instant> {
        self.retry_at.filter(|at| *at > now)
    }
}

// ============================================================================
// PooledConnection - 풀에서 빌린 연결
// ============================================================================

/// 풀에서 빌린 연결 (요청 슬롯 1개)
///
/// 요청을 보내면 슬롯은 응답 future로 넘어가고, 응답이 완료될 때 해제됩니다.
/// 보내지 않고 drop하면 즉시 해제됩니다.
pub struct PooledConnection {
    conn: Arc<Connection>,
    slot: Option<Slot>,
}

impl PooledConnection {
    fn new(conn: Arc<Connection>, slot: Slot) -> Self {
        Self {
            conn,
            slot: Some(slot),
        }
    }

    /// 연결 ID
    pub fn id(&self) -> u64 {
        self.conn.id()
    }

    /// 연결 참조
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// 요청 전송
    pub async fn submit(mut self, request: &Request) -> DriverResult<ResponseFuture> {
        let slot = self
            .slot
            .take()
            .ok_or_else(|| DriverError::protocol("connection handle already used"))?;
        self.conn.submit(request, slot).await
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.conn.id())
            .field("state", &self.conn.state())
            .field("age", &self.conn.created_at().elapsed())
            .finish()
    }
}

// ============================================================================
// PoolMetrics - 풀 메트릭
// ============================================================================

/// 풀 메트릭
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// 현재 연결 수
    pub size: usize,
    /// 진행 중인 요청 수
    pub in_flight: usize,
    /// 총 획득 횟수
    pub total_acquisitions: u64,
    /// 총 생성 횟수
    pub total_created: u64,
    /// 총 닫힌 연결 수
    pub total_closed: u64,
    /// 총 타임아웃 횟수
    pub total_timeouts: u64,
}

// ============================================================================
// ConnectionPool - 연결 풀
// ============================================================================

struct PoolShared {
    config: PoolConfig,
    dialer: Arc<dyn Dialer>,
    dispatch: Dispatch,
    registry: Mutex<Vec<Arc<Connection>>>,
    dialing: AtomicUsize,
    backoff: Mutex<Backoff>,
    capacity: Arc<Notify>,
    events: mpsc::UnboundedSender<PoolEvent>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    next_id: AtomicU64,
    total_acquisitions: AtomicU64,
    total_created: AtomicU64,
    total_closed: AtomicU64,
    total_timeouts: AtomicU64,
}

enum Selection {
    Ready(PooledConnection),
    Dial(DialGuard),
    Wait(Option<Instant>),
}

struct DialGuard {
    shared: Arc<PoolShared>,
}

impl Drop for DialGuard {
    fn drop(&mut self) {
        self.shared.dialing.fetch_sub(1, Ordering::AcqRel);
        self.shared.capacity.notify_waiters();
    }
}

impl PoolShared {
    fn is_aged(&self, conn: &Connection) -> bool {
        self.config
            .max_lifetime
            .map_or(false, |max| conn.created_at().elapsed() >= max)
    }

    /// 닫힌 연결 정리 (제거 수 반환)
    fn prune(&self, registry: &mut Vec<Arc<Connection>>) -> usize {
        let before = registry.len();
        registry.retain(|c| c.state() != ConnectionState::Disconnected);
        let removed = before - registry.len();
        self.total_closed.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    fn select(self: &Arc<Self>) -> Selection {
        let now = Instant::now();
        let mut expired = Vec::new();
        let selection = {
            let mut registry = self.registry.lock();
            self.prune(&mut registry);

            for conn in registry.iter() {
                if conn.state() == ConnectionState::Connected && self.is_aged(conn) {
                    conn.set_draining();
                    if conn.in_flight() == 0 {
                        expired.push(conn.clone());
                    }
                }
            }

            let mut usable: Vec<&Arc<Connection>> = registry
                .iter()
                .filter(|c| c.state() == ConnectionState::Connected)
                .collect();
            usable.sort_by_key(|c| c.in_flight());

            let idle = usable
                .first()
                .filter(|c| c.in_flight() == 0)
                .and_then(|c| c.try_reserve().map(|slot| PooledConnection::new((*c).clone(), slot)));

            if let Some(handle) = idle {
                Selection::Ready(handle)
            } else {
                let mut retry_at = None;
                let mut selection = None;
                if registry.len() + self.dialing.load(Ordering::Acquire) < self.config.max_size {
                    match self.backoff.lock().wait_until(now) {
                        Some(at) => retry_at = Some(at),
                        None => {
                            self.dialing.fetch_add(1, Ordering::AcqRel);
                            selection = Some(Selection::Dial(DialGuard {
                                shared: self.clone(),
                            }));
                        }
                    }
                }
                selection.unwrap_or_else(|| {
                    usable
                        .iter()
                        .find_map(|c| c.try_reserve().map(|slot| PooledConnection::new((*c).clone(), slot)))
                        .map_or(Selection::Wait(retry_at), Selection::Ready)
                })
            }
        };

        if !expired.is_empty() {
            tracing::dispatcher::with_default(&self.dispatch, || {
                for conn in expired {
                    conn.retire("max connection age reached");
                }
            });
        }
        selection
    }

    async fn dial(self: &Arc<Self>, _guard: DialGuard) -> DriverResult<Arc<Connection>> {
        match self.dialer.dial(&self.config.dial_config()).await {
            Ok(channel) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let conn = Connection::open(
                    id,
                    channel,
                    &self.config.connection_options(),
                    self.events.clone(),
                    self.capacity.clone(),
                    &self.dispatch,
                );
                {
                    let mut registry = self.registry.lock();
                    if !self.closed.load(Ordering::Acquire) {
                        registry.push(conn.clone());
                        self.total_created.fetch_add(1, Ordering::Relaxed);
                        let _ = self.events.send(PoolEvent::DialSucceeded { id });
                        return Ok(conn);
                    }
                }
                conn.retire("pool closed");
                Err(DriverError::PoolClosed)
            }
            Err(err) => {
                tracing::dispatcher::with_default(&self.dispatch, || {
                    tracing::warn!(url = %self.config.url, error = %err, "dial failed")
                });
                let _ = self.events.send(PoolEvent::DialFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn handle_event(&self, event: PoolEvent) {
        match event {
            PoolEvent::Retired { id, reason } => {
                let mut registry = self.registry.lock();
                let before = registry.len();
                registry.retain(|c| c.id() != id);
                if registry.len() < before {
                    self.total_closed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(connection_id = id, reason = %reason, "connection removed from pool");
                }
            }
            PoolEvent::DialFailed { reason } => {
                let mut backoff = self.backoff.lock();
                backoff.fail();
                tracing::debug!(reason = %reason, delay = ?backoff.delay(), "reconnect backoff");
            }
            PoolEvent::DialSucceeded { .. } => self.backoff.lock().reset(),
        }
        self.capacity.notify_waiters();
    }

    async fn check_health(&self) {
        let snapshot: Vec<Arc<Connection>> = self.registry.lock().clone();
        let mut idle = Vec::new();
        for conn in snapshot {
            if conn.state() == ConnectionState::Connected && self.is_aged(&conn) {
                conn.set_draining();
            }
            match conn.state() {
                ConnectionState::Draining if conn.in_flight() == 0 => {
                    conn.retire("max connection age reached")
                }
                ConnectionState::Connected if conn.in_flight() == 0 => idle.push(conn),
                _ => {}
            }
        }

        let timeout = self.config.read_timeout;
        let results = join_all(idle.iter().map(|conn| conn.probe(timeout))).await;
        for (conn, result) in idle.iter().zip(results) {
            if let Err(err) = result {
                conn.retire(&format!("health check failed: {}", err));
            }
        }
    }
}

async fn maintain(
    shared: Weak<PoolShared>,
    mut events: mpsc::UnboundedReceiver<PoolEvent>,
    shutdown: CancellationToken,
    alive_check_interval: Option<Duration>,
) {
    let mut ticker = alive_check_interval
        .filter(|interval| !interval.is_zero())
        .map(|interval| tokio::time::interval_at(tokio::time::Instant::now() + interval, interval));

    loop {
        let tick = async {
            match ticker.as_mut() {
                Some(ticker) => {
                    ticker.tick().await;
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown.cancelled() => return,
            event = events.recv() => {
                let (Some(event), Some(shared)) = (event, shared.upgrade()) else {
                    return;
                };
                shared.handle_event(event);
            }
            _ = tick => {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                shared.check_health().await;
            }
        }
    }
}

/// 연결 풀
///
/// 연결은 필요할 때 만들어지고(최대 `max_size`), 각 연결은 최대
/// `max_in_flight`개의 요청을 동시에 실어 나릅니다.
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// 새 연결 풀 생성 (tokio 런타임 안에서 호출)
    pub fn new(config: PoolConfig, dialer: Arc<dyn Dialer>, dispatch: Dispatch) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let alive_check_interval = config.alive_check_interval;
        let shared = Arc::new(PoolShared {
            backoff: Mutex::new(Backoff::new(config.max_backoff)),
            config,
            dialer,
            dispatch: dispatch.clone(),
            registry: Mutex::new(Vec::new()),
            dialing: AtomicUsize::new(0),
            capacity: Arc::new(Notify::new()),
            events,
            closed: AtomicBool::new(false),
            shutdown: shutdown.clone(),
            next_id: AtomicU64::new(1),
            total_acquisitions: AtomicU64::new(0),
            total_created: AtomicU64::new(0),
            total_closed: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
        });

        tokio::spawn(
            maintain(Arc::downgrade(&shared), receiver, shutdown, alive_check_interval)
                .with_subscriber(dispatch),
        );

        Self { shared }
    }

    /// 풀 설정
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// 연결 획득
    ///
    /// 여유 슬롯이 생길 때까지 `acquire_timeout`(컨텍스트 데드라인이 더 이르면 그때)까지
    /// 기다립니다. 새 연결의 다이얼 실패는 `Transport` 에러로 즉시 반환됩니다.
    pub async fn get(&self, ctx: &Context) -> DriverResult<PooledConnection> {
        ctx.check()?;
        let shared = &self.shared;
        let timeout_at = Instant::now() + shared.config.acquire_timeout;
        let deadline = ctx.get_deadline().map_or(timeout_at, |d| d.min(timeout_at));

        loop {
            if shared.closed.load(Ordering::Acquire) {
                return Err(DriverError::PoolClosed);
            }

            let notified = shared.capacity.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match shared.select() {
                Selection::Ready(handle) => {
                    shared.total_acquisitions.fetch_add(1, Ordering::Relaxed);
                    return Ok(handle);
                }
                Selection::Dial(guard) => {
                    let conn = shared.dial(guard).await?;
                    if let Some(slot) = conn.try_reserve() {
                        shared.total_acquisitions.fetch_add(1, Ordering::Relaxed);
                        return Ok(PooledConnection::new(conn, slot));
                    }
                }
                Selection::Wait(retry_at) => {
                    let wake = retry_at.map_or(deadline, |at| at.min(deadline));
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(wake.into()) => {
                            if Instant::now() >= deadline {
                                shared.total_timeouts.fetch_add(1, Ordering::Relaxed);
                                return Err(DriverError::pool_timeout(format!(
                                    "no connection available within {:?}",
                                    shared.config.acquire_timeout
                                )));
                            }
                        }
                        _ = ctx.cancelled() => return Err(DriverError::Cancelled),
                    }
                }
            }
        }
    }

    /// 연결 반환 (요청을 보내지 않은 슬롯 해제)
    pub fn put(&self, handle: PooledConnection) {
        drop(handle);
    }

    /// 연결 하나를 미리 열어 둠
    pub async fn warmup(&self, ctx: &Context) -> DriverResult<()> {
        let handle = self.get(ctx).await?;
        self.put(handle);
        Ok(())
    }

    /// 풀 닫기 (멱등)
    ///
    /// 모든 연결을 퇴역시키고 응답 대기 중인 요청은 전송 실패로 완료됩니다.
    pub fn close(&self) {
        let connections = {
            let mut registry = self.shared.registry.lock();
            if self.shared.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *registry)
        };
        self.shared.shutdown.cancel();
        self.shared
            .total_closed
            .fetch_add(connections.len() as u64, Ordering::Relaxed);
        tracing::dispatcher::with_default(&self.shared.dispatch, || {
            for conn in connections {
                conn.retire("pool closed");
            }
        });
        self.shared.capacity.notify_waiters();
    }

    /// 닫힘 여부
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> PoolMetrics {
        let registry = self.shared.registry.lock();
        PoolMetrics {
            size: registry.len(),
            in_flight: registry.iter().map(|c| c.in_flight()).sum(),
            total_acquisitions: self.shared.total_acquisitions.load(Ordering::Relaxed),
            total_created: self.shared.total_created.load(Ordering::Relaxed),
            total_closed: self.shared.total_closed.load(Ordering::Relaxed),
            total_timeouts: self.shared.total_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 연결별 상태
    pub fn connection_states(&self) -> Vec<(u64, ConnectionState)> {
        self.shared
            .registry
            .lock()
            .iter()
            .map(|c| (c.id(), c.state()))
            .collect()
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("url", &self.shared.config.url)
            .field("metrics", &self.metrics())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::{MockServer, Reply};
    use crate::graph::Value;
    use crate::graphson::make_request;

    fn config(max_size: usize, max_in_flight: usize) -> PoolConfig {
        PoolConfig {
            max_size,
            max_in_flight,
            acquire_timeout: Duration::from_millis(100),
            ping_interval: Duration::ZERO,
            alive_check_interval: None,
            ..PoolConfig::default()
        }
    }

    fn pool(server: &MockServer, config: PoolConfig) -> ConnectionPool {
        ConnectionPool::new(config, Arc::new(server.clone()), Dispatch::none())
    }

    fn slow_server(delay: Duration) -> MockServer {
        MockServer::new(move |req| vec![Reply::Delay(delay), Reply::ok(&req.request_id, Value::Null)])
    }

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size, 8);
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.url, "ws://localhost:8182/gremlin");
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(300));
        backoff.fail();
        assert_eq!(backoff.delay(), Some(Duration::from_millis(100)));
        backoff.fail();
        assert_eq!(backoff.delay(), Some(Duration::from_millis(200)));
        backoff.fail();
        assert_eq!(backoff.delay(), Some(Duration::from_millis(300)));
        assert!(backoff.wait_until(Instant::now()).is_some());

        backoff.reset();
        assert_eq!(backoff.delay(), None);
        assert!(backoff.wait_until(Instant::now()).is_none());
    }

    #[tokio::test]
    async fn test_shares_connection_up_to_ceiling() {
        let server = MockServer::empty();
        let pool = pool(&server, config(1, 2));
        let ctx = Context::background();

        let a = pool.get(&ctx).await.unwrap();
        let b = pool.get(&ctx).await.unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(server.dial_count(), 1);
        assert_eq!(pool.metrics().in_flight, 2);

        let err = pool.get(&ctx).await.unwrap_err();
        assert!(matches!(err, DriverError::PoolTimeout(_)));
        assert_eq!(pool.metrics().total_timeouts, 1);

        pool.put(a);
        assert!(pool.get(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_grows_when_connections_busy() {
        let server = MockServer::empty();
        let pool = pool(&server, config(2, 4));
        let ctx = Context::background();

        let a = pool.get(&ctx).await.unwrap();
        let b = pool.get(&ctx).await.unwrap();
        assert_ne!(a.id(), b.id());

        let c = pool.get(&ctx).await.unwrap();
        assert_eq!(server.dial_count(), 2);
        assert!(c.id() == a.id() || c.id() == b.id());
        assert_eq!(pool.metrics().size, 2);
        assert_eq!(pool.metrics().total_created, 2);
    }

    #[tokio::test]
    async fn test_waiter_resumes_when_response_completes() {
        let server = slow_server(Duration::from_millis(30));
        let mut cfg = config(1, 1);
        cfg.acquire_timeout = Duration::from_secs(2);
        let pool = pool(&server, cfg);
        let ctx = Context::background();

        let request = make_request("g.V()", None, None, None).unwrap();
        let future = pool.get(&ctx).await.unwrap().submit(&request).await.unwrap();

        let started = Instant::now();
        let handle = pool.get(&ctx).await.unwrap();
        assert!(future.is_completed());
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(handle.id(), 1);
    }

    #[tokio::test]
    async fn test_ceiling_never_exceeded() {
        let server = slow_server(Duration::from_millis(10));
        let mut cfg = config(2, 2);
        cfg.acquire_timeout = Duration::from_secs(5);
        let pool = Arc::new(pool(&server, cfg));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move {
                let handle = pool.get(&Context::background()).await.unwrap();
                assert!(handle.connection().in_flight() <= 2);
                let request = make_request(&format!("g.V({})", i), None, None, None).unwrap();
                handle.submit(&request).await.unwrap().get().await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().code(), 200);
        }
        assert!(server.dial_count() <= 2);
        assert_eq!(server.requests().len(), 16);
    }

    #[tokio::test]
    async fn test_retired_connection_replaced() {
        let server = MockServer::new(|_| Vec::new());
        let pool = pool(&server, config(1, 4));
        let ctx = Context::background();

        let request = make_request("g.V()", None, None, None).unwrap();
        let handle = pool.get(&ctx).await.unwrap();
        let first_id = handle.id();
        let future = handle.submit(&request).await.unwrap();

        server.disconnect_all();
        let response = future.get().await;
        assert!(crate::driver::future::response_error(&response).unwrap().trips_breaker());

        let handle = pool.get(&ctx).await.unwrap();
        assert_ne!(handle.id(), first_id);
        assert_eq!(server.dial_count(), 2);
        assert_eq!(pool.metrics().total_closed, 1);
    }

    #[tokio::test]
    async fn test_dial_failure_then_backoff_recovery() {
        let server = MockServer::empty();
        let mut cfg = config(1, 1);
        cfg.acquire_timeout = Duration::from_secs(2);
        let pool = pool(&server, cfg);
        let ctx = Context::background();

        server.fail_next_dials(1);
        let err = pool.get(&ctx).await.unwrap_err();
        assert!(err.trips_breaker());

        assert!(pool.get(&ctx).await.is_ok());
        assert_eq!(server.dial_count(), 2);
    }

    #[tokio::test]
    async fn test_aged_connection_drains_then_retires() {
        let server = MockServer::empty();
        let mut cfg = config(2, 4);
        cfg.max_lifetime = Some(Duration::from_millis(20));
        let pool = pool(&server, cfg);
        let ctx = Context::background();

        let old = pool.get(&ctx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let fresh = pool.get(&ctx).await.unwrap();
        assert_ne!(fresh.id(), old.id());
        assert_eq!(old.connection().state(), ConnectionState::Draining);

        let old_id = old.id();
        pool.put(old);
        let states = pool.connection_states();
        assert!(states
            .iter()
            .all(|(id, state)| *id != old_id || *state == ConnectionState::Disconnected));
    }

    #[tokio::test]
    async fn test_health_check_retires_unresponsive() {
        let server = MockServer::empty();
        let mut cfg = config(1, 1);
        cfg.alive_check_interval = Some(Duration::from_millis(20));
        cfg.read_timeout = Duration::from_millis(20);
        let pool = pool(&server, cfg);

        pool.warmup(&Context::background()).await.unwrap();
        server.set_answer_pings(false);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(pool.connection_states().is_empty());
        assert_eq!(pool.metrics().total_closed, 1);
    }

    #[tokio::test]
    async fn test_health_check_keeps_responsive() {
        let server = MockServer::empty();
        let mut cfg = config(1, 1);
        cfg.alive_check_interval = Some(Duration::from_millis(20));
        cfg.read_timeout = Duration::from_millis(100);
        let pool = pool(&server, cfg);

        pool.warmup(&Context::background()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pool.connection_states(), vec![(1, ConnectionState::Connected)]);
    }

    #[tokio::test]
    async fn test_cancelled_wait() {
        let server = MockServer::empty();
        let mut cfg = config(1, 1);
        cfg.acquire_timeout = Duration::from_secs(5);
        let pool = pool(&server, cfg);

        let _held = pool.get(&Context::background()).await.unwrap();
        let token = tokio_util::sync::CancellationToken::new();
        let ctx = Context::with_cancellation(token.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        assert!(matches!(pool.get(&ctx).await, Err(DriverError::Cancelled)));
    }

    #[tokio::test]
    async fn test_context_deadline_bounds_wait() {
        let server = MockServer::empty();
        let mut cfg = config(1, 1);
        cfg.acquire_timeout = Duration::from_secs(5);
        let pool = pool(&server, cfg);

        let _held = pool.get(&Context::background()).await.unwrap();
        let started = Instant::now();
        let ctx = Context::with_timeout(Duration::from_millis(30));
        assert!(matches!(pool.get(&ctx).await, Err(DriverError::PoolTimeout(_))));
        assert!(started.elapsed() < Duration::from_secs(1));

        let expired = Context::with_deadline(Instant::now());
        assert!(matches!(pool.get(&expired).await, Err(DriverError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_close() {
        let server = MockServer::new(|_| Vec::new());
        let pool = pool(&server, config(1, 4));
        let ctx = Context::background();

        let request = make_request("g.V()", None, None, None).unwrap();
        let future = pool.get(&ctx).await.unwrap().submit(&request).await.unwrap();

        pool.close();
        pool.close();
        assert!(pool.is_closed());
        assert!(future.get().await.code() == 0);
        assert!(matches!(pool.get(&ctx).await, Err(DriverError::PoolClosed)));
        assert_eq!(pool.metrics().size, 0);
    }
}
