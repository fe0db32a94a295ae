//! Connection
//!
//! 요청 ID로 다중화되는 단일 WebSocket 연결 (쓰기 경로 1개, 읽기 태스크 1개)

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot, Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use super::error::{DriverError, DriverResult};
use super::future::ResponseFuture;
use super::transport::{Frame, FrameChannel, FrameSink, FrameStream};
use crate::graphson::codec::{deserialize_response, peek_request_id, serialize_request};
use crate::graphson::{make_auth_request, Request, Response, StatusClass};

const WRITE_QUEUE_SIZE: usize = 64;
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_millis(200);

// ============================================================================
// ConnectionState - 연결 상태
// ============================================================================

/// 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 끊김 (퇴역)
    Disconnected,
    /// 연결 중
    Connecting,
    /// 연결됨
    Connected,
    /// 새 요청을 받지 않고 진행 중인 요청만 마무리
    Draining,
}

/// 풀 관리 태스크로 보내는 연결 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PoolEvent {
    /// 연결 퇴역
    Retired { id: u64, reason: String },
    /// 연결 실패
    DialFailed { reason: String },
    /// 연결 성공
    DialSucceeded { id: u64 },
}

/// 연결 동작 설정
#[derive(Debug, Clone)]
pub(crate) struct ConnectionOptions {
    pub max_in_flight: usize,
    pub write_timeout: Duration,
    pub ping_interval: Duration,
    pub credentials: Option<(String, String)>,
}

struct WriteCommand {
    frame: Frame,
    ack: Option<oneshot::Sender<DriverResult<()>>>,
}

// ============================================================================
// Slot - 동시 요청 슬롯
// ============================================================================

/// 연결의 동시 요청 슬롯 1개
///
/// 해제되면 풀 대기자를 깨웁니다.
pub(crate) struct Slot {
    permit: Option<OwnedSemaphorePermit>,
    conn: Weak<Connection>,
    capacity: Arc<Notify>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        drop(self.permit.take());
        if let Some(conn) = self.conn.upgrade() {
            if conn.state() == ConnectionState::Draining && conn.in_flight() == 0 {
                conn.retire("max connection age reached");
            }
        }
        self.capacity.notify_waiters();
    }
}

// ============================================================================
// Connection
// ============================================================================

/// 다중화 연결
pub struct Connection {
    id: u64,
    created_at: Instant,
    last_activity: Mutex<Instant>,
    state: RwLock<ConnectionState>,
    pending: Mutex<HashMap<String, ResponseFuture>>,
    slots: Arc<Semaphore>,
    max_in_flight: usize,
    writer: mpsc::Sender<WriteCommand>,
    pongs: AtomicU64,
    pong_notify: Notify,
    shutdown: CancellationToken,
    events: mpsc::UnboundedSender<PoolEvent>,
    capacity: Arc<Notify>,
    credentials: Option<(String, String)>,
    write_timeout: Duration,
}

impl Connection {
    /// 채널 위에 연결을 열고 읽기/쓰기 태스크 시작
    pub(crate) fn open(
        id: u64,
        channel: FrameChannel,
        options: &ConnectionOptions,
        events: mpsc::UnboundedSender<PoolEvent>,
        capacity: Arc<Notify>,
        dispatch: &Dispatch,
    ) -> Arc<Self> {
        let (writer, queue) = mpsc::channel(WRITE_QUEUE_SIZE);
        let now = Instant::now();
        let conn = Arc::new(Self {
            id,
            created_at: now,
            last_activity: Mutex::new(now),
            state: RwLock::new(ConnectionState::Connecting),
            pending: Mutex::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(options.max_in_flight)),
            max_in_flight: options.max_in_flight,
            writer,
            pongs: AtomicU64::new(0),
            pong_notify: Notify::new(),
            shutdown: CancellationToken::new(),
            events,
            capacity,
            credentials: options.credentials.clone(),
            write_timeout: options.write_timeout,
        });

        tokio::spawn(
            write_loop(
                Arc::downgrade(&conn),
                channel.sink,
                queue,
                conn.shutdown.clone(),
                options.ping_interval,
            )
            .with_subscriber(dispatch.clone()),
        );
        tokio::spawn(
            read_loop(Arc::downgrade(&conn), channel.stream, conn.shutdown.clone())
                .with_subscriber(dispatch.clone()),
        );

        *conn.state.write() = ConnectionState::Connected;
        tracing::debug!(connection_id = id, "connection opened");
        conn
    }

    /// 연결 ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 생성 시각
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// 마지막 송수신 시각
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    /// 상태
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// 진행 중인 요청 수
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.slots.available_permits()
    }

    /// 응답 대기 중인 요청 수
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// 새 요청 슬롯 예약 (`Connected` 상태에서만)
    pub(crate) fn try_reserve(self: &Arc<Self>) -> Option<Slot> {
        if self.state() != ConnectionState::Connected {
            return None;
        }
        let permit = self.slots.clone().try_acquire_owned().ok()?;
        Some(Slot {
            permit: Some(permit),
            conn: Arc::downgrade(self),
            capacity: self.capacity.clone(),
        })
    }

    /// 새 요청을 받지 않도록 표시
    pub(crate) fn set_draining(&self) {
        let mut state = self.state.write();
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Draining;
            tracing::debug!(connection_id = self.id, "connection draining");
        }
    }

    /// 요청 전송
    ///
    /// 응답 future를 등록한 뒤 프레임을 쓰고, 슬롯은 future가 완료될 때 해제됩니다.
    /// 쓰기 실패 시 연결을 퇴역시키고 `Transport` 에러를 반환합니다.
    pub(crate) async fn submit(&self, request: &Request, slot: Slot) -> DriverResult<ResponseFuture> {
        let frame = serialize_request(request)?;
        let request_id = request.request_id.clone();
        let future = ResponseFuture::new(request_id.clone());
        {
            // retire()와 같은 락 아래에서 상태 확인
            let mut pending = self.pending.lock();
            if self.state() == ConnectionState::Disconnected {
                return Err(DriverError::transport(format!("connection {} is closed", self.id)));
            }
            if pending.contains_key(&request_id) {
                return Err(DriverError::protocol(format!(
                    "request id {} is already in flight",
                    request_id
                )));
            }
            pending.insert(request_id.clone(), future.clone());
        }
        future.on_complete(move |_| drop(slot));

        tracing::trace!(connection_id = self.id, request_id = %request_id, op = %request.op, "write request");
        match self.write(Frame::Binary(frame)).await {
            Ok(()) => Ok(future),
            Err(err) => {
                let future = self.pending.lock().remove(&request_id);
                if let Some(future) = future {
                    future.complete(Response::transport_failure(&request_id, err.to_string()));
                }
                self.retire(&err.to_string());
                Err(err)
            }
        }
    }

    /// 프레임을 쓰고 쓰기 완료까지 대기 (쓰기 타임아웃 적용)
    async fn write(&self, frame: Frame) -> DriverResult<()> {
        let (ack, done) = oneshot::channel();
        let write = async {
            self.writer
                .send(WriteCommand {
                    frame,
                    ack: Some(ack),
                })
                .await
                .map_err(|_| DriverError::transport("connection writer stopped"))?;
            done.await
                .map_err(|_| DriverError::transport("connection writer stopped"))?
        };
        let result = tokio::time::timeout(self.write_timeout, write)
            .await
            .map_err(|_| {
                DriverError::transport(format!("write timed out after {:?}", self.write_timeout))
            })?;
        if result.is_ok() {
            self.touch();
        }
        result
    }

    /// 응답을 기다리지 않는 프레임 전송 (pong 등)
    fn send_nowait(&self, frame: Frame) {
        if self.writer.try_send(WriteCommand { frame, ack: None }).is_err() {
            tracing::debug!(connection_id = self.id, "write queue full, frame dropped");
        }
    }

    /// ping/pong 헬스 프로브
    pub(crate) async fn probe(&self, timeout: Duration) -> DriverResult<()> {
        let before = self.pongs.load(Ordering::Acquire);
        let wait_pong = async {
            loop {
                let notified = self.pong_notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.pongs.load(Ordering::Acquire) > before {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, async {
            self.write(Frame::Ping(Bytes::from_static(b"gdb"))).await?;
            wait_pong.await;
            Ok::<(), DriverError>(())
        })
        .await
        .map_err(|_| DriverError::transport(format!("health probe timed out after {:?}", timeout)))?
    }

    /// 연결 퇴역 (멱등)
    ///
    /// 대기 중인 모든 future를 전송 실패 응답으로 완료합니다.
    pub(crate) fn retire(&self, reason: &str) {
        let pending: Vec<(String, ResponseFuture)> = {
            let mut pending = self.pending.lock();
            let mut state = self.state.write();
            if *state == ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Disconnected;
            pending.drain().collect()
        };
        self.shutdown.cancel();

        tracing::warn!(
            connection_id = self.id,
            reason,
            failed_requests = pending.len(),
            "connection retired"
        );
        for (request_id, future) in pending {
            future.complete(Response::transport_failure(request_id, reason));
        }

        let _ = self.events.send(PoolEvent::Retired {
            id: self.id,
            reason: reason.to_string(),
        });
        self.capacity.notify_waiters();
    }

    fn record_pong(&self) {
        self.pongs.fetch_add(1, Ordering::AcqRel);
        self.pong_notify.notify_waiters();
    }

    /// 수신 프레임 처리
    async fn handle_frame(&self, frame: &[u8]) {
        self.touch();
        let response = match deserialize_response(frame) {
            Ok(response) => response,
            Err(err) => {
                let request_id = peek_request_id(frame);
                tracing::error!(
                    connection_id = self.id,
                    request_id = ?request_id,
                    error = %err,
                    "malformed response frame"
                );
                if let Some(request_id) = request_id {
                    let future = self.pending.lock().remove(&request_id);
                    if let Some(future) = future {
                        future.complete(Response::malformed(request_id, err.to_string()));
                    }
                }
                return;
            }
        };

        tracing::trace!(
            connection_id = self.id,
            request_id = %response.request_id,
            code = response.code(),
            "response frame"
        );

        match response.class() {
            StatusClass::Partial => {
                let future = self.pending.lock().get(&response.request_id).cloned();
                match future {
                    Some(future) => future.accumulate(response.items()),
                    None => self.unmatched(&response),
                }
            }
            StatusClass::Authenticate => self.authenticate(response).await,
            _ => {
                let future = self.pending.lock().remove(&response.request_id);
                match future {
                    Some(future) => {
                        future.complete(response);
                    }
                    None => self.unmatched(&response),
                }
            }
        }
    }

    async fn authenticate(&self, challenge: Response) {
        let request_id = challenge.request_id.clone();
        if !self.pending.lock().contains_key(&request_id) {
            self.unmatched(&challenge);
            return;
        }

        let Some((username, password)) = &self.credentials else {
            let future = self.pending.lock().remove(&request_id);
            if let Some(future) = future {
                future.complete(challenge);
            }
            return;
        };

        let request = make_auth_request(&request_id, username, password);
        let result = match serialize_request(&request) {
            Ok(frame) => self.write(Frame::Binary(frame)).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = result {
            tracing::warn!(connection_id = self.id, request_id = %request_id, error = %err, "authentication reply failed");
            self.retire(&err.to_string());
        }
    }

    fn unmatched(&self, response: &Response) {
        tracing::warn!(
            connection_id = self.id,
            request_id = %response.request_id,
            code = response.code(),
            "response for unknown request dropped"
        );
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .field("age", &self.created_at.elapsed())
            .finish()
    }
}

// ============================================================================
// I/O tasks
// ============================================================================

async fn write_loop(
    conn: Weak<Connection>,
    mut sink: FrameSink,
    mut queue: mpsc::Receiver<WriteCommand>,
    shutdown: CancellationToken,
    ping_interval: Duration,
) {
    let mut keepalive = (!ping_interval.is_zero()).then(|| {
        tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval)
    });

    loop {
        let tick = async {
            match keepalive.as_mut() {
                Some(interval) => {
                    interval.tick().await;
                }
                None => std::future::pending().await,
            }
        };

        let failure = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                let _ = tokio::time::timeout(CLOSE_FRAME_TIMEOUT, sink.send(Frame::Close)).await;
                return;
            }
            command = queue.recv() => match command {
                Some(command) => {
                    let result = sink.send(command.frame).await;
                    let failure = result.as_ref().err().map(ToString::to_string);
                    if let Some(ack) = command.ack {
                        let _ = ack.send(result);
                    }
                    failure
                }
                None => return,
            },
            _ = tick => sink
                .send(Frame::Ping(Bytes::from_static(b"keepalive")))
                .await
                .err()
                .map(|e| e.to_string()),
        };

        if let Some(reason) = failure {
            if let Some(conn) = conn.upgrade() {
                conn.retire(&reason);
            }
            return;
        }
    }
}

async fn read_loop(conn: Weak<Connection>, mut stream: FrameStream, shutdown: CancellationToken) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => return,
            frame = stream.next() => frame,
        };
        let Some(conn) = conn.upgrade() else {
            return;
        };

        match frame {
            Some(Ok(Frame::Binary(data))) => conn.handle_frame(&data).await,
            Some(Ok(Frame::Text(text))) => conn.handle_frame(text.as_bytes()).await,
            Some(Ok(Frame::Ping(payload))) => conn.send_nowait(Frame::Pong(payload)),
            Some(Ok(Frame::Pong(_))) => conn.record_pong(),
            Some(Ok(Frame::Close)) | None => {
                conn.retire("connection closed by server");
                return;
            }
            Some(Err(err)) => {
                conn.retire(&err.to_string());
                return;
            }
        }
    }
}
