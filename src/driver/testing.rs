//! Mock Server
//!
//! 테스트용 인메모리 Gremlin 서버 (`Dialer` 구현)

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value as Json};

use super::error::{DriverError, DriverResult};
use super::transport::{DialConfig, Dialer, Frame, FrameChannel};
use crate::graph::Value;
use crate::graphson::codec::split_request_frame;
use crate::graphson::encoder;

type Handler = Box<dyn Fn(&RecordedRequest) -> Vec<Reply> + Send + Sync>;

/// 서버가 받은 요청
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub request_id: String,
    pub op: String,
    pub processor: String,
    pub args: Json,
    pub connection: usize,
}

impl RecordedRequest {
    /// `gremlin` 인자
    pub fn gremlin(&self) -> Option<&str> {
        self.args.get("gremlin").and_then(Json::as_str)
    }

    /// 바인딩 값 (GraphSON 원문)
    pub fn binding(&self, name: &str) -> Option<&Json> {
        self.args.get("bindings")?.get("@value")?.as_array().and_then(|flat| {
            flat.chunks(2)
                .find(|pair| pair[0].as_str() == Some(name))
                .map(|pair| &pair[1])
        })
    }
}

/// 요청 하나에 대한 서버 동작
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// 프레임 전송
    Frame(Frame),
    /// 대기
    Delay(Duration),
    /// 연결 종료
    Close,
    /// 임의 바이트 전송
    Raw(String),
}

impl Reply {
    /// 200 응답
    pub fn ok(request_id: &str, data: Value) -> Self {
        Self::response(request_id, 200, "", data)
    }

    /// 206 응답
    pub fn partial(request_id: &str, data: Value) -> Self {
        Self::response(request_id, 206, "", data)
    }

    /// 데이터 없는 상태 응답
    pub fn status(request_id: &str, code: u16, message: &str) -> Self {
        Self::response(request_id, code, message, Value::Null)
    }

    fn response(request_id: &str, code: u16, message: &str, data: Value) -> Self {
        let body = json!({
            "requestId": request_id,
            "status": {
                "code": code,
                "message": message,
                "attributes": {"@type": "g:Map", "@value": []},
            },
            "result": {
                "data": encoder::encode(&data),
                "meta": {"@type": "g:Map", "@value": []},
            },
        });
        Self::Frame(Frame::Binary(Bytes::from(body.to_string())))
    }
}

struct MockInner {
    handler: Handler,
    requests: Mutex<Vec<RecordedRequest>>,
    dials: AtomicUsize,
    failing_dials: AtomicUsize,
    answer_pings: AtomicBool,
    peers: Mutex<Vec<mpsc::UnboundedSender<Frame>>>,
}

/// 인메모리 서버
#[derive(Clone)]
pub(crate) struct MockServer {
    inner: Arc<MockInner>,
}

impl MockServer {
    /// 요청마다 `handler`가 돌려준 동작을 수행하는 서버
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Vec<Reply> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(MockInner {
                handler: Box::new(handler),
                requests: Mutex::new(Vec::new()),
                dials: AtomicUsize::new(0),
                failing_dials: AtomicUsize::new(0),
                answer_pings: AtomicBool::new(true),
                peers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 모든 eval에 빈 결과로 응답하는 서버
    pub fn empty() -> Self {
        Self::new(|req| vec![Reply::ok(&req.request_id, Value::List(Vec::new()))])
    }

    /// 받은 요청 목록
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().clone()
    }

    /// 받은 eval 스크립트 목록
    pub fn scripts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|r| r.op == "eval")
            .filter_map(|r| r.gremlin().map(str::to_string))
            .collect()
    }

    /// 연결 시도 횟수
    pub fn dial_count(&self) -> usize {
        self.inner.dials.load(Ordering::SeqCst)
    }

    /// 다음 `n`번의 연결 시도를 실패시킴
    pub fn fail_next_dials(&self, n: usize) {
        self.inner.failing_dials.store(n, Ordering::SeqCst);
    }

    /// ping 응답 여부
    pub fn set_answer_pings(&self, answer: bool) {
        self.inner.answer_pings.store(answer, Ordering::SeqCst);
    }

    /// 열린 모든 연결을 서버 쪽에서 닫음
    pub fn disconnect_all(&self) {
        for peer in self.inner.peers.lock().drain(..) {
            let _ = peer.unbounded_send(Frame::Close);
        }
    }

    async fn serve(
        inner: Arc<MockInner>,
        connection: usize,
        mut incoming: mpsc::UnboundedReceiver<Frame>,
        outgoing: mpsc::UnboundedSender<Frame>,
    ) {
        while let Some(frame) = incoming.next().await {
            let data = match frame {
                Frame::Binary(data) => data,
                Frame::Text(text) => Bytes::from(text),
                Frame::Ping(payload) => {
                    if inner.answer_pings.load(Ordering::SeqCst) {
                        let _ = outgoing.unbounded_send(Frame::Pong(payload));
                    }
                    continue;
                }
                Frame::Pong(_) => continue,
                Frame::Close => break,
            };

            let Ok((_, body)) = split_request_frame(&data) else {
                continue;
            };
            let field = |name: &str| body.get(name).and_then(Json::as_str).unwrap_or_default().to_string();
            let request = RecordedRequest {
                request_id: field("requestId"),
                op: field("op"),
                processor: field("processor"),
                args: body.get("args").cloned().unwrap_or(Json::Null),
                connection,
            };
            inner.requests.lock().push(request.clone());

            let replies = (inner.handler)(&request);
            let mut out = outgoing.clone();
            tokio::spawn(async move {
                for reply in replies {
                    let sent = match reply {
                        Reply::Frame(frame) => out.send(frame).await,
                        Reply::Raw(raw) => out.send(Frame::Binary(Bytes::from(raw))).await,
                        Reply::Close => out.send(Frame::Close).await,
                        Reply::Delay(delay) => {
                            tokio::time::sleep(delay).await;
                            Ok(())
                        }
                    };
                    if sent.is_err() {
                        break;
                    }
                }
            });
        }
    }
}

impl Dialer for MockServer {
    fn dial(&self, _config: &DialConfig) -> BoxFuture<'static, DriverResult<FrameChannel>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let connection = inner.dials.fetch_add(1, Ordering::SeqCst);
            let failing = inner
                .failing_dials
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(DriverError::transport("connection refused"));
            }

            let (client_tx, server_rx) = mpsc::unbounded();
            let (server_tx, client_rx) = mpsc::unbounded();
            inner.peers.lock().push(server_tx.clone());
            tokio::spawn(MockServer::serve(inner, connection, server_rx, server_tx));

            Ok(FrameChannel {
                sink: Box::pin(client_tx.sink_map_err(|e| DriverError::transport(e.to_string()))),
                stream: Box::pin(client_rx.map(Ok)),
            })
        })
    }
}

// ============================================================================
// Log capture
// ============================================================================

/// 로그 출력 버퍼
#[derive(Clone, Default)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// WARN 이상을 버퍼에 기록하는 dispatch
pub(crate) fn capture_logs() -> (LogBuffer, tracing::Dispatch) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::Dispatch::new(subscriber))
}
