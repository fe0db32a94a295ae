//! Transport
//!
//! 프레임 단위 양방향 스트림과 WebSocket 다이얼러

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

use super::error::{DriverError, DriverResult};

// ============================================================================
// Frame - 전송 프레임
// ============================================================================

/// 전송 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 바이너리 메시지
    Binary(Bytes),
    /// 텍스트 메시지
    Text(String),
    /// ping
    Ping(Bytes),
    /// pong
    Pong(Bytes),
    /// 종료
    Close,
}

/// 프레임 송신부
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = DriverError> + Send>>;

/// 프레임 수신부
pub type FrameStream = Pin<Box<dyn Stream<Item = DriverResult<Frame>> + Send>>;

/// 연결된 양방향 채널
pub struct FrameChannel {
    /// 송신부
    pub sink: FrameSink,
    /// 수신부
    pub stream: FrameStream,
}

impl std::fmt::Debug for FrameChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameChannel").finish_non_exhaustive()
    }
}

/// 다이얼 설정
#[derive(Debug, Clone)]
pub struct DialConfig {
    /// 접속 URL
    pub url: String,
    /// 읽기 버퍼 크기
    pub read_buffer_size: usize,
    /// 쓰기 버퍼 크기
    pub write_buffer_size: usize,
    /// 핸드셰이크 타임아웃
    pub handshake_timeout: Duration,
}

/// 연결 생성기
pub trait Dialer: Send + Sync + 'static {
    /// 새 채널 연결
    fn dial(&self, config: &DialConfig) -> BoxFuture<'static, DriverResult<FrameChannel>>;
}

// ============================================================================
// WebSocketDialer
// ============================================================================

/// tokio-tungstenite 기반 다이얼러
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketDialer;

impl From<tokio_tungstenite::tungstenite::Error> for DriverError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        DriverError::transport(err.to_string())
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Binary(b) => Message::Binary(b.to_vec()),
        Frame::Text(t) => Message::Text(t),
        Frame::Ping(p) => Message::Ping(p.to_vec()),
        Frame::Pong(p) => Message::Pong(p.to_vec()),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Option<Frame> {
    match message {
        Message::Binary(b) => Some(Frame::Binary(Bytes::from(b))),
        Message::Text(t) => Some(Frame::Text(t)),
        Message::Ping(p) => Some(Frame::Ping(Bytes::from(p))),
        Message::Pong(p) => Some(Frame::Pong(Bytes::from(p))),
        Message::Close(_) => Some(Frame::Close),
        Message::Frame(_) => None,
    }
}

impl Dialer for WebSocketDialer {
    fn dial(&self, config: &DialConfig) -> BoxFuture<'static, DriverResult<FrameChannel>> {
        let config = config.clone();
        Box::pin(async move {
            let mut ws_config = WebSocketConfig::default();
            ws_config.write_buffer_size = config.write_buffer_size;

            // 읽기 버퍼는 TCP 스트림 쪽에 둔다
            let handshake = async {
                let request = config.url.as_str().into_client_request()?;
                let host = request
                    .uri()
                    .host()
                    .unwrap_or_default()
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .to_string();
                let port = request.uri().port_u16().unwrap_or(80);

                let tcp = TcpStream::connect((host.as_str(), port)).await.map_err(|e| {
                    DriverError::transport(format!("connect to {} failed: {}", config.url, e))
                })?;
                let _ = tcp.set_nodelay(true);
                let stream = BufReader::with_capacity(config.read_buffer_size, tcp);

                let (ws, _response) =
                    tokio_tungstenite::client_async_with_config(request, stream, Some(ws_config))
                        .await?;
                Ok::<_, DriverError>(ws)
            };
            let ws = tokio::time::timeout(config.handshake_timeout, handshake)
                .await
                .map_err(|_| {
                    DriverError::transport(format!("handshake with {} timed out", config.url))
                })??;

            let (sink, stream) = ws.split();
            let sink = sink
                .sink_map_err(DriverError::from)
                .with(|frame: Frame| future::ready(Ok::<_, DriverError>(to_message(frame))));
            let stream = stream.filter_map(|item| {
                future::ready(match item {
                    Ok(message) => from_message(message).map(Ok),
                    Err(e) => Some(Err(DriverError::from(e))),
                })
            });

            Ok(FrameChannel {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}
