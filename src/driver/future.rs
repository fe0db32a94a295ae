//! Response Futures
//!
//! 요청 단위 단발 완료 future와 결과 집계 future

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use parking_lot::{Condvar, Mutex};
use tokio::sync::watch;

use super::context::Context;
use super::error::{DriverError, DriverResult};
use super::result::GraphResult;
use crate::graph::Value;
use crate::graphson::{Response, ResponseOrigin};

type Callback = Box<dyn FnOnce(&Response) + Send>;

// ============================================================================
// ResponseFuture - 단발 완료 future
// ============================================================================

struct State {
    response: Option<Response>,
    items: Vec<Value>,
    callbacks: Vec<Callback>,
}

struct Inner {
    request_id: String,
    completed: AtomicBool,
    state: Mutex<State>,
    condvar: Condvar,
    version: watch::Sender<u64>,
}

/// 요청 하나에 묶인 단발 완료 future
///
/// 최초 `complete`만 반영되고 이후 호출은 무시됩니다. 완료 전에 도착한
/// partial 항목은 도착 순서대로 쌓였다가 성공 응답의 데이터 앞에 합쳐집니다.
#[derive(Clone)]
pub struct ResponseFuture {
    inner: Arc<Inner>,
}

impl ResponseFuture {
    /// 새 future 생성
    pub fn new(request_id: impl Into<String>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                request_id: request_id.into(),
                completed: AtomicBool::new(false),
                state: Mutex::new(State {
                    response: None,
                    items: Vec::new(),
                    callbacks: Vec::new(),
                }),
                condvar: Condvar::new(),
                version,
            }),
        }
    }

    /// 요청 ID
    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    /// 완료 여부
    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// partial 항목 추가 (완료 후에는 무시)
    pub fn accumulate(&self, items: Vec<Value>) {
        {
            let mut state = self.inner.state.lock();
            if self.is_completed() {
                return;
            }
            state.items.extend(items);
        }
        self.inner.version.send_modify(|v| *v += 1);
    }

    /// 완료 (최초 호출만 반영, 반영 여부 반환)
    ///
    /// 콜백은 응답이 대기자에게 보이기 전에 실행됩니다.
    pub fn complete(&self, response: Response) -> bool {
        let (response, callbacks) = {
            let mut state = self.inner.state.lock();
            if self.inner.completed.swap(true, Ordering::AcqRel) {
                return false;
            }
            let mut response = response;
            if response.origin == ResponseOrigin::Server && response.class().is_success() {
                let items = response.items();
                state.items.extend(items);
                response.data = Value::List(state.items.clone());
            }
            (response, std::mem::take(&mut state.callbacks))
        };
        for callback in callbacks {
            callback(&response);
        }

        let late = {
            let mut state = self.inner.state.lock();
            state.response = Some(response.clone());
            std::mem::take(&mut state.callbacks)
        };
        self.inner.condvar.notify_all();
        self.inner.version.send_modify(|v| *v += 1);
        for callback in late {
            callback(&response);
        }
        true
    }

    /// 완료 콜백 등록 (이미 완료됐으면 즉시 실행)
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Response) + Send + 'static,
    {
        let response = {
            let mut state = self.inner.state.lock();
            match &state.response {
                Some(response) => response.clone(),
                None => {
                    state.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&response);
    }

    /// 완료된 응답 (대기 없음)
    pub fn try_get(&self) -> Option<Response> {
        self.inner.state.lock().response.clone()
    }

    /// 완료까지 대기
    pub async fn get(&self) -> Response {
        let mut rx = self.inner.version.subscribe();
        loop {
            if let Some(response) = self.try_get() {
                return response;
            }
            // sender는 self가 살아 있는 동안 유지됨
            let _ = rx.changed().await;
        }
    }

    /// 완료 또는 타임아웃까지 대기 (타임아웃이면 `None`, future는 미완료로 남음)
    pub async fn get_or_timeout(&self, timeout: Duration) -> Option<Response> {
        tokio::time::timeout(timeout, self.get()).await.ok()
    }

    /// 현재 스레드를 막고 완료까지 대기
    ///
    /// 비동기 런타임 워커 스레드에서 호출하면 안 됩니다.
    pub fn blocking_get(&self) -> Response {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(response) = &state.response {
                return response.clone();
            }
            self.inner.condvar.wait(&mut state);
        }
    }

    /// 현재 스레드를 막고 완료 또는 타임아웃까지 대기
    pub fn blocking_get_timeout(&self, timeout: Duration) -> Option<Response> {
        let mut state = self.inner.state.lock();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(response) = &state.response {
                return Some(response.clone());
            }
            if self.inner.condvar.wait_until(&mut state, deadline).timed_out() {
                return state.response.clone();
            }
        }
    }

    fn item_at(&self, cursor: usize) -> (Option<Value>, Option<Response>) {
        let state = self.inner.state.lock();
        match state.items.get(cursor) {
            Some(item) => (Some(item.clone()), None),
            None => (None, state.response.clone()),
        }
    }
}

impl fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFuture")
            .field("request_id", &self.inner.request_id)
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// 응답을 에러로 변환 (성공이면 `None`)
pub(crate) fn response_error(response: &Response) -> Option<DriverError> {
    match &response.origin {
        ResponseOrigin::Transport(reason) => Some(DriverError::transport(reason.clone())),
        ResponseOrigin::Malformed(reason) => Some(DriverError::MalformedFrame(reason.clone())),
        ResponseOrigin::Server if response.class().is_success() => None,
        ResponseOrigin::Server => Some(DriverError::application(
            response.code(),
            response.status.message.clone(),
        )),
    }
}

fn into_results(response: &Response) -> DriverResult<Vec<GraphResult>> {
    match response_error(response) {
        Some(err) => Err(err),
        None => Ok(response.items().into_iter().map(GraphResult::new).collect()),
    }
}

// ============================================================================
// ResultSetFuture - 결과 집계 future
// ============================================================================

/// partial 응답을 모아 결과 목록으로 돌려주는 future
#[derive(Debug, Clone)]
pub struct ResultSetFuture {
    future: ResponseFuture,
}

impl ResultSetFuture {
    /// future 감싸기
    pub fn new(future: ResponseFuture) -> Self {
        Self { future }
    }

    /// 요청 ID
    pub fn request_id(&self) -> &str {
        self.future.request_id()
    }

    /// 완료 여부
    pub fn is_completed(&self) -> bool {
        self.future.is_completed()
    }

    /// 내부 응답 future
    pub fn response_future(&self) -> &ResponseFuture {
        &self.future
    }

    /// 결과 목록 대기
    pub async fn get_results(&self) -> DriverResult<Vec<GraphResult>> {
        into_results(&self.future.get().await)
    }

    /// 타임아웃 안에 결과 목록 대기
    pub async fn get_results_timeout(&self, timeout: Duration) -> DriverResult<Vec<GraphResult>> {
        match self.future.get_or_timeout(timeout).await {
            Some(response) => into_results(&response),
            None => Err(DriverError::timeout(format!(
                "no response for request {} within {:?}",
                self.request_id(),
                timeout
            ))),
        }
    }

    /// 컨텍스트 데드라인/취소까지 결과 목록 대기
    pub async fn get_results_in(&self, ctx: &Context) -> DriverResult<Vec<GraphResult>> {
        tokio::select! {
            response = self.future.get() => into_results(&response),
            _ = ctx.cancelled() => Err(DriverError::Cancelled),
            _ = ctx.expired() => Err(DriverError::timeout(format!(
                "context deadline exceeded waiting for request {}",
                self.request_id()
            ))),
        }
    }

    /// 현재 스레드를 막고 결과 목록 대기
    pub fn blocking_get_results(&self) -> DriverResult<Vec<GraphResult>> {
        into_results(&self.future.blocking_get())
    }

    /// 도착하는 대로 결과를 내보내는 스트림
    ///
    /// 실패 응답이면 그때까지 받은 항목 뒤에 에러 하나를 내보내고 끝납니다.
    pub fn into_stream(self) -> impl Stream<Item = DriverResult<GraphResult>> + Send + 'static {
        let rx = self.future.inner.version.subscribe();
        stream::unfold(Some((self.future, rx, 0usize)), |state| async move {
            let (future, mut rx, cursor) = state?;
            loop {
                match future.item_at(cursor) {
                    (Some(item), _) => {
                        return Some((Ok(GraphResult::new(item)), Some((future, rx, cursor + 1))));
                    }
                    (None, Some(response)) => {
                        return response_error(&response).map(|err| (Err(err), None));
                    }
                    (None, None) => {
                        let _ = rx.changed().await;
                    }
                }
            }
        })
    }
}
