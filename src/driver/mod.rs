//! Driver Module
//!
//! 클라이언트 SDK (Gremlin 클라이언트)
//!
//! # Components
//!
//! - 설정: [`Settings`], [`SettingsBuilder`], [`Context`]
//! - 연결: [`Connection`], [`ConnectionPool`], [`Dialer`], [`WebSocketDialer`]
//! - 응답: [`ResponseFuture`], [`ResultSetFuture`], [`GraphResult`]
//! - 클라이언트: [`Client`], [`SessionClient`], [`ClientShell`]
//! - 승인/관측: [`Breaker`], [`CircuitBreaker`], [`Telemetry`]
//!
//! # Example
//!
//! ```ignore
//! use gdb_driver::bindings;
//! use gdb_driver::driver::{Client, ClientShell, Context, SessionClient, Settings};
//!
//! // 세션 없는 클라이언트
//! let client = Client::connect(Settings::new("localhost", 8182)).await?;
//! let ctx = Context::with_timeout(std::time::Duration::from_secs(3));
//!
//! let results = client
//!     .submit_script_bound(&ctx, "g.V().has('name', name)", bindings! { "name" => "marko" })
//!     .await?;
//! for result in results {
//!     println!("{}", result.get_vertex()?.label());
//! }
//!
//! // 세션 트랜잭션
//! let session = SessionClient::connect("batch-1", Settings::new("localhost", 8182)).await?;
//! session
//!     .batch_submit(&ctx, |ctx, shell| async move {
//!         shell.submit_script(&ctx, "g.addV('person')").await?;
//!         Ok(())
//!     })
//!     .await?;
//!
//! session.close(&ctx).await?;
//! client.close(&ctx).await?;
//! ```

mod breaker;
mod client;
mod connection;
mod context;
mod error;
mod future;
mod pool;
mod result;
mod session;
mod settings;
mod telemetry;
mod transaction;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use breaker::{Breaker, BreakerConfig, BreakerState, CircuitBreaker, NoopBreaker};
pub use client::{Client, ClientBuilder, ClientShell};
pub use connection::{Connection, ConnectionState};
pub use context::Context;
pub use error::{DriverError, DriverResult};
pub use future::{ResponseFuture, ResultSetFuture};
pub use pool::{ConnectionPool, PoolConfig, PoolMetrics, PooledConnection};
pub use result::GraphResult;
pub use session::{SessionClient, SessionShell};
pub use settings::{ServerAddress, Settings, SettingsBuilder, DEFAULT_PATH, DEFAULT_PORT};
pub use telemetry::{
    classify_operation, NoopTelemetry, SpanHandle, SpanInfo, Telemetry, TracingTelemetry,
};
pub use transaction::TransactionState;
pub use transport::{DialConfig, Dialer, Frame, FrameChannel, FrameSink, FrameStream, WebSocketDialer};

/// 바인딩 맵 생성 매크로
///
/// ```
/// use gdb_driver::bindings;
///
/// let bindings = bindings! { "name" => "marko", "limit" => 10i32 };
/// assert_eq!(bindings.len(), 2);
/// ```
#[macro_export]
macro_rules! bindings {
    () => {
        std::collections::HashMap::<String, $crate::graph::Value>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = std::collections::HashMap::<String, $crate::graph::Value>::new();
        $(
            map.insert(String::from($key), $crate::graph::Value::from($value));
        )+
        map
    }};
}
