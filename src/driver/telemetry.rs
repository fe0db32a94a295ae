//! Telemetry
//!
//! 타이밍/카운터/스팬 방출 인터페이스

use std::time::Duration;

use tracing::Span;

/// 스팬 태그
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanInfo {
    /// 스팬 이름 (`gdb:<operation>`)
    pub name: String,
    /// 서버 호스트
    pub instance: String,
    /// 사용자
    pub user: String,
    /// 스크립트
    pub statement: String,
}

/// 진행 중인 스팬
pub trait SpanHandle: Send {
    /// 스팬 종료 (`error`가 있으면 실패로 표시)
    fn finish(self: Box<Self>, error: Option<String>);
}

/// 타이밍/카운터/스팬 방출기
pub trait Telemetry: Send + Sync {
    /// 소요 시간 기록
    fn timing(&self, key: &str, elapsed: Duration);

    /// 카운터 증가
    fn incr(&self, name: &str, label: &str);

    /// 스팬 시작
    fn start_span(&self, info: SpanInfo) -> Box<dyn SpanHandle>;
}

/// 스크립트 분류 (스팬 이름용)
pub fn classify_operation(script: &str) -> &'static str {
    if script.is_empty() {
        "none"
    } else if script.contains(".drop()") {
        "delete"
    } else if script.contains(".addE") || script.contains(".addV") || script.contains(".property") {
        "create/update"
    } else {
        "query"
    }
}

// ============================================================================
// NoopTelemetry
// ============================================================================

/// 아무것도 방출하지 않음
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

struct NoopSpan;

impl SpanHandle for NoopSpan {
    fn finish(self: Box<Self>, _error: Option<String>) {}
}

impl Telemetry for NoopTelemetry {
    fn timing(&self, _key: &str, _elapsed: Duration) {}

    fn incr(&self, _name: &str, _label: &str) {}

    fn start_span(&self, _info: SpanInfo) -> Box<dyn SpanHandle> {
        Box::new(NoopSpan)
    }
}

// ============================================================================
// TracingTelemetry
// ============================================================================

/// `tracing` 이벤트/스팬으로 방출
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

struct TracingSpan {
    span: Span,
}

impl SpanHandle for TracingSpan {
    fn finish(self: Box<Self>, error: Option<String>) {
        if let Some(error) = error {
            self.span.record("error", true);
            self.span.in_scope(|| tracing::warn!(%error, "rt.RoundTrip"));
        }
    }
}

impl Telemetry for TracingTelemetry {
    fn timing(&self, key: &str, elapsed: Duration) {
        tracing::debug!(target: "gdb_driver::stats", key, elapsed_ms = elapsed.as_millis() as u64, "timing");
    }

    fn incr(&self, name: &str, label: &str) {
        tracing::debug!(target: "gdb_driver::stats", name, label, "incr");
    }

    fn start_span(&self, info: SpanInfo) -> Box<dyn SpanHandle> {
        let span = tracing::info_span!(
            "gdb",
            otel.name = %info.name,
            component = "database/gdb",
            span.kind = "client",
            db.instance = %info.instance,
            db.user = %info.user,
            db.system = "gremlin",
            db.statement = %info.statement,
            error = tracing::field::Empty,
        );
        Box::new(TracingSpan { span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_operation() {
        assert_eq!(classify_operation(""), "none");
        assert_eq!(classify_operation("g.V(1).drop()"), "delete");
        assert_eq!(classify_operation("g.addV('person')"), "create/update");
        assert_eq!(classify_operation("g.V(1).property('a', 1)"), "create/update");
        assert_eq!(classify_operation("g.V().count()"), "query");
    }

    #[test]
    fn test_tracing_span_finish_without_subscriber() {
        let telemetry = TracingTelemetry;
        let span = telemetry.start_span(SpanInfo {
            name: "gdb:query".into(),
            instance: "localhost".into(),
            user: String::new(),
            statement: "g.V()".into(),
        });
        span.finish(Some("boom".into()));
        telemetry.timing("gremlin:g.V()", Duration::from_millis(3));
        telemetry.incr("gdb:submit", "breaker");
    }
}
