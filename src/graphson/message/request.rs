//! Request messages.
//!
//! `eval`, `authentication` and `close` requests, plus the options and
//! session context that shape an `eval`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::graph::Value;
use crate::graphson::encoder;
use crate::graphson::error::{GraphsonError, GraphsonResult};

/// Script body.
pub const ARGS_GREMLIN: &str = "gremlin";
/// Script language.
pub const ARGS_LANGUAGE: &str = "language";
/// Named script parameters.
pub const ARGS_BINDINGS: &str = "bindings";
/// Server-side evaluation timeout in milliseconds.
pub const ARGS_SCRIPT_EVAL_TIMEOUT: &str = "scriptEvaluationTimeout";
/// Session id.
pub const ARGS_SESSION: &str = "session";
/// Let the server commit/rollback per request within a session.
pub const ARGS_MANAGE_TRANSACTION: &str = "manageTransaction";
/// Base64 SASL credential blob.
pub const ARGS_SASL: &str = "sasl";

/// Script language tag sent with every `eval`.
pub const GREMLIN_LANGUAGE: &str = "gremlin-groovy";

/// Script sent to close a session.
pub const CLOSE_SESSION_SCRIPT: &str = "session.close()";

/// Request operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Evaluate a script
    Eval,
    /// Answer an authentication challenge
    Authentication,
    /// Close a session
    Close,
}

impl Op {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eval => "eval",
            Op::Authentication => "authentication",
            Op::Close => "close",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side op processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Processor {
    /// Session-less processor
    #[default]
    Standard,
    /// Session processor
    Session,
    /// Traversal processor
    Traversal,
}

impl Processor {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Processor::Standard => "",
            Processor::Session => "session",
            Processor::Traversal => "traversal",
        }
    }
}

/// A request frame body.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Request id, unique among in-flight requests on a connection
    pub request_id: String,
    /// Operation
    pub op: Op,
    /// Op processor
    pub processor: Processor,
    /// Arguments, ordered by key
    pub args: BTreeMap<String, Value>,
}

impl Request {
    /// Script carried by this request, if any.
    pub fn gremlin(&self) -> Option<&str> {
        self.args.get(ARGS_GREMLIN).and_then(Value::as_str)
    }

    /// Session id carried by this request, if any.
    pub fn session(&self) -> Option<&str> {
        self.args.get(ARGS_SESSION).and_then(Value::as_str)
    }

    /// Evaluation timeout argument, if set.
    pub fn eval_timeout(&self) -> Option<Duration> {
        self.args
            .get(ARGS_SCRIPT_EVAL_TIMEOUT)
            .and_then(Value::as_i64)
            .map(|ms| Duration::from_millis(ms as u64))
    }

    /// JSON body. Argument values are GraphSON-typed; keys are sorted.
    pub fn to_json(&self) -> Json {
        let mut args = Map::new();
        for (key, value) in &self.args {
            args.insert(key.clone(), encoder::encode(value));
        }
        let mut body = Map::new();
        body.insert("requestId".into(), Json::String(self.request_id.clone()));
        body.insert("op".into(), Json::String(self.op.as_str().into()));
        body.insert("processor".into(), Json::String(self.processor.as_str().into()));
        body.insert("args".into(), Json::Object(args));
        Json::Object(body)
    }
}

/// Session stamped onto every request of a session client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Session id
    pub session_id: String,
    /// Server-managed transactions
    pub manage_transaction: bool,
}

impl SessionContext {
    /// Creates a session context.
    pub fn new(session_id: impl Into<String>, manage_transaction: bool) -> Self {
        Self {
            session_id: session_id.into(),
            manage_transaction,
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    request_id: Option<String>,
    timeout: Option<Duration>,
    bindings: Option<BTreeMap<String, Value>>,
    args: BTreeMap<String, Value>,
}

impl RequestOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying script bindings.
    pub fn with_bindings<K, V, I>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new().bindings(bindings)
    }

    /// Sets script bindings.
    pub fn bindings<K, V, I>(mut self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.bindings = Some(
            bindings
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Overrides the generated request id.
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Sets the evaluation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a raw argument.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Overriding request id, if any.
    pub fn get_request_id(&self) -> Option<&str> {
        self.request_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Configured timeout, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Bindings, if any.
    pub fn get_bindings(&self) -> Option<&BTreeMap<String, Value>> {
        self.bindings.as_ref()
    }

    /// Extra arguments.
    pub fn get_args(&self) -> &BTreeMap<String, Value> {
        &self.args
    }
}

/// Generates a fresh request id.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builds an `eval` request.
///
/// The evaluation timeout is the smaller of the time left before `deadline`
/// and the configured option, and is only sent when positive. A `session`
/// context, or a `session` extra argument, selects the session processor.
pub fn make_request(
    script: &str,
    options: Option<&RequestOptions>,
    session: Option<&SessionContext>,
    deadline: Option<Instant>,
) -> GraphsonResult<Request> {
    let request_id = options
        .and_then(RequestOptions::get_request_id)
        .map(str::to_string)
        .unwrap_or_else(new_request_id);

    let mut args = BTreeMap::new();
    args.insert(ARGS_GREMLIN.to_string(), Value::from(script));
    args.insert(ARGS_LANGUAGE.to_string(), Value::from(GREMLIN_LANGUAGE));

    let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
    let timeout = match (remaining, options.and_then(RequestOptions::get_timeout)) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    if let Some(timeout) = timeout {
        let millis = timeout.as_millis() as i64;
        if millis > 0 {
            args.insert(ARGS_SCRIPT_EVAL_TIMEOUT.to_string(), Value::Int64(millis));
        }
    }

    let mut processor = Processor::Standard;
    if let Some(options) = options {
        if let Some(bindings) = options.get_bindings() {
            args.insert(ARGS_BINDINGS.to_string(), Value::from(bindings.clone()));
        }
        for (key, value) in options.get_args() {
            if key == ARGS_GREMLIN || key == ARGS_LANGUAGE {
                return Err(GraphsonError::InvalidRequest(format!(
                    "argument '{}' is reserved",
                    key
                )));
            }
            if key == ARGS_SESSION {
                processor = Processor::Session;
            }
            args.insert(key.clone(), value.clone());
        }
    }

    if let Some(session) = session {
        args.insert(ARGS_SESSION.to_string(), Value::from(session.session_id.as_str()));
        args.insert(
            ARGS_MANAGE_TRANSACTION.to_string(),
            Value::Bool(session.manage_transaction),
        );
        processor = Processor::Session;
    }

    Ok(Request {
        request_id,
        op: Op::Eval,
        processor,
        args,
    })
}

/// Builds the answer to an authentication challenge for `request_id`.
///
/// The SASL blob is `\0username\0password`, base64-encoded.
pub fn make_auth_request(request_id: &str, username: &str, password: &str) -> Request {
    let mut blob = Vec::with_capacity(username.len() + password.len() + 2);
    blob.push(0);
    blob.extend_from_slice(username.as_bytes());
    blob.push(0);
    blob.extend_from_slice(password.as_bytes());

    let mut args = BTreeMap::new();
    args.insert(ARGS_SASL.to_string(), Value::String(STANDARD.encode(blob)));

    Request {
        request_id: request_id.to_string(),
        op: Op::Authentication,
        processor: Processor::Traversal,
        args,
    }
}

/// Builds a session `close` request.
pub fn make_close_session_request(session_id: &str) -> Request {
    let mut args = BTreeMap::new();
    args.insert(ARGS_SESSION.to_string(), Value::from(session_id));
    args.insert(ARGS_GREMLIN.to_string(), Value::from(CLOSE_SESSION_SCRIPT));

    Request {
        request_id: new_request_id(),
        op: Op::Close,
        processor: Processor::Session,
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_request_defaults() {
        let req = make_request("g.V().count()", None, None, None).unwrap();

        assert_eq!(req.op, Op::Eval);
        assert_eq!(req.processor, Processor::Standard);
        assert_eq!(req.gremlin(), Some("g.V().count()"));
        assert_eq!(req.args.get(ARGS_LANGUAGE).and_then(Value::as_str), Some(GREMLIN_LANGUAGE));
        assert!(req.eval_timeout().is_none());
        assert!(Uuid::parse_str(&req.request_id).is_ok());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = make_request("1", None, None, None).unwrap();
        let b = make_request("1", None, None, None).unwrap();
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_override_request_id() {
        let opts = RequestOptions::new().request_id("fixed-id");
        let req = make_request("1", Some(&opts), None, None).unwrap();
        assert_eq!(req.request_id, "fixed-id");

        let blank = RequestOptions::new().request_id("");
        let req = make_request("1", Some(&blank), None, None).unwrap();
        assert_ne!(req.request_id, "");
    }

    #[test]
    fn test_deadline_wins_when_smaller() {
        let opts = RequestOptions::new().timeout(Duration::from_millis(3000));
        let deadline = Instant::now() + Duration::from_millis(500);
        let req = make_request("1", Some(&opts), None, Some(deadline)).unwrap();

        let timeout = req.eval_timeout().unwrap();
        assert!(timeout <= Duration::from_millis(500));
        assert!(timeout > Duration::from_millis(400));
    }

    #[test]
    fn test_configured_timeout_wins_when_smaller() {
        let opts = RequestOptions::new().timeout(Duration::from_millis(200));
        let deadline = Instant::now() + Duration::from_secs(10);
        let req = make_request("1", Some(&opts), None, Some(deadline)).unwrap();
        assert_eq!(req.eval_timeout(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_expired_deadline_sends_no_timeout() {
        let opts = RequestOptions::new().timeout(Duration::from_millis(3000));
        let deadline = Instant::now() - Duration::from_millis(1);
        let req = make_request("1", Some(&opts), None, Some(deadline)).unwrap();
        assert!(req.eval_timeout().is_none());
    }

    #[test]
    fn test_session_context_selects_session_processor() {
        let session = SessionContext::new("s-1", true);
        let req = make_request("1", None, Some(&session), None).unwrap();

        assert_eq!(req.processor, Processor::Session);
        assert_eq!(req.session(), Some("s-1"));
        assert_eq!(req.args.get(ARGS_MANAGE_TRANSACTION), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_session_extra_arg_selects_session_processor() {
        let opts = RequestOptions::new().arg(ARGS_SESSION, "s-2");
        let req = make_request("1", Some(&opts), None, None).unwrap();
        assert_eq!(req.processor, Processor::Session);
    }

    #[test]
    fn test_bindings_and_reserved_args() {
        let opts = RequestOptions::with_bindings([("name", "marko")]).arg("batchSize", 64);
        let req = make_request("g.V().has('name', name)", Some(&opts), None, None).unwrap();
        assert_eq!(
            req.args.get(ARGS_BINDINGS).and_then(|b| b.get("name")).and_then(Value::as_str),
            Some("marko")
        );
        assert_eq!(req.args.get("batchSize"), Some(&Value::Int32(64)));

        let bad = RequestOptions::new().arg(ARGS_GREMLIN, "g.V().drop()");
        assert!(make_request("1", Some(&bad), None, None).is_err());
    }

    #[test]
    fn test_auth_request() {
        let req = make_auth_request("r-1", "user", "pass");
        assert_eq!(req.request_id, "r-1");
        assert_eq!(req.op, Op::Authentication);
        assert_eq!(req.processor, Processor::Traversal);

        let sasl = req.args.get(ARGS_SASL).and_then(Value::as_str).unwrap();
        assert_eq!(STANDARD.decode(sasl).unwrap(), b"\0user\0pass");
    }

    #[test]
    fn test_close_session_request() {
        let req = make_close_session_request("s-9");
        assert_eq!(req.op, Op::Close);
        assert_eq!(req.processor, Processor::Session);
        assert_eq!(req.session(), Some("s-9"));
        assert_eq!(req.gremlin(), Some(CLOSE_SESSION_SCRIPT));
    }
}
