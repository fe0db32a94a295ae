//! Response messages.

use std::fmt;

use serde_json::Value as Json;

use crate::graph::Value;
use crate::graphson::decoder;
use crate::graphson::error::{GraphsonError, GraphsonResult};

/// Status codes the client treats specially.
pub struct ResponseStatusCode;

impl ResponseStatusCode {
    /// Terminal success
    pub const SUCCESS: u16 = 200;
    /// Terminal success without data
    pub const NO_CONTENT: u16 = 204;
    /// Partial content, more frames follow
    pub const PARTIAL_CONTENT: u16 = 206;
    /// Terminal success without data (GDB variant)
    pub const NO_CONTENT_GDB: u16 = 299;
    /// Unauthorized
    pub const UNAUTHORIZED: u16 = 401;
    /// Authentication challenge
    pub const AUTHENTICATE: u16 = 407;
    /// Malformed request
    pub const MALFORMED_REQUEST: u16 = 498;
    /// Invalid request arguments
    pub const INVALID_REQUEST_ARGUMENTS: u16 = 499;
    /// Server error
    pub const SERVER_ERROR: u16 = 500;
    /// Script evaluation error
    pub const SCRIPT_EVALUATION_ERROR: u16 = 597;
    /// Server timeout
    pub const SERVER_TIMEOUT: u16 = 598;
    /// Serialization error on the server
    pub const SERVER_SERIALIZATION_ERROR: u16 = 599;
}

/// Classification of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Terminal success with data
    Success,
    /// Terminal success without data
    NoContent,
    /// Non-terminal, more frames follow
    Partial,
    /// Server requests credentials
    Authenticate,
    /// Terminal failure
    Failure,
}

impl StatusClass {
    /// Classifies a status code. Unknown 2xx codes are terminal successes,
    /// everything else outside 2xx is a terminal failure.
    pub fn of(code: u16) -> Self {
        match code {
            ResponseStatusCode::PARTIAL_CONTENT => StatusClass::Partial,
            ResponseStatusCode::NO_CONTENT | ResponseStatusCode::NO_CONTENT_GDB => StatusClass::NoContent,
            ResponseStatusCode::AUTHENTICATE => StatusClass::Authenticate,
            200..=299 => StatusClass::Success,
            _ => StatusClass::Failure,
        }
    }

    /// Whether no further frames follow.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusClass::Partial | StatusClass::Authenticate)
    }

    /// Whether the class is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, StatusClass::Success | StatusClass::NoContent | StatusClass::Partial)
    }
}

/// Where a response came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOrigin {
    /// Decoded from a server frame
    Server,
    /// Synthesized because the connection failed
    Transport(String),
    /// Synthesized because the server frame could not be decoded
    Malformed(String),
}

/// Response status block.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseStatus {
    /// Status code
    pub code: u16,
    /// Server message
    pub message: String,
    /// Status attributes
    pub attributes: Value,
}

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Request id this frame answers; empty when the server sent none
    pub request_id: String,
    /// Status
    pub status: ResponseStatus,
    /// Result data
    pub data: Value,
    /// Result meta
    pub meta: Value,
    /// Origin
    pub origin: ResponseOrigin,
}

impl Response {
    /// Status code.
    pub fn code(&self) -> u16 {
        self.status.code
    }

    /// Status class.
    pub fn class(&self) -> StatusClass {
        match self.origin {
            ResponseOrigin::Server => StatusClass::of(self.status.code),
            _ => StatusClass::Failure,
        }
    }

    /// Result items. A list payload yields its elements, null yields none,
    /// anything else is a single item.
    pub fn items(&self) -> Vec<Value> {
        match &self.data {
            Value::Null => Vec::new(),
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    /// Response standing in for a request whose connection failed.
    pub fn transport_failure(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::synthesized(request_id.into(), reason.clone(), ResponseOrigin::Transport(reason))
    }

    /// Response standing in for a frame that could not be decoded.
    pub fn malformed(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::synthesized(request_id.into(), reason.clone(), ResponseOrigin::Malformed(reason))
    }

    fn synthesized(request_id: String, message: String, origin: ResponseOrigin) -> Self {
        Self {
            request_id,
            status: ResponseStatus {
                code: 0,
                message,
                attributes: Value::Null,
            },
            data: Value::Null,
            meta: Value::Null,
            origin,
        }
    }

    /// Parses a response body.
    pub fn from_json(json: &Json) -> GraphsonResult<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| GraphsonError::MalformedFrame("response is not an object".into()))?;

        let request_id = match obj.get("requestId") {
            None | Some(Json::Null) => String::new(),
            Some(Json::String(s)) => s.clone(),
            Some(other) => match decoder::decode(other)? {
                Value::Uuid(u) => u.to_string(),
                Value::String(s) => s,
                v => {
                    return Err(GraphsonError::MalformedFrame(format!(
                        "unexpected requestId {}",
                        v
                    )))
                }
            },
        };

        let status = obj
            .get("status")
            .and_then(Json::as_object)
            .ok_or_else(|| GraphsonError::MalformedFrame("missing status".into()))?;
        let code = status
            .get("code")
            .and_then(Json::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .ok_or_else(|| GraphsonError::MalformedFrame("missing status code".into()))?;
        let message = status
            .get("message")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string();
        let attributes = decoder::decode(status.get("attributes").unwrap_or(&Json::Null))?;

        let (data, meta) = match obj.get("result").and_then(Json::as_object) {
            Some(result) => (
                decoder::decode(result.get("data").unwrap_or(&Json::Null))?,
                decoder::decode(result.get("meta").unwrap_or(&Json::Null))?,
            ),
            None => (Value::Null, Value::Null),
        };

        Ok(Self {
            request_id,
            status: ResponseStatus {
                code,
                message,
                attributes,
            },
            data,
            meta,
            origin: ResponseOrigin::Server,
        })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Response[{}] {} {}", self.request_id, self.status.code, self.status.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classes() {
        assert_eq!(StatusClass::of(200), StatusClass::Success);
        assert_eq!(StatusClass::of(206), StatusClass::Partial);
        assert_eq!(StatusClass::of(204), StatusClass::NoContent);
        assert_eq!(StatusClass::of(299), StatusClass::NoContent);
        assert_eq!(StatusClass::of(250), StatusClass::Success);
        assert_eq!(StatusClass::of(407), StatusClass::Authenticate);
        assert_eq!(StatusClass::of(597), StatusClass::Failure);
        assert!(!StatusClass::of(206).is_terminal());
        assert!(StatusClass::of(500).is_terminal());
    }

    #[test]
    fn test_from_json() {
        let resp = Response::from_json(&json!({
            "requestId": "abc",
            "status": {"code": 200, "message": "", "attributes": {"@type": "g:Map", "@value": []}},
            "result": {"data": {"@type": "g:List", "@value": [{"@type": "g:Int64", "@value": 6}]},
                       "meta": {"@type": "g:Map", "@value": []}}
        }))
        .unwrap();

        assert_eq!(resp.request_id, "abc");
        assert_eq!(resp.code(), 200);
        assert_eq!(resp.items(), vec![Value::Int64(6)]);
        assert_eq!(resp.origin, ResponseOrigin::Server);
    }

    #[test]
    fn test_null_request_id_and_data() {
        let resp = Response::from_json(&json!({
            "requestId": null,
            "status": {"code": 500, "message": "boom"},
            "result": {"data": null}
        }))
        .unwrap();
        assert_eq!(resp.request_id, "");
        assert!(resp.items().is_empty());
        assert_eq!(resp.class(), StatusClass::Failure);
    }

    #[test]
    fn test_missing_status_is_malformed() {
        let err = Response::from_json(&json!({"requestId": "x"})).unwrap_err();
        assert!(matches!(err, GraphsonError::MalformedFrame(_)));
    }

    #[test]
    fn test_transport_failure_is_failure() {
        let resp = Response::transport_failure("r", "closed");
        assert_eq!(resp.class(), StatusClass::Failure);
        assert_eq!(resp.origin, ResponseOrigin::Transport("closed".into()));
    }
}
