//! Frame codec.
//!
//! Request frames are `<mime length byte><mime type><JSON body>`; response
//! frames are the bare JSON body.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value as Json;

use super::error::{GraphsonError, GraphsonResult};
use super::message::{Request, Response};

/// GraphSON v3 MIME type.
pub const GRAPHSON_V3_MIME: &str = "application/vnd.gremlin-v3.0+json";

/// Serializes a request into a binary frame.
///
/// Output is deterministic: argument keys are written in sorted order.
pub fn serialize_request(request: &Request) -> GraphsonResult<Bytes> {
    let body = serde_json::to_vec(&request.to_json())?;
    let mut buf = BytesMut::with_capacity(1 + GRAPHSON_V3_MIME.len() + body.len());
    buf.put_u8(GRAPHSON_V3_MIME.len() as u8);
    buf.put_slice(GRAPHSON_V3_MIME.as_bytes());
    buf.put_slice(&body);
    Ok(buf.freeze())
}

/// Parses a response frame.
pub fn deserialize_response(frame: &[u8]) -> GraphsonResult<Response> {
    let json: Json = serde_json::from_slice(frame)
        .map_err(|e| GraphsonError::MalformedFrame(e.to_string()))?;
    Response::from_json(&json)
}

/// Best-effort request id of a frame that failed to deserialize.
pub fn peek_request_id(frame: &[u8]) -> Option<String> {
    let json: Json = serde_json::from_slice(frame).ok()?;
    json.get("requestId")?.as_str().map(str::to_string)
}

/// Splits a serialized request back into its MIME type and JSON body.
pub fn split_request_frame(frame: &[u8]) -> GraphsonResult<(&str, Json)> {
    let (&len, rest) = frame
        .split_first()
        .ok_or_else(|| GraphsonError::MalformedFrame("empty frame".into()))?;
    let len = len as usize;
    if rest.len() < len {
        return Err(GraphsonError::MalformedFrame("truncated mime type".into()));
    }
    let mime = std::str::from_utf8(&rest[..len])
        .map_err(|e| GraphsonError::MalformedFrame(e.to_string()))?;
    let body = serde_json::from_slice(&rest[len..])
        .map_err(|e| GraphsonError::MalformedFrame(e.to_string()))?;
    Ok((mime, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphson::message::{make_request, RequestOptions};

    #[test]
    fn test_frame_prefix() {
        let req = make_request("g.V()", None, None, None).unwrap();
        let frame = serialize_request(&req).unwrap();

        assert_eq!(frame[0], b'!');
        assert!(frame[1..].starts_with(GRAPHSON_V3_MIME.as_bytes()));
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let opts = RequestOptions::with_bindings([("b", 2i64), ("a", 1i64)]).request_id("fixed");
        let req = make_request("g.V(a)", Some(&opts), None, None).unwrap();

        let first = serialize_request(&req).unwrap();
        let second = serialize_request(&req).unwrap();
        assert_eq!(first, second);

        let (mime, body) = split_request_frame(&first).unwrap();
        assert_eq!(mime, GRAPHSON_V3_MIME);
        assert_eq!(body["requestId"], "fixed");
        assert_eq!(body["op"], "eval");
        assert_eq!(body["processor"], "");
        assert_eq!(body["args"]["gremlin"], "g.V(a)");
        assert_eq!(
            body["args"]["bindings"]["@value"],
            serde_json::json!(["a", {"@type": "g:Int64", "@value": 1}, "b", {"@type": "g:Int64", "@value": 2}])
        );
    }

    #[test]
    fn test_deserialize_malformed() {
        let err = deserialize_response(b"not json").unwrap_err();
        assert!(matches!(err, GraphsonError::MalformedFrame(_)));
        assert_eq!(peek_request_id(b"not json"), None);

        let frame = br#"{"requestId":"r-1","status":{}}"#;
        assert!(deserialize_response(frame).is_err());
        assert_eq!(peek_request_id(frame), Some("r-1".to_string()));
    }

    #[test]
    fn test_deserialize_response() {
        let frame = br#"{"requestId":"r-1","status":{"code":204,"message":""},"result":{"data":null}}"#;
        let resp = deserialize_response(frame).unwrap();
        assert_eq!(resp.request_id, "r-1");
        assert_eq!(resp.code(), 204);
    }
}
