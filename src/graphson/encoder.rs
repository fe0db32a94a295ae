//! GraphSON v3 encoder.
//!
//! Turns [`Value`]s into typed GraphSON JSON (`{"@type": .., "@value": ..}`).
//! Strings, booleans and null are written untyped, as GraphSON v3 requires.

use serde_json::{json, Value as Json};

use crate::graph::{Element, Value};

/// Wraps a JSON payload with a GraphSON type tag.
pub fn typed(type_name: &str, value: Json) -> Json {
    json!({ "@type": type_name, "@value": value })
}

fn encode_double(type_name: &str, v: f64) -> Json {
    if v.is_nan() {
        typed(type_name, Json::from("NaN"))
    } else if v.is_infinite() {
        let name = if v > 0.0 { "Infinity" } else { "-Infinity" };
        typed(type_name, Json::from(name))
    } else {
        typed(type_name, json!(v))
    }
}

fn encode_list(values: &[Value]) -> Json {
    Json::Array(values.iter().map(encode).collect())
}

/// Encodes a value as GraphSON v3.
pub fn encode(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::String(s) => Json::String(s.clone()),
        Value::Int32(i) => typed("g:Int32", json!(i)),
        Value::Int64(i) => typed("g:Int64", json!(i)),
        Value::Float(f) => encode_double("g:Float", *f as f64),
        Value::Double(f) => encode_double("g:Double", *f),
        Value::Uuid(u) => typed("g:UUID", Json::String(u.to_string())),
        Value::Date(d) => typed("g:Date", json!(d.timestamp_millis())),
        Value::Timestamp(d) => typed("g:Timestamp", json!(d.timestamp_millis())),
        Value::List(items) => typed("g:List", encode_list(items)),
        Value::Set(items) => typed("g:Set", encode_list(items)),
        Value::Map(entries) => {
            let flat = entries
                .iter()
                .flat_map(|(k, v)| [encode(k), encode(v)])
                .collect();
            typed("g:Map", Json::Array(flat))
        }
        Value::T(t) => typed("g:T", Json::String(t.clone())),
        Value::Direction(d) => typed("g:Direction", Json::String(d.as_str().to_string())),
        Value::Vertex(v) => typed(
            "g:Vertex",
            json!({ "id": encode(v.id()), "label": v.label() }),
        ),
        Value::Edge(e) => typed(
            "g:Edge",
            json!({
                "id": encode(e.id()),
                "label": e.label(),
                "outV": encode(e.out_vertex().id()),
                "outVLabel": e.out_vertex().label(),
                "inV": encode(e.in_vertex().id()),
                "inVLabel": e.in_vertex().label(),
            }),
        ),
        Value::VertexProperty(p) => typed(
            "g:VertexProperty",
            json!({ "id": encode(p.id()), "label": p.label(), "value": encode(p.value()) }),
        ),
        Value::Property(p) => typed(
            "g:Property",
            json!({ "key": p.key(), "value": encode(p.value()) }),
        ),
        Value::Path(p) => {
            let labels = p
                .labels()
                .iter()
                .map(|step| typed("g:Set", json!(step)))
                .collect();
            typed(
                "g:Path",
                json!({
                    "labels": typed("g:List", Json::Array(labels)),
                    "objects": typed("g:List", encode_list(p.objects())),
                }),
            )
        }
        Value::BulkSet(b) => {
            let flat = b
                .iter()
                .flat_map(|(v, bulk)| [encode(v), typed("g:Int64", json!(bulk))])
                .collect();
            typed("g:BulkSet", Json::Array(flat))
        }
        Value::Traverser(t) => typed(
            "g:Traverser",
            json!({ "bulk": typed("g:Int64", json!(t.bulk)), "value": encode(&t.value) }),
        ),
        Value::Typed { type_name, value } => typed(type_name, value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(encode(&Value::Null), Json::Null);
        assert_eq!(encode(&Value::from("x")), json!("x"));
        assert_eq!(encode(&Value::Int32(5)), json!({"@type": "g:Int32", "@value": 5}));
        assert_eq!(encode(&Value::Int64(5)), json!({"@type": "g:Int64", "@value": 5}));
        assert_eq!(
            encode(&Value::Double(f64::NAN)),
            json!({"@type": "g:Double", "@value": "NaN"})
        );
    }

    #[test]
    fn test_map_is_flattened() {
        let map = Value::Map(vec![(Value::from("age"), Value::Int32(29))]);
        assert_eq!(
            encode(&map),
            json!({"@type": "g:Map", "@value": ["age", {"@type": "g:Int32", "@value": 29}]})
        );
    }

    #[test]
    fn test_nested_list() {
        let list = Value::List(vec![Value::Bool(true), Value::Set(vec![])]);
        assert_eq!(
            encode(&list),
            json!({"@type": "g:List", "@value": [true, {"@type": "g:Set", "@value": []}]})
        );
    }
}
