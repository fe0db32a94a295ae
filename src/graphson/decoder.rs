//! GraphSON v3 decoder.
//!
//! Turns typed GraphSON JSON into [`Value`]s. Unknown `@type`s are kept as
//! [`Value::Typed`].

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use super::error::{GraphsonError, GraphsonResult};
use crate::graph::{
    BulkSet, Direction, Edge, ElementKind, ElementRef, Path, Property, Traverser, Value, Vertex,
    VertexProperty,
};

/// Decodes a GraphSON v3 value.
pub fn decode(json: &Json) -> GraphsonResult<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int64(i)),
            None => Ok(Value::Double(n.as_f64().unwrap_or(f64::NAN))),
        },
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Array(items) => Ok(Value::List(decode_all(items)?)),
        Json::Object(obj) => match (obj.get("@type"), obj.get("@value")) {
            (Some(Json::String(type_name)), Some(value)) => decode_typed(type_name, value),
            (Some(Json::String(type_name)), None) => decode_typed(type_name, &Json::Null),
            _ => {
                let entries = obj
                    .iter()
                    .map(|(k, v)| Ok((Value::String(k.clone()), decode(v)?)))
                    .collect::<GraphsonResult<Vec<_>>>()?;
                Ok(Value::Map(entries))
            }
        },
    }
}

fn decode_all(items: &[Json]) -> GraphsonResult<Vec<Value>> {
    items.iter().map(decode).collect()
}

fn decode_typed(type_name: &str, value: &Json) -> GraphsonResult<Value> {
    match type_name {
        "g:Int32" => {
            let i = as_i64(type_name, value)?;
            i32::try_from(i)
                .map(Value::Int32)
                .map_err(|_| GraphsonError::invalid_value(type_name, "out of range"))
        }
        "g:Int64" => as_i64(type_name, value).map(Value::Int64),
        "g:Float" => as_f64(type_name, value).map(|f| Value::Float(f as f32)),
        "g:Double" => as_f64(type_name, value).map(Value::Double),
        "g:UUID" => {
            let s = as_str(type_name, value)?;
            Uuid::parse_str(s)
                .map(Value::Uuid)
                .map_err(|e| GraphsonError::invalid_value(type_name, e.to_string()))
        }
        "g:Date" => as_datetime(type_name, value).map(Value::Date),
        "g:Timestamp" => as_datetime(type_name, value).map(Value::Timestamp),
        "g:List" => Ok(Value::List(decode_all(as_array(type_name, value)?)?)),
        "g:Set" => Ok(Value::Set(decode_all(as_array(type_name, value)?)?)),
        "g:Map" => decode_map(type_name, value).map(Value::Map),
        "g:T" => Ok(Value::T(as_str(type_name, value)?.to_string())),
        "g:Direction" => {
            let s = as_str(type_name, value)?;
            Direction::parse(s)
                .map(Value::Direction)
                .ok_or_else(|| GraphsonError::invalid_value(type_name, format!("unknown direction {}", s)))
        }
        "g:Vertex" => decode_vertex(value).map(|v| Value::Vertex(Box::new(v))),
        "g:Edge" => decode_edge(value).map(|e| Value::Edge(Box::new(e))),
        "g:VertexProperty" => decode_vertex_property(value, None, None).map(|p| Value::VertexProperty(Box::new(p))),
        "g:Property" => decode_property(value).map(|p| Value::Property(Box::new(p))),
        "g:Path" => decode_path(value).map(Value::Path),
        "g:BulkSet" => decode_bulk_set(value).map(Value::BulkSet),
        "g:Traverser" => {
            let obj = as_object(type_name, value)?;
            let bulk = match obj.get("bulk") {
                Some(b) => decode(b)?.as_i64().unwrap_or(1),
                None => 1,
            };
            let inner = decode(obj.get("value").unwrap_or(&Json::Null))?;
            Ok(Value::Traverser(Traverser {
                bulk,
                value: Box::new(inner),
            }))
        }
        _ => Ok(Value::Typed {
            type_name: type_name.to_string(),
            value: value.clone(),
        }),
    }
}

fn as_i64(type_name: &str, value: &Json) -> GraphsonResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| GraphsonError::invalid_value(type_name, format!("expected integer, got {}", value)))
}

fn as_f64(type_name: &str, value: &Json) -> GraphsonResult<f64> {
    match value {
        Json::Number(n) => n
            .as_f64()
            .ok_or_else(|| GraphsonError::invalid_value(type_name, "not a number")),
        Json::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => Err(GraphsonError::invalid_value(type_name, format!("unexpected {}", s))),
        },
        _ => Err(GraphsonError::invalid_value(type_name, format!("expected number, got {}", value))),
    }
}

fn as_str<'a>(type_name: &str, value: &'a Json) -> GraphsonResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| GraphsonError::invalid_value(type_name, format!("expected string, got {}", value)))
}

fn as_array<'a>(type_name: &str, value: &'a Json) -> GraphsonResult<&'a [Json]> {
    value
        .as_array()
        .map(|a| a.as_slice())
        .ok_or_else(|| GraphsonError::invalid_value(type_name, "expected array"))
}

fn as_object<'a>(type_name: &str, value: &'a Json) -> GraphsonResult<&'a Map<String, Json>> {
    value
        .as_object()
        .ok_or_else(|| GraphsonError::invalid_value(type_name, "expected object"))
}

fn as_datetime(type_name: &str, value: &Json) -> GraphsonResult<DateTime<Utc>> {
    let millis = as_i64(type_name, value)?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| GraphsonError::invalid_value(type_name, format!("timestamp {} out of range", millis)))
}

fn decode_map(type_name: &str, value: &Json) -> GraphsonResult<Vec<(Value, Value)>> {
    let flat = as_array(type_name, value)?;
    if flat.len() % 2 != 0 {
        return Err(GraphsonError::invalid_value(type_name, "odd number of entries"));
    }
    flat.chunks(2)
        .map(|pair| Ok((decode(&pair[0])?, decode(&pair[1])?)))
        .collect()
}

fn label_of(obj: &Map<String, Json>, field: &str) -> String {
    obj.get(field)
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string()
}

fn id_of(obj: &Map<String, Json>, field: &str) -> GraphsonResult<Value> {
    decode(obj.get(field).unwrap_or(&Json::Null))
}

/// Vertex properties are keyed by name, each holding a list of
/// `g:VertexProperty` values.
fn decode_vertex(value: &Json) -> GraphsonResult<Vertex> {
    let obj = as_object("g:Vertex", value)?;
    let id = id_of(obj, "id")?;
    let label = label_of(obj, "label");
    let owner = ElementRef::new(id.clone(), label.clone(), ElementKind::Vertex);

    let mut properties = Vec::new();
    if let Some(Json::Object(props)) = obj.get("properties") {
        for (key, entries) in props {
            for entry in entries.as_array().map(|a| a.as_slice()).unwrap_or_default() {
                let inner = entry.get("@value").unwrap_or(entry);
                properties.push(decode_vertex_property(inner, Some(owner.clone()), Some(key.as_str()))?);
            }
        }
    }

    let out_edges = decode_adjacency(obj.get("outE"), &owner, true)?;
    let in_edges = decode_adjacency(obj.get("inE"), &owner, false)?;
    Ok(Vertex::new(id, label, properties).with_adjacency(out_edges, in_edges))
}

/// Adjacency lists (`outE`/`inE`) appear on star-graph vertices only.
fn decode_adjacency(
    value: Option<&Json>,
    owner: &ElementRef,
    outgoing: bool,
) -> GraphsonResult<Vec<Edge>> {
    let Some(Json::Object(by_label)) = value else {
        return Ok(Vec::new());
    };
    let mut edges = Vec::new();
    for (label, entries) in by_label {
        for entry in entries.as_array().map(|a| a.as_slice()).unwrap_or_default() {
            let inner = entry.get("@value").unwrap_or(entry);
            let obj = as_object("g:Edge", inner)?;
            let id = id_of(obj, "id")?;
            let properties = decode_edge_properties(obj, &id, label)?;
            let (out_v, in_v) = if outgoing {
                let other = ElementRef::new(id_of(obj, "inV")?, label_of(obj, "inVLabel"), ElementKind::Vertex);
                (owner.clone(), other)
            } else {
                let other = ElementRef::new(id_of(obj, "outV")?, label_of(obj, "outVLabel"), ElementKind::Vertex);
                (other, owner.clone())
            };
            edges.push(Edge::new(id, label.clone(), out_v, in_v, properties));
        }
    }
    Ok(edges)
}

fn decode_edge_properties(
    obj: &Map<String, Json>,
    edge_id: &Value,
    edge_label: &str,
) -> GraphsonResult<Vec<Property>> {
    let owner = ElementRef::new(edge_id.clone(), edge_label, ElementKind::Edge);
    let mut properties = Vec::new();
    if let Some(Json::Object(props)) = obj.get("properties") {
        for (key, raw) in props {
            // either a g:Property wrapper or a bare value
            let value = match decode(raw)? {
                Value::Property(p) => p.value().clone(),
                other => other,
            };
            properties.push(Property::new(key.clone(), value, Some(owner.clone())));
        }
    }
    Ok(properties)
}

fn decode_edge(value: &Json) -> GraphsonResult<Edge> {
    let obj = as_object("g:Edge", value)?;
    let id = id_of(obj, "id")?;
    let label = label_of(obj, "label");
    let out_v = ElementRef::new(id_of(obj, "outV")?, label_of(obj, "outVLabel"), ElementKind::Vertex);
    let in_v = ElementRef::new(id_of(obj, "inV")?, label_of(obj, "inVLabel"), ElementKind::Vertex);
    let properties = decode_edge_properties(obj, &id, &label)?;
    Ok(Edge::new(id, label, out_v, in_v, properties))
}

fn decode_vertex_property(
    value: &Json,
    owner: Option<ElementRef>,
    key: Option<&str>,
) -> GraphsonResult<VertexProperty> {
    let obj = as_object("g:VertexProperty", value)?;
    let id = id_of(obj, "id")?;
    let mut label = label_of(obj, "label");
    if label.is_empty() {
        label = key.unwrap_or_default().to_string();
    }
    let prop_value = decode(obj.get("value").unwrap_or(&Json::Null))?;
    let owner = match owner {
        Some(o) => Some(o),
        None => match obj.get("vertex") {
            Some(v) => Some(ElementRef::new(decode(v)?, "", ElementKind::Vertex)),
            None => None,
        },
    };
    let this = ElementRef::new(id.clone(), label.clone(), ElementKind::VertexProperty);
    let mut meta = Vec::new();
    if let Some(Json::Object(props)) = obj.get("properties") {
        for (key, raw) in props {
            meta.push(Property::new(key.clone(), decode(raw)?, Some(this.clone())));
        }
    }
    Ok(VertexProperty::new(id, label, prop_value, owner, meta))
}

fn decode_property(value: &Json) -> GraphsonResult<Property> {
    let obj = as_object("g:Property", value)?;
    let key = label_of(obj, "key");
    let prop_value = decode(obj.get("value").unwrap_or(&Json::Null))?;
    let element = match obj.get("element") {
        Some(Json::Object(el)) => {
            let kind = match el.get("@type").and_then(Json::as_str) {
                Some("g:Edge") => ElementKind::Edge,
                Some("g:Vertex") => ElementKind::Vertex,
                _ => ElementKind::VertexProperty,
            };
            let inner = match el.get("@value") {
                Some(Json::Object(o)) => o,
                _ => el,
            };
            Some(ElementRef::new(id_of(inner, "id")?, label_of(inner, "label"), kind))
        }
        _ => None,
    };
    Ok(Property::new(key, prop_value, element))
}

fn decode_path(value: &Json) -> GraphsonResult<Path> {
    let obj = as_object("g:Path", value)?;
    let labels = match obj.get("labels").map(decode).transpose()? {
        Some(Value::List(steps)) => steps
            .into_iter()
            .map(|step| match step {
                Value::List(names) | Value::Set(names) => names
                    .into_iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    };
    let objects = match obj.get("objects").map(decode).transpose()? {
        Some(Value::List(items)) => items,
        _ => Vec::new(),
    };
    Ok(Path::new(labels, objects))
}

fn decode_bulk_set(value: &Json) -> GraphsonResult<BulkSet> {
    let flat = as_array("g:BulkSet", value)?;
    if flat.len() % 2 != 0 {
        return Err(GraphsonError::invalid_value("g:BulkSet", "odd number of entries"));
    }
    let mut set = BulkSet::new();
    for pair in flat.chunks(2) {
        let item = decode(&pair[0])?;
        let bulk = decode(&pair[1])?
            .as_i64()
            .ok_or_else(|| GraphsonError::invalid_value("g:BulkSet", "bulk is not an integer"))?;
        set.add(item, bulk);
    }
    Ok(set)
}

// ============================================================================
// Tests
// ============================================================================
