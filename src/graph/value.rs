//! Graph Value
//!
//! GraphSON 응답에서 디코딩되는 값 타입

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::bulk_set::BulkSet;
use super::element::{Direction, Edge, Property, Vertex, VertexProperty};
use super::path::Path;

// ============================================================================
// Value - 그래프 값
// ============================================================================

/// 그래프 값 타입
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// g:Int32
    Int32(i32),
    /// g:Int64
    Int64(i64),
    /// g:Float
    Float(f32),
    /// g:Double
    Double(f64),
    /// String
    String(String),
    /// g:UUID
    Uuid(Uuid),
    /// g:Date
    Date(DateTime<Utc>),
    /// g:Timestamp
    Timestamp(DateTime<Utc>),
    /// g:List
    List(Vec<Value>),
    /// g:Set
    Set(Vec<Value>),
    /// g:Map (키 순서 유지)
    Map(Vec<(Value, Value)>),
    /// g:Vertex
    Vertex(Box<Vertex>),
    /// g:Edge
    Edge(Box<Edge>),
    /// g:VertexProperty
    VertexProperty(Box<VertexProperty>),
    /// g:Property
    Property(Box<Property>),
    /// g:Path
    Path(Path),
    /// g:BulkSet
    BulkSet(BulkSet),
    /// g:Traverser
    Traverser(Traverser),
    /// g:T (id, label, key, value)
    T(String),
    /// g:Direction
    Direction(Direction),
    /// 해석하지 않은 타입
    Typed {
        /// GraphSON 타입 이름
        type_name: String,
        /// 원본 값
        value: serde_json::Value,
    },
}

/// 트래버서 (값 + bulk)
#[derive(Debug, Clone, PartialEq)]
pub struct Traverser {
    /// 반복 횟수
    pub bulk: i64,
    /// 값
    pub value: Box<Value>,
}

impl Value {
    /// Null 여부
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean으로 변환
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 정수로 변환
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(*i as i64),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// 실수로 변환
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f as f64),
            Value::Double(f) => Some(*f),
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::T(s) => Some(s),
            _ => None,
        }
    }

    /// UUID로 변환
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// 시각으로 변환
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) | Value::Timestamp(d) => Some(*d),
            _ => None,
        }
    }

    /// List/Set으로 변환
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) | Value::Set(l) => Some(l),
            _ => None,
        }
    }

    /// Map 엔트리로 변환
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// 문자열 키로 Map 조회
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Vertex로 변환
    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Value::Vertex(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    /// Edge로 변환
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Value::Edge(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// VertexProperty로 변환
    pub fn as_vertex_property(&self) -> Option<&VertexProperty> {
        match self {
            Value::VertexProperty(p) => Some(p.as_ref()),
            _ => None,
        }
    }

    /// Property로 변환
    pub fn as_property(&self) -> Option<&Property> {
        match self {
            Value::Property(p) => Some(p.as_ref()),
            _ => None,
        }
    }

    /// Path로 변환
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    /// BulkSet으로 변환
    pub fn as_bulk_set(&self) -> Option<&BulkSet> {
        match self {
            Value::BulkSet(b) => Some(b),
            _ => None,
        }
    }

    /// 타입 이름
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Int32(_) => "g:Int32",
            Value::Int64(_) => "g:Int64",
            Value::Float(_) => "g:Float",
            Value::Double(_) => "g:Double",
            Value::String(_) => "String",
            Value::Uuid(_) => "g:UUID",
            Value::Date(_) => "g:Date",
            Value::Timestamp(_) => "g:Timestamp",
            Value::List(_) => "g:List",
            Value::Set(_) => "g:Set",
            Value::Map(_) => "g:Map",
            Value::Vertex(_) => "g:Vertex",
            Value::Edge(_) => "g:Edge",
            Value::VertexProperty(_) => "g:VertexProperty",
            Value::Property(_) => "g:Property",
            Value::Path(_) => "g:Path",
            Value::BulkSet(_) => "g:BulkSet",
            Value::Traverser(_) => "g:Traverser",
            Value::T(_) => "g:T",
            Value::Direction(_) => "g:Direction",
            Value::Typed { type_name, .. } => type_name,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Date(d) | Value::Timestamp(d) => write!(f, "{}", d.to_rfc3339()),
            Value::List(items) | Value::Set(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Vertex(v) => write!(f, "{}", v),
            Value::Edge(e) => write!(f, "{}", e),
            Value::VertexProperty(p) => write!(f, "{}", p),
            Value::Property(p) => write!(f, "{}", p),
            Value::Path(p) => write!(f, "{}", p),
            Value::BulkSet(b) => write!(f, "{}", b),
            Value::Traverser(t) => write!(f, "{}", t.value),
            Value::T(t) => write!(f, "{}", t),
            Value::Direction(d) => write!(f, "{}", d),
            Value::Typed { type_name, value } => write!(f, "{}<{}>", type_name, value),
        }
    }
}

// From implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(m: BTreeMap<String, V>) -> Self {
        Value::Map(
            m.into_iter()
                .map(|(k, v)| (Value::String(k), v.into()))
                .collect(),
        )
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(m: HashMap<String, V>) -> Self {
        // 출력 결정성을 위해 키 정렬
        let sorted: BTreeMap<String, V> = m.into_iter().collect();
        Value::from(sorted)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(Value::Int32(7).as_i64(), Some(7));
        assert_eq!(Value::Int64(-3).as_i64(), Some(-3));
        assert_eq!(Value::Double(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Int32(2).as_f64(), Some(2.0));
        assert_eq!(Value::String("x".into()).as_i64(), None);
    }

    #[test]
    fn test_map_lookup_by_string_key() {
        let map = Value::Map(vec![
            (Value::from("name"), Value::from("marko")),
            (Value::Int32(1), Value::from("one")),
        ]);
        assert_eq!(map.get("name").and_then(Value::as_str), Some("marko"));
        assert!(map.get("missing").is_none());
        assert!(Value::Null.get("name").is_none());
    }

    #[test]
    fn test_from_hashmap_is_sorted() {
        let mut m = HashMap::new();
        m.insert("b".to_string(), 2i64);
        m.insert("a".to_string(), 1i64);
        let value = Value::from(m);
        let keys: Vec<_> = value
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_display() {
        let list = Value::List(vec![Value::Int32(1), Value::from("a")]);
        assert_eq!(list.to_string(), "[1, a]");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_type_name_of_unknown_type() {
        let v = Value::Typed {
            type_name: "gx:BigDecimal".into(),
            value: serde_json::json!("1.23"),
        };
        assert_eq!(v.type_name(), "gx:BigDecimal");
    }
}
