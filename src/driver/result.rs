//! GraphResult - 쿼리 결과 항목
//!
//! 응답 데이터의 단일 항목과 타입 변환

use std::fmt;

use uuid::Uuid;

use super::error::{DriverError, DriverResult};
use crate::graph::{BulkSet, Edge, Path, Property, Value, Vertex, VertexProperty};

// ============================================================================
// GraphResult - 결과 항목
// ============================================================================

/// 결과 항목
///
/// `g:Traverser`는 값과 `bulk`로 풀어서 보관합니다. 일반 값의 `bulk`는 1입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphResult {
    value: Value,
    bulk: i64,
}

impl GraphResult {
    /// 값에서 결과 생성
    pub fn new(value: Value) -> Self {
        match value {
            Value::Traverser(t) => Self {
                value: *t.value,
                bulk: t.bulk,
            },
            value => Self { value, bulk: 1 },
        }
    }

    /// 값 참조
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// 값 소유권 이전
    pub fn into_value(self) -> Value {
        self.value
    }

    /// 반복 횟수
    pub fn bulk(&self) -> i64 {
        self.bulk
    }

    /// Null 여부
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// 타입 변환된 값 가져오기
    pub fn get_as<T>(&self) -> DriverResult<T>
    where
        T: TryFrom<Value, Error = DriverError>,
    {
        T::try_from(self.value.clone())
    }

    /// Optional 값 가져오기 (Null은 None)
    pub fn get_optional<T>(&self) -> DriverResult<Option<T>>
    where
        T: TryFrom<Value, Error = DriverError>,
    {
        match &self.value {
            Value::Null => Ok(None),
            v => T::try_from(v.clone()).map(Some),
        }
    }

    /// Boolean 값 가져오기
    pub fn get_bool(&self) -> DriverResult<bool> {
        self.get_as::<bool>()
    }

    /// Integer 값 가져오기
    pub fn get_int(&self) -> DriverResult<i64> {
        self.get_as::<i64>()
    }

    /// Float 값 가져오기
    pub fn get_float(&self) -> DriverResult<f64> {
        self.get_as::<f64>()
    }

    /// String 값 가져오기
    pub fn get_string(&self) -> DriverResult<String> {
        self.get_as::<String>()
    }

    /// UUID 값 가져오기
    pub fn get_uuid(&self) -> DriverResult<Uuid> {
        self.get_as::<Uuid>()
    }

    /// Vertex 값 가져오기
    pub fn get_vertex(&self) -> DriverResult<Vertex> {
        self.get_as::<Vertex>()
    }

    /// Edge 값 가져오기
    pub fn get_edge(&self) -> DriverResult<Edge> {
        self.get_as::<Edge>()
    }

    /// VertexProperty 값 가져오기
    pub fn get_vertex_property(&self) -> DriverResult<VertexProperty> {
        self.get_as::<VertexProperty>()
    }

    /// Property 값 가져오기
    pub fn get_property(&self) -> DriverResult<Property> {
        self.get_as::<Property>()
    }

    /// Path 값 가져오기
    pub fn get_path(&self) -> DriverResult<Path> {
        self.get_as::<Path>()
    }

    /// BulkSet 값 가져오기
    pub fn get_bulk_set(&self) -> DriverResult<BulkSet> {
        self.get_as::<BulkSet>()
    }

    /// List 값 가져오기
    pub fn get_list(&self) -> DriverResult<Vec<Value>> {
        self.get_as::<Vec<Value>>()
    }
}

impl From<Value> for GraphResult {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for GraphResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bulk == 1 {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} (x{})", self.value, self.bulk)
        }
    }
}

// ============================================================================
// TryFrom implementations
// ============================================================================

fn mismatch(value: &Value, target: &str) -> DriverError {
    DriverError::type_conversion(format!("Cannot convert {} to {}", value.type_name(), target))
}

impl TryFrom<Value> for bool {
    type Error = DriverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_bool().ok_or_else(|| mismatch(&value, "bool"))
    }
}

impl TryFrom<Value> for i64 {
    type Error = DriverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_i64().ok_or_else(|| mismatch(&value, "i64"))
    }
}

impl TryFrom<Value> for f64 {
    type Error = DriverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_f64().ok_or_else(|| mismatch(&value, "f64"))
    }
}

impl TryFrom<Value> for String {
    type Error = DriverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) | Value::T(s) => Ok(s),
            other => Err(mismatch(&other, "String")),
        }
    }
}

impl TryFrom<Value> for Uuid {
    type Error = DriverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_uuid().ok_or_else(|| mismatch(&value, "UUID"))
    }
}

impl TryFrom<Value> for Vec<Value> {
    type Error = DriverError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::List(items) | Value::Set(items) => Ok(items),
            other => Err(mismatch(&other, "List")),
        }
    }
}

macro_rules! try_from_variant {
    (@impl $ty:ident, |$inner:ident| $conv:expr) => {
        impl TryFrom<Value> for $ty {
            type Error = DriverError;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                match value {
                    Value::$ty($inner) => Ok($conv),
                    other => Err(mismatch(&other, stringify!($ty))),
                }
            }
        }
    };
    (boxed: $($boxed:ident),* ; plain: $($plain:ident),* $(,)?) => {
        $( try_from_variant!(@impl $boxed, |inner| *inner); )*
        $( try_from_variant!(@impl $plain, |inner| inner); )*
    };
}

try_from_variant!(boxed: Vertex, Edge, VertexProperty, Property; plain: Path, BulkSet);
