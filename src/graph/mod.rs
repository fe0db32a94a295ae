//! Graph Data Model
//!
//! 응답 디코딩 결과로 만들어지는 그래프 타입
//!
//! - [`Value`] - GraphSON 값
//! - [`Vertex`], [`Edge`], [`VertexProperty`], [`Property`] - 엘리먼트
//! - [`Path`] - 트래버설 경로
//! - [`BulkSet`] - multiplicity 집합

mod bulk_set;
mod element;
mod path;
mod value;

pub use bulk_set::BulkSet;
pub use element::{
    Direction, Edge, Element, ElementKind, ElementRef, GraphElement, Property, Vertex,
    VertexProperty,
};
pub use path::Path;
pub use value::{Traverser, Value};
