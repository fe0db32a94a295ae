//! Graph Elements
//!
//! Vertex, Edge, VertexProperty, Property
//!
//! 모든 엘리먼트는 응답 디코딩으로만 생성됩니다.

use std::fmt;

use super::value::Value;

// ============================================================================
// ElementKind / Direction
// ============================================================================

/// 엘리먼트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// 정점
    Vertex,
    /// 간선
    Edge,
    /// 정점 속성
    VertexProperty,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Vertex => write!(f, "vertex"),
            ElementKind::Edge => write!(f, "edge"),
            ElementKind::VertexProperty => write!(f, "vertex-property"),
        }
    }
}

/// 간선 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// 나가는 방향
    Out,
    /// 들어오는 방향
    In,
    /// 양방향
    Both,
}

impl Direction {
    /// GraphSON 이름에서 파싱
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "OUT" => Some(Direction::Out),
            "IN" => Some(Direction::In),
            "BOTH" => Some(Direction::Both),
            _ => None,
        }
    }

    /// GraphSON 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Out => "OUT",
            Direction::In => "IN",
            Direction::Both => "BOTH",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Element - 공통 접근자
// ============================================================================

/// 그래프 엘리먼트 공통 접근자
pub trait Element {
    /// 식별자
    fn id(&self) -> &Value;

    /// 레이블
    fn label(&self) -> &str;

    /// 엘리먼트 종류
    fn kind(&self) -> ElementKind;

    /// 속성 키 목록 (중복 제거, 등장 순서 유지)
    fn keys(&self) -> Vec<&str>;

    /// 키에 해당하는 첫 번째 속성 값
    fn property_value(&self, key: &str) -> Option<&Value>;

    /// 키 필터에 해당하는 속성 값들 (빈 필터는 전체)
    fn property_values(&self, keys: &[&str]) -> Vec<&Value>;
}

/// 엘리먼트 참조 (Edge 양 끝점, 속성 소유자)
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRef {
    id: Value,
    label: String,
    kind: ElementKind,
}

impl ElementRef {
    pub(crate) fn new(id: Value, label: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
        }
    }

    /// 식별자
    pub fn id(&self) -> &Value {
        &self.id
    }

    /// 레이블
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 엘리먼트 종류
    pub fn kind(&self) -> ElementKind {
        self.kind
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.id)
    }
}

fn matches_keys(key: &str, keys: &[&str]) -> bool {
    keys.is_empty() || keys.contains(&key)
}

fn unique_keys<'a>(iter: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut keys: Vec<&str> = Vec::new();
    for key in iter {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

// ============================================================================
// Property - 속성
// ============================================================================

/// 키/값 속성 (Edge 속성, 메타 속성)
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    key: String,
    value: Value,
    element: Option<ElementRef>,
}

impl Property {
    pub(crate) fn new(key: impl Into<String>, value: Value, element: Option<ElementRef>) -> Self {
        Self {
            key: key.into(),
            value,
            element,
        }
    }

    /// 키
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 값
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// 소유 엘리먼트
    pub fn element(&self) -> Option<&ElementRef> {
        self.element.as_ref()
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p[{}->{}]", self.key, self.value)
    }
}

// ============================================================================
// VertexProperty - 정점 속성
// ============================================================================

/// 정점 속성 (Element이자 Property)
#[derive(Debug, Clone, PartialEq)]
pub struct VertexProperty {
    id: Value,
    label: String,
    value: Value,
    vertex: Option<ElementRef>,
    properties: Vec<Property>,
}

impl VertexProperty {
    pub(crate) fn new(
        id: Value,
        label: impl Into<String>,
        value: Value,
        vertex: Option<ElementRef>,
        properties: Vec<Property>,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            value,
            vertex,
            properties,
        }
    }

    /// 속성 키 (레이블과 동일)
    pub fn key(&self) -> &str {
        &self.label
    }

    /// 속성 값
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// 소유 정점
    pub fn vertex(&self) -> Option<&ElementRef> {
        self.vertex.as_ref()
    }

    /// 메타 속성 조회
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// 메타 속성 목록 (빈 필터는 전체)
    pub fn properties(&self, keys: &[&str]) -> Vec<&Property> {
        self.properties
            .iter()
            .filter(|p| matches_keys(&p.key, keys))
            .collect()
    }
}

impl Element for VertexProperty {
    fn id(&self) -> &Value {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> ElementKind {
        ElementKind::VertexProperty
    }

    fn keys(&self) -> Vec<&str> {
        unique_keys(self.properties.iter().map(|p| p.key.as_str()))
    }

    fn property_value(&self, key: &str) -> Option<&Value> {
        self.property(key).map(|p| &p.value)
    }

    fn property_values(&self, keys: &[&str]) -> Vec<&Value> {
        self.properties(keys).into_iter().map(|p| &p.value).collect()
    }
}

impl fmt::Display for VertexProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vp[{}->{}]", self.label, self.value)
    }
}

// ============================================================================
// Edge - 간선
// ============================================================================

/// 간선
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    id: Value,
    label: String,
    out_v: ElementRef,
    in_v: ElementRef,
    properties: Vec<Property>,
}

impl Edge {
    pub(crate) fn new(
        id: Value,
        label: impl Into<String>,
        out_v: ElementRef,
        in_v: ElementRef,
        properties: Vec<Property>,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            out_v,
            in_v,
            properties,
        }
    }

    /// 나가는 쪽 정점 (간선의 시작)
    pub fn out_vertex(&self) -> &ElementRef {
        &self.out_v
    }

    /// 들어오는 쪽 정점 (간선의 끝)
    pub fn in_vertex(&self) -> &ElementRef {
        &self.in_v
    }

    /// 속성 조회
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// 속성 목록 (빈 필터는 전체)
    pub fn properties(&self, keys: &[&str]) -> Vec<&Property> {
        self.properties
            .iter()
            .filter(|p| matches_keys(&p.key, keys))
            .collect()
    }
}

impl Element for Edge {
    fn id(&self) -> &Value {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Edge
    }

    fn keys(&self) -> Vec<&str> {
        unique_keys(self.properties.iter().map(|p| p.key.as_str()))
    }

    fn property_value(&self, key: &str) -> Option<&Value> {
        self.property(key).map(|p| &p.value)
    }

    fn property_values(&self, keys: &[&str]) -> Vec<&Value> {
        self.properties(keys).into_iter().map(|p| &p.value).collect()
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "e[{}][{}-{}->{}]",
            self.id, self.out_v.id, self.label, self.in_v.id
        )
    }
}

// ============================================================================
// Vertex - 정점
// ============================================================================

/// 정점
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    id: Value,
    label: String,
    properties: Vec<VertexProperty>,
    out_edges: Vec<Edge>,
    in_edges: Vec<Edge>,
}

impl Vertex {
    pub(crate) fn new(id: Value, label: impl Into<String>, properties: Vec<VertexProperty>) -> Self {
        Self {
            id,
            label: label.into(),
            properties,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        }
    }

    pub(crate) fn with_adjacency(mut self, out_edges: Vec<Edge>, in_edges: Vec<Edge>) -> Self {
        self.out_edges = out_edges;
        self.in_edges = in_edges;
        self
    }

    /// 정점 속성 조회 (다중 값이면 첫 번째)
    pub fn vertex_property(&self, key: &str) -> Option<&VertexProperty> {
        self.properties.iter().find(|p| p.label == key)
    }

    /// 정점 속성 목록 (빈 필터는 전체)
    pub fn vertex_properties(&self, keys: &[&str]) -> Vec<&VertexProperty> {
        self.properties
            .iter()
            .filter(|p| matches_keys(&p.label, keys))
            .collect()
    }

    /// 인접 간선 (빈 레이블 필터는 전체)
    ///
    /// 응답에 인접 정보(outE/inE)가 포함된 경우에만 채워집니다.
    pub fn edges(&self, direction: Direction, labels: &[&str]) -> Vec<&Edge> {
        let out = self.out_edges.iter();
        let inc = self.in_edges.iter();
        let selected: Vec<&Edge> = match direction {
            Direction::Out => out.collect(),
            Direction::In => inc.collect(),
            Direction::Both => out.chain(inc).collect(),
        };
        selected
            .into_iter()
            .filter(|e| matches_keys(&e.label, labels))
            .collect()
    }

    /// 인접 정점 참조 (빈 레이블 필터는 전체)
    pub fn vertices(&self, direction: Direction, labels: &[&str]) -> Vec<&ElementRef> {
        let mut result = Vec::new();
        if direction != Direction::In {
            result.extend(
                self.out_edges
                    .iter()
                    .filter(|e| matches_keys(&e.label, labels))
                    .map(|e| &e.in_v),
            );
        }
        if direction != Direction::Out {
            result.extend(
                self.in_edges
                    .iter()
                    .filter(|e| matches_keys(&e.label, labels))
                    .map(|e| &e.out_v),
            );
        }
        result
    }
}

impl Element for Vertex {
    fn id(&self) -> &Value {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Vertex
    }

    fn keys(&self) -> Vec<&str> {
        unique_keys(self.properties.iter().map(|p| p.label.as_str()))
    }

    fn property_value(&self, key: &str) -> Option<&Value> {
        self.vertex_property(key).map(|p| &p.value)
    }

    fn property_values(&self, keys: &[&str]) -> Vec<&Value> {
        self.vertex_properties(keys)
            .into_iter()
            .map(|p| &p.value)
            .collect()
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v[{}]", self.id)
    }
}

// ============================================================================
// GraphElement - 엘리먼트 변형
// ============================================================================

/// 닫힌 엘리먼트 변형 집합
#[derive(Debug, Clone, PartialEq)]
pub enum GraphElement {
    /// 정점
    Vertex(Vertex),
    /// 간선
    Edge(Edge),
    /// 정점 속성
    VertexProperty(VertexProperty),
}

impl GraphElement {
    /// 공통 접근자
    pub fn as_element(&self) -> &dyn Element {
        match self {
            GraphElement::Vertex(v) => v,
            GraphElement::Edge(e) => e,
            GraphElement::VertexProperty(p) => p,
        }
    }

    /// 엘리먼트 종류
    pub fn kind(&self) -> ElementKind {
        self.as_element().kind()
    }

    /// Value에서 추출
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vertex(v) => Some(GraphElement::Vertex(v.as_ref().clone())),
            Value::Edge(e) => Some(GraphElement::Edge(e.as_ref().clone())),
            Value::VertexProperty(p) => Some(GraphElement::VertexProperty(p.as_ref().clone())),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn vref(id: i64, label: &str) -> ElementRef {
        ElementRef::new(Value::Int64(id), label, ElementKind::Vertex)
    }

    fn knows(id: i64, from: i64, to: i64) -> Edge {
        Edge::new(
            Value::Int64(id),
            "knows",
            vref(from, "person"),
            vref(to, "person"),
            vec![Property::new("weight", Value::Double(0.5), None)],
        )
    }

    #[test]
    fn test_vertex_properties_multi_valued() {
        let v = Vertex::new(
            Value::Int64(1),
            "person",
            vec![
                VertexProperty::new(Value::Int64(10), "name", Value::from("marko"), None, vec![]),
                VertexProperty::new(Value::Int64(11), "alias", Value::from("m"), None, vec![]),
                VertexProperty::new(Value::Int64(12), "alias", Value::from("mk"), None, vec![]),
            ],
        );

        assert_eq!(v.keys(), vec!["name", "alias"]);
        assert_eq!(v.property_value("name").and_then(Value::as_str), Some("marko"));
        assert_eq!(v.property_values(&["alias"]).len(), 2);
        assert_eq!(v.property_values(&[]).len(), 3);
        assert_eq!(v.kind(), ElementKind::Vertex);
    }

    #[test]
    fn test_empty_collections_are_tolerated() {
        let v = Vertex::new(Value::Int64(1), "person", vec![]);
        assert!(v.keys().is_empty());
        assert!(v.property_value("name").is_none());
        assert!(v.edges(Direction::Both, &[]).is_empty());
        assert!(v.vertices(Direction::Out, &["knows"]).is_empty());
    }

    #[test]
    fn test_vertex_adjacency() {
        let v = Vertex::new(Value::Int64(1), "person", vec![])
            .with_adjacency(vec![knows(7, 1, 2)], vec![knows(8, 3, 1)]);

        assert_eq!(v.edges(Direction::Out, &[]).len(), 1);
        assert_eq!(v.edges(Direction::Both, &["knows"]).len(), 2);
        assert!(v.edges(Direction::Both, &["created"]).is_empty());

        let out: Vec<_> = v.vertices(Direction::Out, &[]).iter().map(|r| r.id().clone()).collect();
        assert_eq!(out, vec![Value::Int64(2)]);
        let inc: Vec<_> = v.vertices(Direction::In, &[]).iter().map(|r| r.id().clone()).collect();
        assert_eq!(inc, vec![Value::Int64(3)]);
    }

    #[test]
    fn test_edge_endpoints() {
        let e = knows(7, 1, 2);
        assert_eq!(e.out_vertex().id(), &Value::Int64(1));
        assert_eq!(e.in_vertex().id(), &Value::Int64(2));
        assert_eq!(e.property_value("weight"), Some(&Value::Double(0.5)));
        assert_eq!(e.to_string(), "e[7][1-knows->2]");
    }

    #[test]
    fn test_vertex_property_is_element_and_property() {
        let vp = VertexProperty::new(
            Value::Int64(5),
            "location",
            Value::from("santa fe"),
            Some(vref(1, "person")),
            vec![Property::new("startTime", Value::Int32(2005), None)],
        );

        assert_eq!(vp.key(), "location");
        assert_eq!(vp.value().as_str(), Some("santa fe"));
        assert_eq!(vp.keys(), vec!["startTime"]);
        assert_eq!(vp.vertex().map(|r| r.label()), Some("person"));

        let element = GraphElement::VertexProperty(vp);
        assert_eq!(element.kind(), ElementKind::VertexProperty);
        assert_eq!(element.as_element().label(), "location");
    }

    #[test]
    fn test_elements_nest_inside_values() {
        // 속성 값으로 다른 정점을 갖는 정점
        let inner = Vertex::new(Value::Int64(2), "software", vec![]);
        let vp = VertexProperty::new(
            Value::Int64(20),
            "created",
            Value::Vertex(Box::new(inner.clone())),
            Some(vref(1, "person")),
            vec![],
        );
        let outer = Value::Vertex(Box::new(Vertex::new(Value::Int64(1), "person", vec![vp])));
        let edge = Value::Edge(Box::new(knows(7, 1, 2)));

        let v = outer.as_vertex().unwrap();
        assert_eq!(v.property_value("created").and_then(Value::as_vertex), Some(&inner));
        assert_eq!(edge.as_edge().map(|e| e.label()), Some("knows"));
        assert_eq!(
            GraphElement::from_value(&outer).map(|e| e.kind()),
            Some(ElementKind::Vertex)
        );
        assert!(GraphElement::from_value(&Value::Int32(1)).is_none());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("OUT"), Some(Direction::Out));
        assert_eq!(Direction::parse("sideways"), None);
        assert_eq!(Direction::Both.to_string(), "BOTH");
    }
}
