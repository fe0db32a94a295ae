//! Graph Path
//!
//! 트래버설 경로 (단계별 객체와 레이블)

use std::fmt;

use super::value::Value;

/// 트래버설 경로
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    labels: Vec<Vec<String>>,
    objects: Vec<Value>,
}

impl Path {
    pub(crate) fn new(labels: Vec<Vec<String>>, objects: Vec<Value>) -> Self {
        Self { labels, objects }
    }

    /// 단계 수
    pub fn size(&self) -> usize {
        self.objects.len()
    }

    /// 빈 경로 여부
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// 단계별 객체
    pub fn objects(&self) -> &[Value] {
        &self.objects
    }

    /// 단계별 레이블
    pub fn labels(&self) -> &[Vec<String>] {
        &self.labels
    }

    /// 인덱스로 객체 조회
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.objects.get(index)
    }

    /// 레이블로 객체 조회 (가장 마지막 단계)
    pub fn by_label(&self, label: &str) -> Option<&Value> {
        self.labels
            .iter()
            .rposition(|step| step.iter().any(|l| l == label))
            .and_then(|i| self.objects.get(i))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path[")?;
        for (i, object) in self.objects.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", object)?;
        }
        write!(f, "]")
    }
}
