//! Bulk Set
//!
//! 값별 multiplicity를 갖는 중복 제거 multiset

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::value::Value;

/// 값 → multiplicity 매핑
///
/// 같은 값을 다시 추가하면 기존 multiplicity를 덮어씁니다.
/// 순회 순서는 처음 추가된 순서입니다.
#[derive(Debug, Clone, Default)]
pub struct BulkSet {
    entries: Vec<(Value, i64)>,
    // 값 지문 → entries 인덱스
    index: HashMap<u64, Vec<usize>>,
}

impl BulkSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, value: Value, bulk: i64) {
        let bucket = self.index.entry(fingerprint(&value)).or_default();
        match bucket.iter().find(|&&i| self.entries[i].0 == value) {
            Some(&i) => self.entries[i].1 = bulk,
            None => {
                bucket.push(self.entries.len());
                self.entries.push((value, bulk));
            }
        }
    }

    /// multiplicity 합계 (i64 범위에서 포화)
    pub fn size(&self) -> i64 {
        self.entries
            .iter()
            .fold(0i64, |total, (_, bulk)| total.saturating_add(*bulk))
    }

    /// 고유 값 수
    pub fn unique_size(&self) -> usize {
        self.entries.len()
    }

    /// 빈 집합 여부
    pub fn is_empty(&self) -> bool {
        self.unique_size() == 0
    }

    /// 값의 multiplicity
    pub fn bulk_of(&self, value: &Value) -> Option<i64> {
        self.index
            .get(&fingerprint(value))?
            .iter()
            .map(|&i| &self.entries[i])
            .find(|(v, _)| v == value)
            .map(|(_, bulk)| *bulk)
    }

    /// (값, multiplicity) 순회
    pub fn iter(&self) -> impl Iterator<Item = (&Value, i64)> {
        self.entries.iter().map(|(v, bulk)| (v, *bulk))
    }
}

impl PartialEq for BulkSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

/// 같은 값은 같은 지문을 가짐 (충돌은 `==`로 구분)
fn fingerprint(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_value(value, &mut hasher);
    hasher.finish()
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    value.type_name().hash(state);
    match value {
        Value::Null => {}
        Value::Bool(b) => b.hash(state),
        Value::Int32(i) => i.hash(state),
        Value::Int64(i) => i.hash(state),
        Value::Float(f) => hash_float(f64::from(*f), state),
        Value::Double(f) => hash_float(*f, state),
        Value::String(s) | Value::T(s) => s.hash(state),
        Value::Uuid(u) => u.hash(state),
        Value::Date(d) | Value::Timestamp(d) => d.hash(state),
        Value::List(items) | Value::Set(items) => {
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Map(entries) => {
            entries.len().hash(state);
            for (key, item) in entries {
                hash_value(key, state);
                hash_value(item, state);
            }
        }
        other => other.to_string().hash(state),
    }
}

fn hash_float<H: Hasher>(f: f64, state: &mut H) {
    // 0.0 == -0.0
    let bits = if f == 0.0 { 0 } else { f.to_bits() };
    bits.hash(state);
}

impl fmt::Display for BulkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (value, bulk)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{{{} : {}}}", value, bulk)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_overwrites_multiplicity() {
        let mut set = BulkSet::new();
        set.add(Value::from("x"), 3);
        set.add(Value::from("x"), 5);

        assert_eq!(set.size(), 5);
        assert_eq!(set.unique_size(), 1);
        assert_eq!(set.bulk_of(&Value::from("x")), Some(5));
    }

    #[test]
    fn test_size_sums_distinct_values() {
        let mut set = BulkSet::new();
        set.add(Value::from("x"), 2);
        set.add(Value::Int32(1), 4);

        assert_eq!(set.size(), 6);
        assert_eq!(set.unique_size(), 2);
        assert!(!set.is_empty());
        assert_eq!(set.to_string(), "{{x : 2},{1 : 4}}");
    }

    #[test]
    fn test_many_distinct_values() {
        let mut set = BulkSet::new();
        for i in 0..50_000 {
            set.add(Value::Int64(i), 1);
        }
        for i in (0..50_000).step_by(2) {
            set.add(Value::Int64(i), 2);
        }

        assert_eq!(set.unique_size(), 50_000);
        assert_eq!(set.size(), 75_000);
        assert_eq!(set.bulk_of(&Value::Int64(10)), Some(2));
        assert_eq!(set.bulk_of(&Value::Int64(11)), Some(1));
        assert_eq!(set.bulk_of(&Value::Int32(10)), None);
        assert_eq!(set.iter().next(), Some((&Value::Int64(0), 2)));
    }

    #[test]
    fn test_equal_values_share_entry() {
        let mut set = BulkSet::new();
        set.add(Value::Double(0.0), 1);
        set.add(Value::Double(-0.0), 4);
        set.add(Value::List(vec![Value::from("a"), Value::Int32(1)]), 2);
        set.add(Value::List(vec![Value::from("a"), Value::Int32(1)]), 3);

        assert_eq!(set.unique_size(), 2);
        assert_eq!(set.bulk_of(&Value::Double(0.0)), Some(4));
        assert_eq!(
            set.bulk_of(&Value::List(vec![Value::from("a"), Value::Int32(1)])),
            Some(3)
        );
    }

    #[test]
    fn test_size_saturates() {
        let mut set = BulkSet::new();
        set.add(Value::from("x"), i64::MAX);
        set.add(Value::from("y"), 10);
        assert_eq!(set.size(), i64::MAX);
    }

    #[test]
    fn test_empty() {
        let set = BulkSet::new();
        assert!(set.is_empty());
        assert_eq!(set.size(), 0);
        assert_eq!(set.iter().count(), 0);
    }
}
