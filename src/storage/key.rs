use std::cmp::Ordering;

use crate::storage::schema::Schema;
use crate::storage::value::{Tuple, Value};

/// An ordered B+ tree key: either a tuple of column values (compared
/// lexicographically, null-aware) or one of the two open-range
/// sentinels used for unbounded scans.
///
/// Modeled as an explicit sum type instead of a tagged
/// `Option<Vec<Value>>`, so a dynamically-typed key has a fixed,
/// enumerable shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    NegInf,
    Tuple(Vec<Value>),
    PosInf,
}

impl Key {
    pub fn single(value: Value) -> Self {
        Key::Tuple(vec![value])
    }

    /// fixed-width encoding under `schema`, used to persist a B+ tree
    /// node's keys to a slot. Sentinels never reach disk: a range scan's
    /// open end is never itself inserted, only compared against.
    pub fn encode(&self, schema: &Schema) -> Vec<u8> {
        match self {
            Key::Tuple(values) => Tuple::new(values.clone()).encode(schema),
            Key::NegInf | Key::PosInf => {
                panic!("attempted to persist an open-range sentinel key")
            }
        }
    }

    pub fn decode(bytes: &[u8], schema: &Schema) -> Self {
        Key::Tuple(Tuple::decode(bytes, schema).values)
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::NegInf, Key::NegInf) => Ordering::Equal,
            (Key::NegInf, _) => Ordering::Less,
            (_, Key::NegInf) => Ordering::Greater,
            (Key::PosInf, Key::PosInf) => Ordering::Equal,
            (Key::PosInf, _) => Ordering::Greater,
            (_, Key::PosInf) => Ordering::Less,
            (Key::Tuple(a), Key::Tuple(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_bound_every_tuple() {
        let k = Key::single(Value::Int64(42));
        assert!(Key::NegInf < k);
        assert!(k < Key::PosInf);
        assert!(Key::NegInf < Key::PosInf);
    }

    #[test]
    fn null_sorts_below_non_null() {
        let a = Key::single(Value::Null);
        let b = Key::single(Value::Int64(0));
        assert!(a < b);
    }

    #[test]
    fn lexicographic_multi_column_order() {
        let a = Key::Tuple(vec![Value::Int64(1), Value::Int64(9)]);
        let b = Key::Tuple(vec![Value::Int64(1), Value::Int64(10)]);
        let c = Key::Tuple(vec![Value::Int64(2), Value::Int64(0)]);
        assert!(a < b);
        assert!(b < c);
    }
}
