use std::cmp::Ordering;
use std::io::Read;

use crate::storage::schema::{Schema, Type};
use crate::util::{read_into, Decodeable, Encodeable};

/// A single column value. `Null` sorts below every non-null value of the
/// same column, matching the key-comparison rule used by the B+ tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn encode(&self, field_type: &Type) -> Vec<u8> {
        match (self, field_type) {
            (Value::Null, Type::Bool) => vec![0, 0],
            (Value::Bool(b), Type::Bool) => vec![1, *b as u8],
            (Value::Null, Type::Int64) => {
                let mut v = vec![0];
                v.extend_from_slice(&[0u8; 8]);
                v
            }
            (Value::Int64(i), Type::Int64) => {
                let mut v = vec![1];
                v.extend_from_slice(&i.to_le_bytes());
                v
            }
            (Value::Null, Type::Float64) => {
                let mut v = vec![0];
                v.extend_from_slice(&[0u8; 8]);
                v
            }
            (Value::Float64(f), Type::Float64) => {
                let mut v = vec![1];
                v.extend_from_slice(&f.to_le_bytes());
                v
            }
            (Value::Null, Type::Bytes(len)) => {
                let mut v = vec![0];
                v.extend_from_slice(&vec![0u8; *len as usize]);
                v
            }
            (Value::Bytes(b), Type::Bytes(len)) => {
                assert!(b.len() <= *len as usize, "value exceeds column capacity");
                let mut v = vec![1];
                let mut padded = b.clone();
                padded.resize(*len as usize, 0);
                v.extend_from_slice(&padded);
                v
            }
            _ => panic!("value/type mismatch: {:?} vs {:?}", self, field_type),
        }
    }

    pub fn decode(reader: &mut impl Read, field_type: &Type) -> Self {
        let present = u8::decode_from(reader) == 1;
        match field_type {
            Type::Bool => {
                let b: u8 = read_into(reader);
                if present {
                    Value::Bool(b == 1)
                } else {
                    Value::Null
                }
            }
            Type::Int64 => {
                let i: i64 = read_into(reader);
                if present {
                    Value::Int64(i)
                } else {
                    Value::Null
                }
            }
            Type::Float64 => {
                let f: f64 = read_into(reader);
                if present {
                    Value::Float64(f)
                } else {
                    Value::Null
                }
            }
            Type::Bytes(len) => {
                let mut buf = vec![0u8; *len as usize];
                reader.read_exact(&mut buf).unwrap();
                if present {
                    Value::Bytes(buf)
                } else {
                    Value::Null
                }
            }
        }
    }

    /// null-aware ordering: Null sorts below every other value of the
    /// same column type
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float64(a), Value::Float64(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => panic!("comparing values of different types: {:?} vs {:?}", self, other),
        }
    }
}

/// A record: a fixed-arity tuple of typed values, serialized as the
/// concatenation of each field's tagged encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub fn encode(&self, schema: &Schema) -> Vec<u8> {
        assert_eq!(self.values.len(), schema.fields.len());
        let mut buf = Vec::with_capacity(schema.record_size());
        for (value, field) in self.values.iter().zip(schema.fields.iter()) {
            buf.extend_from_slice(&value.encode(&field.field_type));
        }
        buf
    }

    pub fn decode(bytes: &[u8], schema: &Schema) -> Self {
        let mut reader = std::io::Cursor::new(bytes);
        let values = schema
            .fields
            .iter()
            .map(|f| Value::decode(&mut reader, &f.field_type))
            .collect();
        Self { values }
    }

    pub fn project(&self, indices: &[usize]) -> Tuple {
        Tuple::new(indices.iter().map(|&i| self.values[i].clone()).collect())
    }
}
