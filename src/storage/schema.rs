use crate::util::{Decodeable, Encodeable};

/// Column type tag. Mirrors the tag-byte scheme used for value encoding:
/// `0` = Bool, `1` = Int64, `2` = Float64, `3` = Bytes(len).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Bool,
    Int64,
    Float64,
    /// fixed-capacity byte string; `len` bounds the stored payload so a
    /// record's on-disk width is static per schema
    Bytes(u8),
}

impl Type {
    /// encoded width in bytes, tag byte included
    pub fn size(&self) -> usize {
        match self {
            Type::Bool => 2,
            Type::Int64 => 9,
            Type::Float64 => 9,
            Type::Bytes(len) => 2 + *len as usize,
        }
    }
}

impl Encodeable for Type {
    fn encode(&self) -> Vec<u8> {
        match self {
            Type::Bool => vec![0, 1],
            Type::Int64 => vec![1, 8],
            Type::Float64 => vec![2, 8],
            Type::Bytes(len) => vec![3, *len],
        }
    }
}

impl Decodeable for Type {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let tag = u8::decode_from(reader);
        let len = u8::decode_from(reader);
        match tag {
            0 => Type::Bool,
            1 => Type::Int64,
            2 => Type::Float64,
            3 => Type::Bytes(len),
            _ => panic!("unknown type tag: {}", tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: Type,
    pub is_primary_key: bool,
}

impl Field {
    pub fn new(name: &str, field_type: Type, is_primary_key: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            is_primary_key,
        }
    }
}

/// A table's column list. Identifies columns by position; the planner
/// and catalog are responsible for name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// fixed width of one encoded record under this schema
    pub fn record_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.size()).sum()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}
