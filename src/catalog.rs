use std::collections::HashMap;

use crate::storage::Schema;

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub schema: Schema,
}

#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    pub table: String,
    /// leading-prefix ordered column list; the planner applies the
    /// left-prefix rule against this.
    pub columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub is_aggregate: bool,
}

/// Minimal in-process implementation of the catalog interface the
/// planner consumes: a queryable collection of table, index, and
/// function rows. Deliberately out of scope as a subsystem in its own
/// right (a production deployment may swap in a richer catalog behind
/// the same queries) but a core this complete needs *something* behind
/// the planner to drive tests and the demo binary.
pub struct Catalog {
    tables: HashMap<String, TableInfo>,
    indexes: HashMap<String, IndexInfo>,
    functions: HashMap<String, FunctionInfo>,
}

impl Catalog {
    pub fn new() -> Self {
        let mut functions = HashMap::new();
        for name in ["count", "sum", "avg", "min", "max"] {
            functions.insert(
                name.to_string(),
                FunctionInfo {
                    name: name.to_string(),
                    is_aggregate: true,
                },
            );
        }

        Self {
            tables: HashMap::new(),
            indexes: HashMap::new(),
            functions,
        }
    }

    pub fn add_table(&mut self, name: &str, schema: Schema) {
        self.tables.insert(
            name.to_string(),
            TableInfo {
                name: name.to_string(),
                schema,
            },
        );
    }

    pub fn add_index(&mut self, name: &str, table: &str, columns: Vec<String>) {
        self.indexes.insert(
            name.to_string(),
            IndexInfo {
                name: name.to_string(),
                table: table.to_string(),
                columns,
            },
        );
    }

    pub fn get_table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    pub fn get_index(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes.get(name)
    }

    pub fn indexes_for_table(&self, table: &str) -> Vec<&IndexInfo> {
        self.indexes.values().filter(|i| i.table == table).collect()
    }

    pub fn get_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(name)
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn column_exists(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .map(|t| t.schema.field_index(column).is_some())
            .unwrap_or(false)
    }

    pub fn function_exists(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
