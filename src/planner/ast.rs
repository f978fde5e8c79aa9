//! The AST the planner consumes. Building one of these nodes is the
//! lexer/parser's job, out of scope for this crate; the types here
//! are the interface that collaborator is expected to produce.

use crate::storage::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// dotted form as written, e.g. `"t1.name"` or `"name"`
    pub parts: String,
}

impl Identifier {
    pub fn new(parts: &str) -> Self {
        Self {
            parts: parts.to_string(),
        }
    }

    /// splits `"t1.name"` into `("t1", "name")`; `None` when unqualified
    pub fn qualified(&self) -> Option<(&str, &str)> {
        self.parts.split_once('.')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Left,
    Right,
    Inner,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: Identifier,
    pub right: Identifier,
    pub join_type: JoinType,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromTable {
    Table(Identifier),
    Join(Box<Join>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Star,
    Column(Identifier),
    Function(FunctionCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// lower-cased, e.g. `"count"`
    pub op: String,
    pub args: Vec<Expr>,
}

/// `args[0] <op> args[1]`, a comparison or boolean connective
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOperation {
    /// lower-cased, e.g. `"="`, `">"`, `"and"`
    pub op: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(Identifier),
    Constant(Value),
    Binary(BinaryOperation),
    Function(FunctionCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: Identifier,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub targets: Vec<Target>,
    pub from_table: FromTable,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Identifier>,
    pub order_by: Option<OrderBy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: Identifier,
    /// empty means "every column, in catalog order"
    pub columns: Vec<Identifier>,
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: Identifier,
    pub assignments: Vec<(Identifier, Value)>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: Identifier,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub field_type: crate::storage::schema::Type,
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: Identifier,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub index: Identifier,
    pub table: Identifier,
    pub columns: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// upper-cased, e.g. `"EXPLAIN"`
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    Command(Command),
}
