//! Logical plan construction: AST → a fixed-order builder pass,
//! followed by a root-down rewrite that pushes the `WHERE` filter into
//! either a join promotion or a scan.
//!
//! Clauses are gathered into a [`QueryBuilder`] and the immutable tree
//! is assembled in one pass at the end, rather than grown clause by
//! clause with parent pointers rewritten in place: two phases
//! (`transform` then `rewrite`), no parent-pointer bookkeeping.

use crate::catalog::Catalog;
use crate::error::SmallError;
use crate::planner::ast::{
    self, BinaryOperation, CreateIndex, CreateTable, Delete, Expr, FromTable, Insert, Select,
    Statement, Target, Update,
};
use crate::storage::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableColumn {
    pub table_name: String,
    pub column_name: String,
}

impl TableColumn {
    pub fn new(table_name: &str, column_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionColumn {
    pub function_name: String,
    pub args: Vec<TableColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectColumn {
    Table(TableColumn),
    Function(FunctionColumn),
}

/// one side of a [`Condition`]: either a column reference or a literal
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(TableColumn),
    Value(Value),
}

impl Operand {
    pub fn as_column(&self) -> Option<&TableColumn> {
        match self {
            Operand::Column(c) => Some(c),
            Operand::Value(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub sign: String,
    pub left: Operand,
    pub right: Operand,
}

impl Condition {
    fn from_binary(op: &BinaryOperation) -> Result<Self, SmallError> {
        if op.args.len() != 2 {
            return Err(SmallError::not_implemented(
                "only supports a single binary condition",
            ));
        }
        Ok(Condition {
            sign: op.op.clone(),
            left: to_operand(&op.args[0])?,
            right: to_operand(&op.args[1])?,
        })
    }

    fn from_expr(expr: &Expr) -> Result<Self, SmallError> {
        match expr {
            Expr::Binary(op) => Condition::from_binary(op),
            _ => Err(SmallError::input("where clause must be a binary condition")),
        }
    }

    fn columns(&self) -> Vec<&TableColumn> {
        [&self.left, &self.right]
            .into_iter()
            .filter_map(Operand::as_column)
            .collect()
    }
}

fn to_operand(expr: &Expr) -> Result<Operand, SmallError> {
    match expr {
        Expr::Identifier(ident) => {
            let (table_name, column) = ident
                .qualified()
                .ok_or_else(|| SmallError::input("not set a table name in the condition"))?;
            Ok(Operand::Column(TableColumn::new(table_name, column)))
        }
        Expr::Constant(v) => Ok(Operand::Value(v.clone())),
        _ => Err(SmallError::input("condition operand must be a column or a constant")),
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

impl From<ast::JoinType> for JoinType {
    fn from(t: ast::JoinType) -> Self {
        match t {
            ast::JoinType::Left => JoinType::Left,
            ast::JoinType::Right => JoinType::Right,
            ast::JoinType::Inner => JoinType::Inner,
            ast::JoinType::Full => JoinType::Full,
            ast::JoinType::Cross => JoinType::Cross,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOperator {
    pub table_name: String,
    pub columns: Vec<String>,
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortOperator {
    pub sort_column: TableColumn,
    pub asc: bool,
    pub child: Box<LogicalOperator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupOperator {
    pub group_by_column: TableColumn,
    pub aggregate_function_name: String,
    pub aggregate_column: TableColumn,
    pub child: Box<LogicalOperator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOperator {
    pub join_type: JoinType,
    pub left_table_name: String,
    pub right_table_name: String,
    pub join_condition: Condition,
    pub left: Box<LogicalOperator>,
    pub right: Box<LogicalOperator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub query_type: QueryType,
    pub project_columns: Vec<ProjectColumn>,
    pub child: Box<LogicalOperator>,
}

/// the finished logical tree for a `SELECT`. `Filter` never appears here:
/// the rewrite pass always dissolves it into a join promotion, a scan's
/// `condition`, or drops it when neither side references a column.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalOperator {
    Scan(ScanOperator),
    Sort(SortOperator),
    Group(GroupOperator),
    Join(JoinOperator),
    Query(Query),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOperator {
    pub table_name: String,
    pub columns: Vec<TableColumn>,
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOperator {
    pub table_name: String,
    pub columns: Vec<TableColumn>,
    pub values: Vec<Value>,
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOperator {
    pub table_name: String,
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DdlOperator {
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandStatement {
    pub command: String,
    pub args: Vec<String>,
}

/// every statement the planner can turn into a logical plan
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    Query(Query),
    Insert(InsertOperator),
    Update(UpdateOperator),
    Delete(DeleteOperator),
    Ddl(DdlOperator),
    Command(CommandStatement),
}

pub fn logical_plan(ast: &Statement, catalog: &Catalog) -> Result<LogicalPlan, SmallError> {
    match ast {
        Statement::Select(select) => Ok(LogicalPlan::Query(transform_select(select, catalog)?)),
        Statement::Insert(insert) => Ok(LogicalPlan::Insert(transform_insert(insert, catalog)?)),
        Statement::Update(update) => Ok(LogicalPlan::Update(transform_update(update, catalog)?)),
        Statement::Delete(delete) => Ok(LogicalPlan::Delete(transform_delete(delete, catalog)?)),
        Statement::CreateTable(ct) => Ok(LogicalPlan::Ddl(DdlOperator::CreateTable(ct.clone()))),
        Statement::CreateIndex(ci) => Ok(LogicalPlan::Ddl(DdlOperator::CreateIndex(ci.clone()))),
        Statement::Command(cmd) => Ok(LogicalPlan::Command(CommandStatement {
            command: cmd.command.clone(),
            args: cmd.args.clone(),
        })),
    }
}

/// the mutable clause-by-clause accumulator the builder fills in before
/// `rewrite` assembles the final immutable tree.
struct QueryBuilder {
    project_columns: Vec<ProjectColumn>,
    scan_operators: Vec<ScanOperator>,
    where_condition: Option<Condition>,
    join: Option<(JoinType, String, String, Condition)>,
    sort: Option<(TableColumn, bool)>,
    group_by_column: Option<TableColumn>,
    aggregate_columns: Vec<FunctionColumn>,
}

fn transform_select(ast: &Select, catalog: &Catalog) -> Result<Query, SmallError> {
    let mut builder = QueryBuilder {
        project_columns: Vec::new(),
        scan_operators: Vec::new(),
        where_condition: None,
        join: None,
        sort: None,
        group_by_column: None,
        aggregate_columns: Vec::new(),
    };

    from_clause(ast, catalog, &mut builder)?;
    target_list(ast, catalog, &mut builder)?;
    where_clause(ast, &mut builder)?;
    join_clause(ast, catalog, &mut builder)?;
    order_clause(ast, catalog, &mut builder)?;
    group_clause(ast, catalog, &mut builder)?;

    rewrite(builder)
}

fn from_clause(ast: &Select, catalog: &Catalog, builder: &mut QueryBuilder) -> Result<(), SmallError> {
    let table_names: Vec<&str> = match &ast.from_table {
        FromTable::Table(id) => vec![id.parts.as_str()],
        FromTable::Join(join) => vec![join.left.parts.as_str(), join.right.parts.as_str()],
    };

    for table_name in table_names {
        let table = catalog
            .get_table(table_name)
            .ok_or_else(|| SmallError::input(&format!("not found table {}", table_name)))?;
        builder.scan_operators.push(ScanOperator {
            table_name: table_name.to_string(),
            columns: table.schema.column_names(),
            condition: None,
        });
    }
    Ok(())
}

fn target_list(ast: &Select, catalog: &Catalog, builder: &mut QueryBuilder) -> Result<(), SmallError> {
    for target in &ast.targets {
        match target {
            Target::Star => {
                for scan in &builder.scan_operators {
                    let table = catalog.get_table(&scan.table_name).ok_or_else(|| {
                        SmallError::input(&format!("not found table {}", scan.table_name))
                    })?;
                    for column in table.schema.column_names() {
                        builder
                            .project_columns
                            .push(ProjectColumn::Table(TableColumn::new(&scan.table_name, &column)));
                    }
                }
            }
            Target::Column(ident) => {
                let (table_name, column) = ident
                    .qualified()
                    .ok_or_else(|| SmallError::input("please set a specific table name."))?;
                if !catalog.column_exists(table_name, column) {
                    return Err(SmallError::input(&format!("not found {}.", ident.parts)));
                }
                builder
                    .project_columns
                    .push(ProjectColumn::Table(TableColumn::new(table_name, column)));
            }
            Target::Function(call) => {
                let mut args = Vec::new();
                for arg in &call.args {
                    let ident = match arg {
                        Expr::Identifier(id) => id,
                        _ => return Err(SmallError::input("function argument must be a column")),
                    };
                    let (table_name, column) = ident
                        .qualified()
                        .ok_or_else(|| SmallError::input("please set a specific table name."))?;
                    if !catalog.column_exists(table_name, column) {
                        return Err(SmallError::input(&format!("not found {}.", ident.parts)));
                    }
                    args.push(TableColumn::new(table_name, column));
                }
                if !catalog.function_exists(&call.op) {
                    return Err(SmallError::input(&format!("not found {}.", call.op)));
                }
                builder.project_columns.push(ProjectColumn::Function(FunctionColumn {
                    function_name: call.op.clone(),
                    args,
                }));
            }
        }
    }
    Ok(())
}

fn where_clause(ast: &Select, builder: &mut QueryBuilder) -> Result<(), SmallError> {
    let Some(expr) = &ast.where_clause else {
        return Ok(());
    };
    let condition = Condition::from_expr(expr)?;
    for column in condition.columns() {
        // validated against every scan operator's table, not just one,
        // since the condition may reference either side of a join
        let known = builder.scan_operators.iter().any(|s| s.table_name == column.table_name)
            && table_column_exists(builder, column);
        if !known {
            return Err(SmallError::input(&format!(
                "not found table column {}.{}",
                column.table_name, column.column_name
            )));
        }
    }
    builder.where_condition = Some(condition);
    Ok(())
}

/// the scan operators already carry a table's full unpruned column list
/// (no column pruning here, todo), so column existence is just membership.
fn table_column_exists(builder: &QueryBuilder, column: &TableColumn) -> bool {
    builder
        .scan_operators
        .iter()
        .any(|s| s.table_name == column.table_name && s.columns.contains(&column.column_name))
}

fn join_clause(ast: &Select, catalog: &Catalog, builder: &mut QueryBuilder) -> Result<(), SmallError> {
    let FromTable::Join(join_ast) = &ast.from_table else {
        return Ok(());
    };

    let left_table_name = join_ast.left.parts.clone();
    let right_table_name = join_ast.right.parts.clone();
    if !catalog.table_exists(&left_table_name) {
        return Err(SmallError::input(&format!("not found the table {}.", left_table_name)));
    }
    if !catalog.table_exists(&right_table_name) {
        return Err(SmallError::input(&format!("not found the table {}.", right_table_name)));
    }

    let condition_expr = join_ast
        .condition
        .as_ref()
        .ok_or_else(|| SmallError::input("join requires a condition"))?;
    let join_condition = Condition::from_expr(condition_expr)?;
    for column in join_condition.columns() {
        if !catalog.column_exists(&column.table_name, &column.column_name) {
            return Err(SmallError::input(&format!(
                "not found the column {}.{}",
                column.table_name, column.column_name
            )));
        }
    }

    builder.join = Some((join_ast.join_type.into(), left_table_name, right_table_name, join_condition));
    Ok(())
}

fn order_clause(ast: &Select, catalog: &Catalog, builder: &mut QueryBuilder) -> Result<(), SmallError> {
    let Some(order_by) = &ast.order_by else {
        return Ok(());
    };
    let (table_name, column) = order_by
        .column
        .qualified()
        .ok_or_else(|| SmallError::input(&format!("please set a table name for the column {}", order_by.column.parts)))?;
    if !catalog.column_exists(table_name, column) {
        return Err(SmallError::input(&format!("not found the column {}", order_by.column.parts)));
    }
    builder.sort = Some((
        TableColumn::new(table_name, column),
        order_by.direction == ast::Direction::Asc,
    ));
    Ok(())
}

fn group_clause(ast: &Select, catalog: &Catalog, builder: &mut QueryBuilder) -> Result<(), SmallError> {
    if ast.group_by.is_empty() {
        return Ok(());
    }
    if ast.group_by.len() != 1 {
        return Err(SmallError::not_implemented("only supported one column for the group by clause."));
    }
    let ident = &ast.group_by[0];
    let (table_name, column) = ident
        .qualified()
        .ok_or_else(|| SmallError::input(&format!("please set a table name for the column {}", ident.parts)))?;
    if !catalog.column_exists(table_name, column) {
        return Err(SmallError::input(&format!("not found the column {}", ident.parts)));
    }
    builder.group_by_column = Some(TableColumn::new(table_name, column));

    for column in &builder.project_columns {
        if let ProjectColumn::Function(f) = column {
            if catalog.get_function(&f.function_name).map(|i| i.is_aggregate).unwrap_or(false) {
                builder.aggregate_columns.push(f.clone());
            }
        }
    }
    if builder.aggregate_columns.len() > 1 {
        return Err(SmallError::not_implemented("not supported one more aggregation functions."));
    }
    if let Some(agg) = builder.aggregate_columns.first() {
        if agg.args.len() != 1 {
            return Err(SmallError::not_implemented(&format!(
                "aggregation function {} must have one column.",
                agg.function_name
            )));
        }
    }
    Ok(())
}

/// root-down filter pushdown, then tree assembly in `Query → Group →
/// Sort → Join → Scan(s)` order.
fn rewrite(mut builder: QueryBuilder) -> Result<Query, SmallError> {
    if let (Some(where_condition), Some((join_type, left_table_name, right_table_name, join_condition))) =
        (builder.where_condition.clone(), builder.join.clone())
    {
        let left_col = where_condition.left.as_column();
        let right_col = where_condition.right.as_column();
        if let (Some(l), Some(r)) = (left_col, right_col) {
            // case 1: both sides are columns from the joined tables — promote
            // a cross join to an inner join with the filter as its condition
            let tables = [left_table_name.as_str(), right_table_name.as_str()];
            if !tables.contains(&l.table_name.as_str()) || !tables.contains(&r.table_name.as_str()) {
                return Err(SmallError::input(
                    "tables in where clause should be all seen in the join clause.",
                ));
            }
            if join_type != JoinType::Cross {
                return Err(SmallError::not_implemented("not supported complex where clause."));
            }
            builder.join = Some((JoinType::Inner, left_table_name, right_table_name, where_condition));
        } else if let Some(col) = left_col.or(right_col) {
            // case 2: pushed down into the matching scan operator
            if let Some(scan) = builder.scan_operators.iter_mut().find(|s| s.table_name == col.table_name) {
                scan.condition = Some(where_condition);
            }
        }
        // case 3 (neither side names a column, e.g. `where 1 > 2`): no-op,
        // constant-folding a predicate like this is not implemented
    } else if let Some(where_condition) = builder.where_condition.clone() {
        let left_col = where_condition.left.as_column();
        let right_col = where_condition.right.as_column();
        if let Some(col) = left_col.or(right_col) {
            if let Some(scan) = builder.scan_operators.iter_mut().find(|s| s.table_name == col.table_name) {
                scan.condition = Some(where_condition);
            }
        }
    }

    let join_node = match builder.join {
        Some((join_type, left_table_name, right_table_name, join_condition)) => {
            let mut remaining = builder.scan_operators;
            let left_idx = remaining
                .iter()
                .position(|s| s.table_name == left_table_name)
                .ok_or_else(|| SmallError::logical("join: left scan operator not found"))?;
            let left_scan = remaining.remove(left_idx);
            let right_idx = remaining
                .iter()
                .position(|s| s.table_name == right_table_name)
                .ok_or_else(|| SmallError::logical("join: right scan operator not found"))?;
            let right_scan = remaining.remove(right_idx);

            LogicalOperator::Join(JoinOperator {
                join_type,
                left_table_name,
                right_table_name,
                join_condition,
                left: Box::new(LogicalOperator::Scan(left_scan)),
                right: Box::new(LogicalOperator::Scan(right_scan)),
            })
        }
        None => {
            if builder.scan_operators.len() != 1 {
                return Err(SmallError::input("multi-table FROM requires a join condition"));
            }
            LogicalOperator::Scan(builder.scan_operators.remove(0))
        }
    };

    let mut node = join_node;
    if let Some((sort_column, asc)) = builder.sort {
        node = LogicalOperator::Sort(SortOperator {
            sort_column,
            asc,
            child: Box::new(node),
        });
    }
    if let Some(group_by_column) = builder.group_by_column {
        let agg = builder
            .aggregate_columns
            .first()
            .ok_or_else(|| SmallError::input("group by requires an aggregate function in the target list"))?;
        node = LogicalOperator::Group(GroupOperator {
            group_by_column,
            aggregate_function_name: agg.function_name.clone(),
            aggregate_column: agg.args[0].clone(),
            child: Box::new(node),
        });
    }

    Ok(Query {
        query_type: QueryType::Select,
        project_columns: builder.project_columns,
        child: Box::new(node),
    })
}

fn transform_insert(ast: &Insert, catalog: &Catalog) -> Result<InsertOperator, SmallError> {
    let table_name = &ast.table.parts;
    let table = catalog
        .get_table(table_name)
        .ok_or_else(|| SmallError::input(&format!("not found the table {}.", table_name)))?;

    let columns: Vec<String> = if ast.columns.is_empty() {
        table.schema.column_names()
    } else {
        ast.columns.iter().map(|c| c.parts.clone()).collect()
    };
    for column in &columns {
        if !catalog.column_exists(table_name, column) {
            return Err(SmallError::input(&format!("not found the column {}.", column)));
        }
    }

    Ok(InsertOperator {
        table_name: table_name.clone(),
        columns: columns.iter().map(|c| TableColumn::new(table_name, c)).collect(),
        values: ast.values.clone(),
    })
}

fn transform_update(ast: &Update, catalog: &Catalog) -> Result<UpdateOperator, SmallError> {
    let table_name = &ast.table.parts;
    if !catalog.table_exists(table_name) {
        return Err(SmallError::input(&format!("not found the table {}.", table_name)));
    }

    let mut columns = Vec::with_capacity(ast.assignments.len());
    let mut values = Vec::with_capacity(ast.assignments.len());
    for (ident, value) in &ast.assignments {
        let column = match ident.qualified() {
            Some((t, c)) => {
                if t != table_name {
                    return Err(SmallError::input(&format!("cannot match the table {}.", t)));
                }
                c.to_string()
            }
            None => ident.parts.clone(),
        };
        if !catalog.column_exists(table_name, &column) {
            return Err(SmallError::input(&format!("not found the column {}.", column)));
        }
        columns.push(TableColumn::new(table_name, &column));
        values.push(value.clone());
    }

    let condition = ast.where_clause.as_ref().map(Condition::from_expr).transpose()?;
    if let Some(condition) = &condition {
        for column in condition.columns() {
            if !catalog.column_exists(&column.table_name, &column.column_name) {
                return Err(SmallError::input(&format!(
                    "not found the table column {}.{}",
                    column.table_name, column.column_name
                )));
            }
        }
    }

    Ok(UpdateOperator {
        table_name: table_name.clone(),
        columns,
        values,
        condition,
    })
}

fn transform_delete(ast: &Delete, catalog: &Catalog) -> Result<DeleteOperator, SmallError> {
    let table_name = &ast.table.parts;
    if !catalog.table_exists(table_name) {
        return Err(SmallError::input(&format!("not found the table {}.", table_name)));
    }
    let condition = ast.where_clause.as_ref().map(Condition::from_expr).transpose()?;
    if let Some(condition) = &condition {
        for column in condition.columns() {
            if !catalog.column_exists(&column.table_name, &column.column_name) {
                return Err(SmallError::input(&format!(
                    "not found the table column {}.{}",
                    column.table_name, column.column_name
                )));
            }
        }
    }
    Ok(DeleteOperator {
        table_name: table_name.clone(),
        condition,
    })
}
