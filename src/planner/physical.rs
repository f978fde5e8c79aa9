//! Physical plan construction: access-path selection over a logical
//! tree. This is the last planner stage — it never touches the
//! catalog's row data, only its index/column metadata, and it never
//! executes anything; the executors that walk this tree are an external
//! collaborator.
//!
//! Recurses the logical tree bottom-up, turning each `Scan` into
//! whichever of `TableScan` / `IndexScan` / `CoveredIndexScan` the
//! left-prefix rule selects, and wrapping `UPDATE`/`DELETE` targets in a
//! `LocationScan` built from the same scan-selection logic.

use crate::catalog::Catalog;
use crate::error::SmallError;
use crate::planner::logical::{
    Condition, DdlOperator, DeleteOperator, GroupOperator, InsertOperator, JoinOperator,
    JoinType, LogicalOperator, LogicalPlan, ProjectColumn, Query, ScanOperator, SortOperator,
    TableColumn, UpdateOperator,
};

/// One scan access path, cases enumerated in order of preference:
/// covered index, index, full table.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanPath {
    TableScan {
        table_name: String,
        condition: Option<Condition>,
    },
    IndexScan {
        index_name: String,
        condition: Condition,
    },
    CoveredIndexScan {
        index_name: String,
        condition: Condition,
    },
}

/// Same access-path enum, used by `UPDATE`/`DELETE` plans where the
/// scan yields locations rather than tuples (`LocationScan` wraps one
/// of these instead of being a distinct variant, since access-path
/// selection for a location scan is identical to a row scan).
pub type LocationScan = ScanPath;

#[derive(Debug, Clone, PartialEq)]
pub struct NestedLoopJoin {
    pub join_type: JoinType,
    pub left_table_name: String,
    pub right_table_name: String,
    pub join_condition: Condition,
    pub left: Box<PhysicalOperator>,
    pub right: Box<PhysicalOperator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub sort_column: TableColumn,
    pub asc: bool,
    pub child: Box<PhysicalOperator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashAgg {
    pub group_by_column: TableColumn,
    pub aggregate_function_name: String,
    pub aggregate_column: TableColumn,
    pub child: Box<PhysicalOperator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalQuery {
    pub project_columns: Vec<ProjectColumn>,
    pub child: Box<PhysicalOperator>,
}

/// The physical plan tree. `Scan` bottoms out a `PhysicalQuery`;
/// `Sort`/`HashAgg`/`Join` wrap a child the same shape as their logical
/// counterparts.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalOperator {
    Scan(ScanPath),
    Sort(Sort),
    HashAgg(HashAgg),
    Join(NestedLoopJoin),
    Query(PhysicalQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalInsert {
    pub table_name: String,
    pub columns: Vec<TableColumn>,
    pub values: Vec<Vec<crate::storage::value::Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalUpdate {
    pub table_name: String,
    pub columns: Vec<TableColumn>,
    pub values: Vec<crate::storage::value::Value>,
    pub child: Box<LocationScan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalDelete {
    pub table_name: String,
    pub child: Box<LocationScan>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalPlan {
    Query(PhysicalQuery),
    Insert(PhysicalInsert),
    Update(PhysicalUpdate),
    Delete(PhysicalDelete),
    Ddl(DdlOperator),
    Command(crate::planner::logical::CommandStatement),
}

pub fn physical_plan(logical: &LogicalPlan, catalog: &Catalog) -> Result<PhysicalPlan, SmallError> {
    match logical {
        LogicalPlan::Query(query) => Ok(PhysicalPlan::Query(implement_query(query, catalog)?)),
        LogicalPlan::Insert(insert) => Ok(PhysicalPlan::Insert(implement_insert(insert))),
        LogicalPlan::Update(update) => Ok(PhysicalPlan::Update(implement_update(update, catalog)?)),
        LogicalPlan::Delete(delete) => Ok(PhysicalPlan::Delete(implement_delete(delete, catalog)?)),
        LogicalPlan::Ddl(ddl) => Ok(PhysicalPlan::Ddl(ddl.clone())),
        LogicalPlan::Command(cmd) => Ok(PhysicalPlan::Command(cmd.clone())),
    }
}

fn implement_query(query: &Query, catalog: &Catalog) -> Result<PhysicalQuery, SmallError> {
    Ok(PhysicalQuery {
        project_columns: query.project_columns.clone(),
        child: Box::new(implement(&query.child, catalog, &query.project_columns)?),
    })
}

/// `projected`: the query's full SELECT-list, carried down to each
/// `Scan` so the covered-index check can compare an
/// index's column list against what this particular table must
/// actually produce, rather than the scan operator's own `columns`
/// field (which the logical builder leaves un-pruned to the table's
/// full schema, per its own "no column pruning" note — fine for
/// existence-checking a `WHERE`/join column, wrong for deciding whether
/// an index covers the query).
fn implement(node: &LogicalOperator, catalog: &Catalog, projected: &[ProjectColumn]) -> Result<PhysicalOperator, SmallError> {
    match node {
        LogicalOperator::Scan(scan) => Ok(PhysicalOperator::Scan(select_access_path(scan, catalog, projected)?)),
        LogicalOperator::Sort(SortOperator { sort_column, asc, child }) => Ok(PhysicalOperator::Sort(Sort {
            sort_column: sort_column.clone(),
            asc: *asc,
            child: Box::new(implement(child, catalog, projected)?),
        })),
        LogicalOperator::Group(GroupOperator {
            group_by_column,
            aggregate_function_name,
            aggregate_column,
            child,
        }) => Ok(PhysicalOperator::HashAgg(HashAgg {
            group_by_column: group_by_column.clone(),
            aggregate_function_name: aggregate_function_name.clone(),
            aggregate_column: aggregate_column.clone(),
            child: Box::new(implement(child, catalog, projected)?),
        })),
        LogicalOperator::Join(JoinOperator {
            join_type,
            left_table_name,
            right_table_name,
            join_condition,
            left,
            right,
        }) => Ok(PhysicalOperator::Join(NestedLoopJoin {
            join_type: *join_type,
            left_table_name: left_table_name.clone(),
            right_table_name: right_table_name.clone(),
            join_condition: join_condition.clone(),
            left: Box::new(implement(left, catalog, projected)?),
            right: Box::new(implement(right, catalog, projected)?),
        })),
        LogicalOperator::Query(query) => Ok(PhysicalOperator::Query(implement_query(query, catalog)?)),
    }
}

/// Access-path selection for a single scan:
/// 1. no predicate, or no index on the table → `TableScan`.
/// 2. enumerate the table's indexes, keep those whose leading columns
///    match the predicate's referenced column (left-prefix rule); none
///    match → `TableScan`.
/// 3. a candidate whose column count equals the scan's own projected
///    column count needs no heap fetch → `CoveredIndexScan`.
/// 4. otherwise the shortest remaining candidate → `IndexScan`.
fn select_access_path(scan: &ScanOperator, catalog: &Catalog, projected: &[ProjectColumn]) -> Result<ScanPath, SmallError> {
    let condition = match &scan.condition {
        Some(c) => c,
        None => {
            return Ok(ScanPath::TableScan {
                table_name: scan.table_name.clone(),
                condition: None,
            })
        }
    };

    let indexes = catalog.indexes_for_table(&scan.table_name);
    if indexes.is_empty() {
        return Ok(ScanPath::TableScan {
            table_name: scan.table_name.clone(),
            condition: Some(condition.clone()),
        });
    }

    let condition_columns: Vec<&TableColumn> = [&condition.left, &condition.right]
        .into_iter()
        .filter_map(|op| op.as_column())
        .collect();
    if condition_columns.len() >= 2 {
        return Err(SmallError::not_implemented(
            "not supported multi-column predicates in access path selection",
        ));
    }
    if condition_columns.is_empty() {
        // e.g. `where 1 > 2`: no column to match against an index leading edge
        return Ok(ScanPath::TableScan {
            table_name: scan.table_name.clone(),
            condition: Some(condition.clone()),
        });
    }

    // left-prefix rule: every referenced column must appear among the
    // index's leading columns (there is only ever one condition column
    // here since multi-column predicates are rejected above, but the
    // membership check generalizes cleanly).
    let candidates: Vec<_> = indexes
        .into_iter()
        .filter(|index| {
            condition_columns
                .iter()
                .all(|c| index.columns.iter().any(|ic| ic == &c.column_name))
        })
        .collect();

    if candidates.is_empty() {
        return Ok(ScanPath::TableScan {
            table_name: scan.table_name.clone(),
            condition: Some(condition.clone()),
        });
    }

    let projected_column_count = projected
        .iter()
        .filter(|p| matches!(p, ProjectColumn::Table(c) if c.table_name == scan.table_name))
        .count();
    if let Some(covering) = candidates.iter().find(|index| index.columns.len() == projected_column_count) {
        return Ok(ScanPath::CoveredIndexScan {
            index_name: covering.name.clone(),
            condition: condition.clone(),
        });
    }

    let shortest = candidates
        .iter()
        .min_by_key(|index| index.columns.len())
        .expect("candidates is non-empty");

    Ok(ScanPath::IndexScan {
        index_name: shortest.name.clone(),
        condition: condition.clone(),
    })
}

fn implement_insert(insert: &InsertOperator) -> PhysicalInsert {
    PhysicalInsert {
        table_name: insert.table_name.clone(),
        columns: insert.columns.clone(),
        values: insert.values.clone(),
    }
}

/// Reuses `select_access_path` against a synthetic scan over every
/// column of the table: constructing a throwaway `ScanOperator` lets
/// `UPDATE`/`DELETE` share the same access-path selection logic as
/// `SELECT` instead of duplicating it.
fn location_scan_for(table_name: &str, condition: &Option<Condition>, catalog: &Catalog) -> Result<LocationScan, SmallError> {
    let columns = catalog
        .get_table(table_name)
        .map(|t| t.schema.column_names())
        .unwrap_or_default();
    // a location scan has no projection of its own: it reads the whole
    // row's location regardless, so "every column" stands in for the
    // projected list when judging whether an index covers it.
    let all_columns: Vec<ProjectColumn> = columns
        .iter()
        .map(|c| ProjectColumn::Table(TableColumn::new(table_name, c)))
        .collect();
    let synthetic_scan = ScanOperator {
        table_name: table_name.to_string(),
        columns,
        condition: condition.clone(),
    };
    select_access_path(&synthetic_scan, catalog, &all_columns)
}

fn implement_update(update: &UpdateOperator, catalog: &Catalog) -> Result<PhysicalUpdate, SmallError> {
    Ok(PhysicalUpdate {
        table_name: update.table_name.clone(),
        columns: update.columns.clone(),
        values: update.values.clone(),
        child: Box::new(location_scan_for(&update.table_name, &update.condition, catalog)?),
    })
}

fn implement_delete(delete: &DeleteOperator, catalog: &Catalog) -> Result<PhysicalDelete, SmallError> {
    Ok(PhysicalDelete {
        table_name: delete.table_name.clone(),
        child: Box::new(location_scan_for(&delete.table_name, &delete.condition, catalog)?),
    })
}
