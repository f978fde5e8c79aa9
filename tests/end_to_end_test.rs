//! End-to-end query scenarios: these wire together the catalog, planner,
//! heap table, and B+ tree index the way an (out-of-scope) executor
//! would, without actually depending on one. Each test's tiny
//! `run_scan` walks the physical plan the planner produced and answers
//! it directly against storage, so the assertions double as a check
//! that the chosen access path is both selected *and* correct.

use reldb_core::catalog::Catalog;
use reldb_core::planner::ast::{BinaryOperation, Expr, FromTable, Identifier, Select, Statement, Target};
use reldb_core::planner::logical::{logical_plan, Condition, Operand};
use reldb_core::planner::physical::{physical_plan, PhysicalOperator, PhysicalPlan, ScanPath};
use reldb_core::storage::schema::{Field, Schema, Type};
use reldb_core::storage::value::{Tuple, Value};
use reldb_core::storage::{BTreeIndex, Table};
use reldb_core::{Config, Database};
use tempfile::tempdir;

fn eq_select(table: &str, targets: Vec<Target>, column: &str, value: Value) -> Select {
    Select {
        targets,
        from_table: FromTable::Table(Identifier::new(table)),
        where_clause: Some(Expr::Binary(BinaryOperation {
            op: "=".to_string(),
            args: vec![Expr::Identifier(Identifier::new(column)), Expr::Constant(value)],
        })),
        group_by: vec![],
        order_by: None,
    }
}

fn eval(cond: &Condition, tuple: &Tuple, schema: &Schema) -> bool {
    let side = |op: &Operand| -> Value {
        match op {
            Operand::Value(v) => v.clone(),
            Operand::Column(c) => {
                let idx = schema.field_index(&c.column_name).expect("column in schema");
                tuple.get(idx).clone()
            }
        }
    };
    let (l, r) = (side(&cond.left), side(&cond.right));
    match cond.sign.as_str() {
        "=" => l.compare(&r) == std::cmp::Ordering::Equal,
        _ => panic!("test helper only understands ="),
    }
}

fn equality_key_value(cond: &Condition) -> Value {
    match (&cond.left, &cond.right) {
        (Operand::Column(_), Operand::Value(v)) => v.clone(),
        (Operand::Value(v), Operand::Column(_)) => v.clone(),
        _ => panic!("expected exactly one side to be a constant"),
    }
}

/// Executes a `PhysicalOperator::Scan` directly, returning full rows.
/// `CoveredIndexScan` deliberately never calls `table.get_one`: the
/// projected value is read straight out of the index key, which is the
/// entire point of a covering index.
fn run_scan(scan: &ScanPath, table: &Table, index: &mut Option<BTreeIndex>, db: &Database) -> Vec<Tuple> {
    match scan {
        ScanPath::TableScan { condition, .. } => table
            .get_all_locations(db)
            .unwrap()
            .into_iter()
            .filter_map(|loc| table.get_one(db, loc).unwrap())
            .filter(|t| condition.as_ref().map_or(true, |c| eval(c, t, &table.schema)))
            .collect(),
        ScanPath::IndexScan { condition, .. } => {
            let key_value = equality_key_value(condition);
            let key = reldb_core::storage::key::Key::single(key_value);
            index
                .as_mut()
                .expect("index scan requires an index")
                .find(&key)
                .unwrap()
                .into_iter()
                .filter_map(|loc| table.get_one(db, loc).unwrap())
                .collect()
        }
        ScanPath::CoveredIndexScan { condition, .. } => {
            let key_value = equality_key_value(condition);
            let key = reldb_core::storage::key::Key::single(key_value.clone());
            let multiplicity = index.as_mut().expect("covered scan requires an index").find(&key).unwrap().len();
            // no table.get_one call anywhere in this branch: the
            // projected column is exactly the equality key itself.
            (0..multiplicity).map(|_| Tuple::new(vec![key_value.clone()])).collect()
        }
    }
}

fn setup_t_with_index(db: &Database) -> (Table, BTreeIndex, Catalog) {
    let schema = Schema::new(vec![Field::new("a", Type::Int64, true), Field::new("b", Type::Int64, false)]);
    let table = Table::new("t", schema.clone());

    let xid = db.tx_manager.clone().start(db).unwrap();
    for (a, b) in [(1, 10), (2, 20), (1, 11), (3, 30)] {
        table.insert_one(db, xid, &Tuple::new(vec![Value::Int64(a), Value::Int64(b)])).unwrap();
    }
    db.tx_manager.clone().commit(db, xid).unwrap();

    // rebuild the index from the now-committed rows, mirroring what
    // CREATE INDEX does against existing data.
    let mut index = BTreeIndex::open("ix_a", db.index_path("ix_a"), Schema::new(vec![Field::new("a", Type::Int64, true)]), 10, db.config.page_size).unwrap();
    for loc in table.get_all_locations(db).unwrap() {
        let tuple = table.get_one(db, loc).unwrap().unwrap();
        index.insert(reldb_core::storage::key::Key::single(tuple.values[0].clone()), loc).unwrap();
    }

    let mut catalog = Catalog::new();
    catalog.add_table("t", schema);
    catalog.add_index("ix_a", "t", vec!["a".to_string()]);
    (table, index, catalog)
}

/// Insert-then-scan: rows come back in insertion order with no
/// predicate, via a plain `TableScan`.
#[test]
fn s1_insert_then_scan_preserves_insertion_order() {
    let dir = tempdir().unwrap();
    let db = Database::new(dir.path(), Config::small_for_test()).unwrap();
    let schema = Schema::new(vec![Field::new("a", Type::Int64, true), Field::new("b", Type::Int64, false)]);
    let table = Table::new("t", schema.clone());

    let xid = db.tx_manager.clone().start(&db).unwrap();
    for (a, b) in [(1, 2), (3, 4), (5, 6)] {
        table.insert_one(&db, xid, &Tuple::new(vec![Value::Int64(a), Value::Int64(b)])).unwrap();
    }
    db.tx_manager.clone().commit(&db, xid).unwrap();

    let mut catalog = Catalog::new();
    catalog.add_table("t", schema);

    let ast = Select {
        targets: vec![Target::Column(Identifier::new("t.a")), Target::Column(Identifier::new("t.b"))],
        from_table: FromTable::Table(Identifier::new("t")),
        where_clause: None,
        group_by: vec![],
        order_by: None,
    };
    let logical = logical_plan(&Statement::Select(ast), &catalog).unwrap();
    let physical = physical_plan(&logical, &catalog).unwrap();

    let scan = match &physical {
        PhysicalPlan::Query(q) => match &*q.child {
            PhysicalOperator::Scan(s) => s,
            other => panic!("expected Scan, got {:?}", other),
        },
        other => panic!("expected Query, got {:?}", other),
    };
    assert!(matches!(scan, ScanPath::TableScan { .. }));

    let mut no_index = None;
    let rows = run_scan(scan, &table, &mut no_index, &db);
    let pairs: Vec<(i64, i64)> = rows
        .iter()
        .map(|t| match (&t.values[0], &t.values[1]) {
            (Value::Int64(a), Value::Int64(b)) => (*a, *b),
            _ => panic!("expected ints"),
        })
        .collect();
    assert_eq!(pairs, vec![(1, 2), (3, 4), (5, 6)]);
}

/// Index point lookup: `where t.a = 1` against a duplicated-key
/// index returns both matching rows via `IndexScan(ix_a)`.
#[test]
fn s2_index_point_lookup_returns_every_duplicate() {
    let dir = tempdir().unwrap();
    let db = Database::new(dir.path(), Config::small_for_test()).unwrap();
    let (table, index, catalog) = setup_t_with_index(&db);

    let ast = eq_select(
        "t",
        vec![Target::Column(Identifier::new("t.a")), Target::Column(Identifier::new("t.b"))],
        "t.a",
        Value::Int64(1),
    );
    let logical = logical_plan(&Statement::Select(ast), &catalog).unwrap();
    let physical = physical_plan(&logical, &catalog).unwrap();

    let scan = match &physical {
        PhysicalPlan::Query(q) => match &*q.child {
            PhysicalOperator::Scan(s) => s,
            other => panic!("expected Scan, got {:?}", other),
        },
        other => panic!("expected Query, got {:?}", other),
    };
    let index_name = match scan {
        ScanPath::IndexScan { index_name, .. } => index_name.clone(),
        other => panic!("expected IndexScan, got {:?}", other),
    };
    assert_eq!(index_name, "ix_a");

    let mut some_index = Some(index);
    let rows = run_scan(scan, &table, &mut some_index, &db);
    let mut bs: Vec<i64> = rows
        .iter()
        .map(|t| match t.values[1] {
            Value::Int64(b) => b,
            _ => panic!("expected int"),
        })
        .collect();
    bs.sort();
    assert_eq!(bs, vec![10, 11]);
    some_index.unwrap().close().unwrap();
}

/// Covered index: `select t.a from t where t.a = 2` picks
/// `CoveredIndexScan(ix_a)` and answers it without any heap fetch.
#[test]
fn s3_covered_index_scan_answers_without_a_heap_fetch() {
    let dir = tempdir().unwrap();
    let db = Database::new(dir.path(), Config::small_for_test()).unwrap();
    let (table, index, catalog) = setup_t_with_index(&db);

    let ast = eq_select("t", vec![Target::Column(Identifier::new("t.a"))], "t.a", Value::Int64(2));
    let logical = logical_plan(&Statement::Select(ast), &catalog).unwrap();
    let physical = physical_plan(&logical, &catalog).unwrap();

    let scan = match &physical {
        PhysicalPlan::Query(q) => match &*q.child {
            PhysicalOperator::Scan(s) => s,
            other => panic!("expected Scan, got {:?}", other),
        },
        other => panic!("expected Query, got {:?}", other),
    };
    assert!(matches!(scan, ScanPath::CoveredIndexScan { .. }), "expected CoveredIndexScan, got {:?}", scan);

    let mut some_index = Some(index);
    let rows = run_scan(scan, &table, &mut some_index, &db);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values, vec![Value::Int64(2)]);
    some_index.unwrap().close().unwrap();
}

/// Join promotion: `select * from t1, t2 where t1.id = t2.id`
/// rewrites the cross join into an `INNER JOIN` with the predicate
/// attached, rather than leaving a `Filter` above the cross product.
#[test]
fn s5_cross_join_with_equality_predicate_is_promoted_to_inner_join() {
    use reldb_core::planner::ast::{Join, JoinType};
    use reldb_core::planner::logical::JoinType as LogicalJoinType;

    let mut catalog = Catalog::new();
    catalog.add_table("t1", Schema::new(vec![Field::new("id", Type::Int64, true)]));
    catalog.add_table("t2", Schema::new(vec![Field::new("id", Type::Int64, false)]));

    let select = Select {
        targets: vec![Target::Star],
        from_table: FromTable::Join(Box::new(Join {
            left: Identifier::new("t1"),
            right: Identifier::new("t2"),
            join_type: JoinType::Cross,
            condition: None,
        })),
        where_clause: Some(Expr::Binary(BinaryOperation {
            op: "=".to_string(),
            args: vec![Expr::Identifier(Identifier::new("t1.id")), Expr::Identifier(Identifier::new("t2.id"))],
        })),
        group_by: vec![],
        order_by: None,
    };

    let logical = logical_plan(&Statement::Select(select), &catalog).unwrap();
    let physical = physical_plan(&logical, &catalog).unwrap();

    match physical {
        PhysicalPlan::Query(q) => match *q.child {
            PhysicalOperator::Join(join) => {
                assert_eq!(join.join_type, LogicalJoinType::Inner);
                assert!(matches!(*join.left, PhysicalOperator::Scan(ScanPath::TableScan { .. })));
                assert!(matches!(*join.right, PhysicalOperator::Scan(ScanPath::TableScan { .. })));
            }
            other => panic!("expected the cross join promoted to an inner join, got {:?}", other),
        },
        other => panic!("expected Query, got {:?}", other),
    }
}
