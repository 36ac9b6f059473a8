//! The plan walker. Relations are materialized as column-addressed value
//! grids; joins and aggregates are straightforward nested-loop and
//! hash-group implementations — plans are rule-based and there is no
//! cost model to please.

use crate::db::table::Row;
use crate::db::{Database, Transaction};
use crate::error::{DBError, DatabaseError, PlanError, TableError};
use crate::sql::planner::{PlanNode, QueryPlan};
use flintdb_sql_parser::ast::{AlterAction, BinaryOperator, Expr, JoinType, OrderByExpr};
use flintdb_types::{TableSchema, Value, ValueError};
use flintdb_wal::{LogEntry, OpCode, Wal};
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Transactional envelope for mutating plans: mutations are recorded on the
/// transaction and, when a WAL is attached, logged with before/after images.
pub struct TxContext<'a> {
    pub tx: &'a Transaction,
    pub wal: Option<&'a Wal>,
}

impl TxContext<'_> {
    fn log(&self, entry: LogEntry) -> Result<(), DBError> {
        if let Some(wal) = self.wal {
            let mut entry = entry;
            wal.write(&mut entry)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: u64,
}

/// A column address inside an intermediate relation. Computed columns
/// (aggregates) carry an empty qualifier and their display string as name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnId {
    qualifier: String,
    name: String,
}

#[derive(Debug, Clone)]
struct Relation {
    columns: Vec<ColumnId>,
    rows: Vec<Vec<Value>>,
}

pub fn execute(db: &Database, plan: &QueryPlan, ctx: Option<&TxContext>) -> Result<QueryResult, DBError> {
    match &plan.root {
        PlanNode::Insert {
            table,
            columns,
            values,
        } => exec_insert(db, table, columns, values, ctx),
        PlanNode::Update {
            table,
            assignments,
            predicate,
        } => exec_update(db, table, assignments, predicate.as_ref(), ctx),
        PlanNode::Delete { table, predicate } => exec_delete(db, table, predicate.as_ref(), ctx),
        PlanNode::CreateTable { schema } => {
            db.create_table(&schema.table_name, schema.clone())?;
            Ok(QueryResult::default())
        }
        PlanNode::DropTable { table } => {
            db.drop_table(table)?;
            Ok(QueryResult::default())
        }
        PlanNode::AlterTable { table, action } => {
            let t = db.get_table(table)?;
            match action {
                AlterAction::AddColumn(column) => t.add_column(column.clone())?,
                AlterAction::DropColumn(name) => t.drop_column(name)?,
            }
            if let Some(ctx) = ctx {
                // Older after-images in the log no longer decode against the
                // new schema; re-log every rewritten row so recovery can
                // rebuild from the current generation.
                ctx.tx.mark_table_modified(table);
                for row in t.select(None::<fn(&Row) -> bool>)? {
                    ctx.log(
                        LogEntry::new(ctx.tx.id(), OpCode::Update, table)
                            .with_row(row.id)
                            .with_after_image(row.to_bytes()?),
                    )?;
                }
            }
            Ok(QueryResult::default())
        }
        root => {
            let relation = eval_select(db, root)?;
            Ok(QueryResult {
                columns: relation.columns.into_iter().map(|c| c.name).collect(),
                rows: relation.rows,
                rows_affected: 0,
            })
        }
    }
}

// ---- SELECT pipeline ------------------------------------------------------

/// Walk the fixed Project(Limit?(Sort?(Aggregate?(base)))) shape the planner
/// emits. Aggregation rewrites the relation to group columns plus one
/// computed column per aggregate expression referenced anywhere above it.
fn eval_select(db: &Database, root: &PlanNode) -> Result<Relation, DBError> {
    let PlanNode::Project {
        columns,
        distinct,
        input,
    } = root
    else {
        return Err(PlanError::Unsupported(format!("unexpected plan root {root:?}")).into());
    };

    let mut node: &PlanNode = input;
    let mut limit = None;
    if let PlanNode::Limit {
        limit: n,
        offset,
        input,
    } = node
    {
        limit = Some((*n, *offset));
        node = input;
    }
    let mut order_by: Option<&[OrderByExpr]> = None;
    if let PlanNode::Sort { order_by: o, input } = node {
        order_by = Some(o.as_slice());
        node = input;
    }
    let mut grouping: Option<(&[Expr], Option<&Expr>)> = None;
    if let PlanNode::Aggregate {
        group_by,
        having,
        input,
    } = node
    {
        grouping = Some((group_by.as_slice(), having.as_ref()));
        node = input;
    }

    let mut relation = eval_base(db, node)?;

    // Aggregate expressions referenced anywhere above the base relation.
    let mut aggregates = Vec::new();
    for expr in columns {
        collect_aggregates(expr, &mut aggregates);
    }
    if let Some(order_by) = order_by {
        for order in order_by {
            collect_aggregates(&order.expr, &mut aggregates);
        }
    }
    if let Some((_, Some(having))) = grouping {
        collect_aggregates(having, &mut aggregates);
    }

    if grouping.is_some() || !aggregates.is_empty() {
        let (group_by, having) = grouping.unwrap_or((&[], None));
        relation = aggregate(&relation, group_by, having, &aggregates)?;
    }

    if let Some(order_by) = order_by {
        sort_relation(&mut relation, order_by)?;
    }
    if let Some((limit, offset)) = limit {
        apply_limit(&mut relation, limit, offset);
    }
    project(relation, columns, *distinct)
}

/// Scan / Join / Filter sub-tree evaluation.
fn eval_base(db: &Database, node: &PlanNode) -> Result<Relation, DBError> {
    match node {
        PlanNode::Scan { table } => scan_table(db, table, table),
        PlanNode::Filter { predicate, input } => {
            let relation = eval_base(db, input)?;
            let mut rows = Vec::with_capacity(relation.rows.len());
            for row in relation.rows {
                if eval_predicate(predicate, &relation.columns, &row)? {
                    rows.push(row);
                }
            }
            Ok(Relation {
                columns: relation.columns,
                rows,
            })
        }
        PlanNode::Join {
            join_type,
            table,
            alias,
            on,
            input,
        } => {
            let left = eval_base(db, input)?;
            let qualifier = alias.as_deref().unwrap_or(table);
            let right = scan_table(db, table, qualifier)?;
            join(left, right, *join_type, on.as_ref())
        }
        other => Err(PlanError::Unsupported(format!("unexpected plan node {other:?}")).into()),
    }
}

fn table_columns(schema: &TableSchema, qualifier: &str) -> Vec<ColumnId> {
    schema
        .columns
        .iter()
        .map(|c| ColumnId {
            qualifier: qualifier.to_owned(),
            name: c.col_name.clone(),
        })
        .collect()
}

fn scan_table(db: &Database, table: &str, qualifier: &str) -> Result<Relation, DBError> {
    let t = db.get_table(table)?;
    let schema = t.schema();
    let rows = t
        .select(None::<fn(&Row) -> bool>)?
        .into_iter()
        .map(|r| r.values)
        .collect();
    Ok(Relation {
        columns: table_columns(&schema, qualifier),
        rows,
    })
}

fn join(
    left: Relation,
    right: Relation,
    join_type: JoinType,
    on: Option<&Expr>,
) -> Result<Relation, DBError> {
    let mut columns = left.columns.clone();
    columns.extend(right.columns.clone());

    let matches = |l: &[Value], r: &[Value]| -> Result<bool, DBError> {
        let mut combined = l.to_vec();
        combined.extend_from_slice(r);
        match on {
            Some(on) => eval_predicate(on, &columns, &combined),
            None => Ok(true),
        }
    };

    let mut rows = Vec::new();
    match join_type {
        JoinType::Inner | JoinType::Cross => {
            for l in &left.rows {
                for r in &right.rows {
                    if join_type == JoinType::Cross || matches(l, r)? {
                        let mut combined = l.clone();
                        combined.extend(r.iter().cloned());
                        rows.push(combined);
                    }
                }
            }
        }
        JoinType::Left => {
            for l in &left.rows {
                let mut matched = false;
                for r in &right.rows {
                    if matches(l, r)? {
                        let mut combined = l.clone();
                        combined.extend(r.iter().cloned());
                        rows.push(combined);
                        matched = true;
                    }
                }
                if !matched {
                    let mut combined = l.clone();
                    combined.extend(std::iter::repeat_n(Value::Null, right.columns.len()));
                    rows.push(combined);
                }
            }
        }
        JoinType::Right => {
            for r in &right.rows {
                let mut matched = false;
                for l in &left.rows {
                    if matches(l, r)? {
                        let mut combined = l.clone();
                        combined.extend(r.iter().cloned());
                        rows.push(combined);
                        matched = true;
                    }
                }
                if !matched {
                    let mut combined: Vec<Value> =
                        std::iter::repeat_n(Value::Null, left.columns.len()).collect();
                    combined.extend(r.iter().cloned());
                    rows.push(combined);
                }
            }
        }
    }
    Ok(Relation { columns, rows })
}

// ---- Aggregation ----------------------------------------------------------

fn is_aggregate_function(name: &str) -> bool {
    matches!(
        name.to_ascii_uppercase().as_str(),
        "COUNT" | "SUM" | "AVG" | "MIN" | "MAX"
    )
}

fn collect_aggregates(expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Function { name, .. } if is_aggregate_function(name) => {
            if !out.iter().any(|e| e.to_string() == expr.to_string()) {
                out.push(expr.clone());
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_aggregates(left, out);
            collect_aggregates(right, out);
        }
        Expr::IsNull { expr, .. } => collect_aggregates(expr, out),
        _ => {}
    }
}

/// Group `input` by `group_by` and produce one row per surviving group:
/// the group key columns first, then one computed column per aggregate.
/// With no GROUP BY the whole input is a single group.
fn aggregate(
    input: &Relation,
    group_by: &[Expr],
    having: Option<&Expr>,
    aggregates: &[Expr],
) -> Result<Relation, DBError> {
    let mut columns = Vec::with_capacity(group_by.len() + aggregates.len());
    for expr in group_by {
        columns.push(match expr {
            Expr::Column { table, name } => ColumnId {
                qualifier: table.clone().unwrap_or_default(),
                name: name.clone(),
            },
            other => ColumnId {
                qualifier: String::new(),
                name: other.to_string(),
            },
        });
    }
    for expr in aggregates {
        columns.push(ColumnId {
            qualifier: String::new(),
            name: expr.to_string(),
        });
    }

    // Group row indexes by their encoded key values, preserving first-seen
    // order of the groups.
    let mut grouped: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
    if group_by.is_empty() {
        grouped.push((Vec::new(), (0..input.rows.len()).collect()));
    } else {
        let mut keyed = Vec::with_capacity(input.rows.len());
        for (idx, row) in input.rows.iter().enumerate() {
            let key_values: Vec<Value> = group_by
                .iter()
                .map(|e| eval_expr(e, &input.columns, row))
                .collect::<Result<_, _>>()?;
            let mut key_bytes = Vec::new();
            for value in &key_values {
                key_bytes.extend(value.serialize()?);
            }
            keyed.push((key_bytes, key_values, idx));
        }
        let order: Vec<Vec<u8>> = keyed.iter().map(|(bytes, _, _)| bytes.clone()).unique().collect();
        let mut by_key: HashMap<Vec<u8>, (Vec<Value>, Vec<usize>)> = HashMap::new();
        for (bytes, key_values, idx) in keyed {
            by_key
                .entry(bytes)
                .or_insert_with(|| (key_values, Vec::new()))
                .1
                .push(idx);
        }
        for key in order {
            grouped.push(by_key.remove(&key).expect("every key was inserted"));
        }
    }

    let mut rows = Vec::with_capacity(grouped.len());
    for (key_values, row_idxs) in grouped {
        let mut out_row = key_values;
        for expr in aggregates {
            let Expr::Function { name, args } = expr else {
                unreachable!("collect_aggregates only yields functions");
            };
            out_row.push(compute_aggregate(name, args, input, &row_idxs)?);
        }
        if let Some(having) = having {
            if !eval_predicate(having, &columns, &out_row)? {
                continue;
            }
        }
        rows.push(out_row);
    }
    Ok(Relation { columns, rows })
}

fn compute_aggregate(
    name: &str,
    args: &[Expr],
    input: &Relation,
    row_idxs: &[usize],
) -> Result<Value, DBError> {
    let arg = args.first();
    let evaluated: Vec<Value> = match arg {
        None | Some(Expr::Wildcard) => Vec::new(),
        Some(expr) => row_idxs
            .iter()
            .map(|&i| eval_expr(expr, &input.columns, &input.rows[i]))
            .collect::<Result<_, _>>()?,
    };
    let non_null: Vec<&Value> = evaluated.iter().filter(|v| !v.is_null()).collect();

    match name.to_ascii_uppercase().as_str() {
        "COUNT" => Ok(Value::Integer(match arg {
            None | Some(Expr::Wildcard) => row_idxs.len() as i64,
            Some(_) => non_null.len() as i64,
        })),
        "SUM" => fold_sum(&non_null),
        "AVG" => {
            if non_null.is_empty() {
                return Ok(Value::Null);
            }
            let mut total = 0.0;
            for value in &non_null {
                total += numeric(value)?;
            }
            Ok(Value::Float(total / non_null.len() as f64))
        }
        "MIN" => fold_extreme(&non_null, Ordering::Less),
        "MAX" => fold_extreme(&non_null, Ordering::Greater),
        other => Err(PlanError::UnknownFunction(other.to_owned()).into()),
    }
}

fn fold_sum(values: &[&Value]) -> Result<Value, DBError> {
    if values.is_empty() {
        return Ok(Value::Null);
    }
    if values.iter().all(|v| matches!(v, Value::Integer(_))) {
        let mut total = 0i64;
        for value in values {
            let Value::Integer(v) = value else { unreachable!() };
            total = total.checked_add(*v).ok_or_else(|| {
                DBError::Database(DatabaseError::InvalidOperation("integer overflow in SUM".into()))
            })?;
        }
        return Ok(Value::Integer(total));
    }
    let mut total = 0.0;
    for value in values {
        total += numeric(value)?;
    }
    Ok(Value::Float(total))
}

fn fold_extreme(values: &[&Value], keep: Ordering) -> Result<Value, DBError> {
    let mut best: Option<&Value> = None;
    for value in values {
        best = Some(match best {
            None => value,
            Some(current) => {
                if value.compare(current).map_err(DBError::Value)? == keep {
                    value
                } else {
                    current
                }
            }
        });
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn numeric(value: &Value) -> Result<f64, DBError> {
    match value {
        Value::Integer(v) => Ok(*v as f64),
        Value::Float(v) => Ok(*v),
        other => Err(ValueError::TypeMismatch {
            expected: flintdb_types::DataType::Float,
            found: other.data_type(),
        }
        .into()),
    }
}

// ---- Sort / limit / project ----------------------------------------------

/// Total order used only for ORDER BY: Null sorts first, values of the same
/// tag use their natural comparison, distinct tags fall back to tag order.
fn order_values(a: &Value, b: &Value) -> Ordering {
    match a.compare(b) {
        Ok(ordering) => ordering,
        Err(_) => match (a.is_null(), b.is_null()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.data_type().cmp(&b.data_type()),
        },
    }
}

fn sort_relation(relation: &mut Relation, order_by: &[OrderByExpr]) -> Result<(), DBError> {
    let mut keys = Vec::with_capacity(relation.rows.len());
    for row in &relation.rows {
        let key: Vec<Value> = order_by
            .iter()
            .map(|o| eval_expr(&o.expr, &relation.columns, row))
            .collect::<Result<_, _>>()?;
        keys.push(key);
    }
    let mut paired: Vec<(Vec<Value>, Vec<Value>)> =
        keys.into_iter().zip(std::mem::take(&mut relation.rows)).collect();
    paired.sort_by(|(a, _), (b, _)| {
        for (order, (left, right)) in order_by.iter().zip(a.iter().zip(b)) {
            let mut ordering = order_values(left, right);
            if order.descending {
                ordering = ordering.reverse();
            }
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    relation.rows = paired.into_iter().map(|(_, row)| row).collect();
    Ok(())
}

fn apply_limit(relation: &mut Relation, limit: Option<u64>, offset: Option<u64>) {
    let offset = offset.unwrap_or(0) as usize;
    let rows = std::mem::take(&mut relation.rows);
    let iter = rows.into_iter().skip(offset);
    relation.rows = match limit {
        Some(limit) => iter.take(limit as usize).collect(),
        None => iter.collect(),
    };
}

fn project(relation: Relation, columns: &[Expr], distinct: bool) -> Result<Relation, DBError> {
    let mut out_columns = Vec::new();
    for expr in columns {
        match expr {
            Expr::Wildcard => out_columns.extend(relation.columns.iter().cloned()),
            Expr::Column { table, name } => out_columns.push(ColumnId {
                qualifier: table.clone().unwrap_or_default(),
                name: name.clone(),
            }),
            other => out_columns.push(ColumnId {
                qualifier: String::new(),
                name: other.to_string(),
            }),
        }
    }

    let mut rows = Vec::with_capacity(relation.rows.len());
    for row in &relation.rows {
        let mut out_row = Vec::with_capacity(out_columns.len());
        for expr in columns {
            match expr {
                Expr::Wildcard => out_row.extend(row.iter().cloned()),
                other => out_row.push(eval_expr(other, &relation.columns, row)?),
            }
        }
        rows.push(out_row);
    }

    if distinct {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(rows.len());
        for row in rows {
            let mut key = Vec::new();
            for value in &row {
                key.extend(value.serialize()?);
            }
            if seen.insert(key) {
                unique.push(row);
            }
        }
        rows = unique;
    }
    Ok(Relation {
        columns: out_columns,
        rows,
    })
}

// ---- Expression evaluation ------------------------------------------------

fn resolve(columns: &[ColumnId], qualifier: Option<&str>, name: &str) -> Result<usize, DBError> {
    let mut found = None;
    for (idx, column) in columns.iter().enumerate() {
        let hit = match qualifier {
            Some(q) => column.qualifier == q && column.name == name,
            None => column.name == name,
        };
        if hit {
            if found.is_some() {
                return Err(PlanError::AmbiguousColumn(name.to_owned()).into());
            }
            found = Some(idx);
        }
    }
    found.ok_or_else(|| PlanError::UnknownColumn(name.to_owned()).into())
}

fn eval_expr(expr: &Expr, columns: &[ColumnId], row: &[Value]) -> Result<Value, DBError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Column { table, name } => {
            let idx = resolve(columns, table.as_deref(), name)?;
            Ok(row[idx].clone())
        }
        Expr::Wildcard => {
            Err(PlanError::Unsupported("`*` outside a select list or COUNT(*)".into()).into())
        }
        Expr::IsNull { expr, negated } => {
            let value = eval_expr(expr, columns, row)?;
            Ok(Value::Boolean(value.is_null() != *negated))
        }
        Expr::Function { name, .. } => {
            // Aggregates appear as computed columns after the Aggregate
            // stage; anything else is out of grammar.
            let display = expr.to_string();
            if let Some(idx) = columns
                .iter()
                .position(|c| c.qualifier.is_empty() && c.name == display)
            {
                return Ok(row[idx].clone());
            }
            if is_aggregate_function(name) {
                Err(PlanError::NotAggregated(display).into())
            } else {
                Err(PlanError::UnknownFunction(name.clone()).into())
            }
        }
        Expr::BinaryOp { left, op, right } => {
            let lhs = eval_expr(left, columns, row)?;
            let rhs = eval_expr(right, columns, row)?;
            eval_binary(&lhs, *op, &rhs)
        }
    }
}

fn eval_binary(lhs: &Value, op: BinaryOperator, rhs: &Value) -> Result<Value, DBError> {
    use BinaryOperator::*;
    match op {
        And | Or => {
            let l = truthy(lhs)?;
            let r = truthy(rhs)?;
            Ok(Value::Boolean(if op == And { l && r } else { l || r }))
        }
        Eq | NotEq | Lt | Gt | LtEq | GtEq => {
            // A comparison against Null is false, not an error; IS NULL is
            // the null test.
            if lhs.is_null() || rhs.is_null() {
                return Ok(Value::Boolean(false));
            }
            let ordering = match (lhs, rhs) {
                (Value::Integer(l), Value::Float(r)) => (*l as f64).total_cmp(r),
                (Value::Float(l), Value::Integer(r)) => l.total_cmp(&(*r as f64)),
                _ => lhs.compare(rhs).map_err(DBError::Value)?,
            };
            let result = match op {
                Eq => ordering == Ordering::Equal,
                NotEq => ordering != Ordering::Equal,
                Lt => ordering == Ordering::Less,
                Gt => ordering == Ordering::Greater,
                LtEq => ordering != Ordering::Greater,
                GtEq => ordering != Ordering::Less,
                _ => unreachable!(),
            };
            Ok(Value::Boolean(result))
        }
        Plus | Minus | Multiply | Divide => {
            if lhs.is_null() || rhs.is_null() {
                return Ok(Value::Null);
            }
            match (lhs, rhs) {
                (Value::Integer(l), Value::Integer(r)) => {
                    if op == Divide && *r == 0 {
                        return Err(DatabaseError::InvalidOperation("division by zero".into()).into());
                    }
                    let result = match op {
                        Plus => l.checked_add(*r),
                        Minus => l.checked_sub(*r),
                        Multiply => l.checked_mul(*r),
                        Divide => l.checked_div(*r),
                        _ => unreachable!(),
                    };
                    result.map(Value::Integer).ok_or_else(|| {
                        DatabaseError::InvalidOperation("integer overflow".into()).into()
                    })
                }
                _ => {
                    let l = numeric(lhs)?;
                    let r = numeric(rhs)?;
                    if op == Divide && r == 0.0 {
                        return Err(DatabaseError::InvalidOperation("division by zero".into()).into());
                    }
                    Ok(Value::Float(match op {
                        Plus => l + r,
                        Minus => l - r,
                        Multiply => l * r,
                        Divide => l / r,
                        _ => unreachable!(),
                    }))
                }
            }
        }
    }
}

fn truthy(value: &Value) -> Result<bool, DBError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(DatabaseError::InvalidOperation(format!(
            "expected a boolean condition, got {}",
            other.data_type()
        ))
        .into()),
    }
}

fn eval_predicate(expr: &Expr, columns: &[ColumnId], row: &[Value]) -> Result<bool, DBError> {
    truthy(&eval_expr(expr, columns, row)?)
}

// ---- Mutations ------------------------------------------------------------

fn eval_const(expr: &Expr) -> Result<Value, DBError> {
    eval_expr(expr, &[], &[])
}

fn exec_insert(
    db: &Database,
    table: &str,
    columns: &[String],
    values: &[Vec<Expr>],
    ctx: Option<&TxContext>,
) -> Result<QueryResult, DBError> {
    let t = db.get_table(table)?;
    let schema = t.schema();

    let mut count = 0u64;
    for row_exprs in values {
        let mut full = vec![Value::Null; schema.column_count()];
        if columns.is_empty() {
            if row_exprs.len() != schema.column_count() {
                return Err(TableError::InvalidRowData(format!(
                    "INSERT supplies {} values for {} columns",
                    row_exprs.len(),
                    schema.column_count()
                ))
                .into());
            }
            for (slot, expr) in full.iter_mut().zip(row_exprs) {
                *slot = eval_const(expr)?;
            }
        } else {
            if row_exprs.len() != columns.len() {
                return Err(TableError::InvalidRowData(format!(
                    "INSERT supplies {} values for {} named columns",
                    row_exprs.len(),
                    columns.len()
                ))
                .into());
            }
            for (column, expr) in columns.iter().zip(row_exprs) {
                let pos = schema
                    .column_index(column)
                    .ok_or_else(|| TableError::ColumnNotFound(column.clone()))?;
                full[pos] = eval_const(expr)?;
            }
        }

        let row_id = t.insert(full)?;
        if let Some(ctx) = ctx {
            // An empty before-image records that the row did not exist.
            ctx.tx.record_before_image(row_id, Vec::new());
            ctx.tx.mark_table_modified(table);
            let after = t.get(row_id)?.to_bytes()?;
            ctx.log(
                LogEntry::new(ctx.tx.id(), OpCode::Insert, table)
                    .with_row(row_id)
                    .with_after_image(after),
            )?;
        }
        count += 1;
    }
    Ok(QueryResult {
        rows_affected: count,
        ..Default::default()
    })
}

fn exec_update(
    db: &Database,
    table: &str,
    assignments: &[(String, Expr)],
    predicate: Option<&Expr>,
    ctx: Option<&TxContext>,
) -> Result<QueryResult, DBError> {
    let t = db.get_table(table)?;
    let schema = t.schema();
    let columns = table_columns(&schema, table);

    let mut count = 0u64;
    for row in t.select(None::<fn(&Row) -> bool>)? {
        if let Some(predicate) = predicate {
            if !eval_predicate(predicate, &columns, &row.values)? {
                continue;
            }
        }
        let before = row.to_bytes()?;
        let mut new_values = row.values.clone();
        for (column, expr) in assignments {
            let pos = schema
                .column_index(column)
                .ok_or_else(|| TableError::ColumnNotFound(column.clone()))?;
            new_values[pos] = eval_expr(expr, &columns, &row.values)?;
        }
        t.update(row.id, new_values)?;
        if let Some(ctx) = ctx {
            ctx.tx.record_before_image(row.id, before.clone());
            ctx.tx.mark_table_modified(table);
            let after = t.get(row.id)?.to_bytes()?;
            ctx.log(
                LogEntry::new(ctx.tx.id(), OpCode::Update, table)
                    .with_row(row.id)
                    .with_before_image(before)
                    .with_after_image(after),
            )?;
        }
        count += 1;
    }
    Ok(QueryResult {
        rows_affected: count,
        ..Default::default()
    })
}

fn exec_delete(
    db: &Database,
    table: &str,
    predicate: Option<&Expr>,
    ctx: Option<&TxContext>,
) -> Result<QueryResult, DBError> {
    let t = db.get_table(table)?;
    let schema = t.schema();
    let columns = table_columns(&schema, table);

    let mut count = 0u64;
    for row in t.select(None::<fn(&Row) -> bool>)? {
        if let Some(predicate) = predicate {
            if !eval_predicate(predicate, &columns, &row.values)? {
                continue;
            }
        }
        let before = row.to_bytes()?;
        t.delete(row.id)?;
        if let Some(ctx) = ctx {
            ctx.tx.record_before_image(row.id, before.clone());
            ctx.tx.mark_table_modified(table);
            ctx.log(
                LogEntry::new(ctx.tx.id(), OpCode::Delete, table)
                    .with_row(row.id)
                    .with_before_image(before),
            )?;
        }
        count += 1;
    }
    Ok(QueryResult {
        rows_affected: count,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::run;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn seeded_db() -> (TempDir, Database) {
        let tmp = TempDir::with_prefix("exec_test").unwrap();
        let db = Database::open("app", tmp.path()).unwrap();
        run(
            &db,
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
        )
        .unwrap();
        run(
            &db,
            "INSERT INTO users VALUES (1,'Alice',30),(2,'Bob',25),(3,'Charlie',35)",
        )
        .unwrap();
        (tmp, db)
    }

    fn single_column(result: &QueryResult) -> Vec<Value> {
        result.rows.iter().map(|r| r[0].clone()).collect()
    }

    #[test]
    fn filter_and_project() {
        let (_tmp, db) = seeded_db();
        let result = run(&db, "SELECT id FROM users WHERE age > 25").unwrap();
        assert_eq!(result.columns, vec!["id".to_string()]);
        assert_eq!(
            single_column(&result),
            vec![Value::Integer(1), Value::Integer(3)]
        );

        let result = run(&db, "SELECT * FROM users WHERE name = 'Bob'").unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].len(), 3);
    }

    #[test]
    fn arithmetic_in_predicates_and_projection() {
        let (_tmp, db) = seeded_db();
        let result = run(&db, "SELECT age + 1 FROM users WHERE age * 2 >= 60").unwrap();
        assert_eq!(result.columns, vec!["(age + 1)".to_string()]);
        assert_eq!(
            single_column(&result),
            vec![Value::Integer(31), Value::Integer(36)]
        );

        let err = run(&db, "SELECT age / 0 FROM users").unwrap_err();
        assert!(matches!(
            err,
            DBError::Database(DatabaseError::InvalidOperation(_))
        ));
    }

    #[test]
    fn order_limit_offset_distinct() {
        let (_tmp, db) = seeded_db();
        run(&db, "INSERT INTO users VALUES (4,'Dora',25)").unwrap();

        let result = run(&db, "SELECT name FROM users ORDER BY age DESC, name ASC").unwrap();
        assert_eq!(
            single_column(&result),
            vec![
                Value::from("Charlie"),
                Value::from("Alice"),
                Value::from("Bob"),
                Value::from("Dora")
            ]
        );

        let result = run(&db, "SELECT name FROM users ORDER BY age LIMIT 2 OFFSET 1").unwrap();
        assert_eq!(
            single_column(&result),
            vec![Value::from("Dora"), Value::from("Alice")]
        );

        let result = run(&db, "SELECT DISTINCT age FROM users ORDER BY age").unwrap();
        assert_eq!(
            single_column(&result),
            vec![Value::Integer(25), Value::Integer(30), Value::Integer(35)]
        );
    }

    #[test]
    fn joins_inner_left_cross() {
        let (_tmp, db) = seeded_db();
        run(
            &db,
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, total FLOAT)",
        )
        .unwrap();
        run(
            &db,
            "INSERT INTO orders VALUES (10,1,9.5),(11,1,3.5),(12,2,8.0)",
        )
        .unwrap();

        let result = run(
            &db,
            "SELECT users.name, orders.total FROM users JOIN orders ON users.id = orders.user_id ORDER BY orders.id",
        )
        .unwrap();
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0][0], Value::from("Alice"));
        assert_eq!(result.rows[2][0], Value::from("Bob"));

        let result = run(
            &db,
            "SELECT users.name, orders.id FROM users LEFT JOIN orders ON users.id = orders.user_id ORDER BY users.id",
        )
        .unwrap();
        // Charlie has no orders and still appears, padded with NULL.
        assert_eq!(result.rows.len(), 4);
        assert_eq!(result.rows[3][0], Value::from("Charlie"));
        assert_eq!(result.rows[3][1], Value::Null);

        let result = run(&db, "SELECT * FROM users CROSS JOIN orders").unwrap();
        assert_eq!(result.rows.len(), 9);

        let err = run(
            &db,
            "SELECT id FROM users JOIN orders ON users.id = orders.user_id",
        )
        .unwrap_err();
        assert!(matches!(err, DBError::Plan(PlanError::AmbiguousColumn(_))));
    }

    #[test]
    fn join_alias() {
        let (_tmp, db) = seeded_db();
        run(&db, "CREATE TABLE managers (id INTEGER PRIMARY KEY, boss TEXT)").unwrap();
        run(&db, "INSERT INTO managers VALUES (1,'Root')").unwrap();
        let result = run(
            &db,
            "SELECT m.boss FROM users JOIN managers AS m ON users.id = m.id",
        )
        .unwrap();
        assert_eq!(single_column(&result), vec![Value::from("Root")]);
    }

    #[test]
    fn aggregates_with_and_without_group_by() {
        let (_tmp, db) = seeded_db();
        run(&db, "INSERT INTO users VALUES (4,'Dora',25)").unwrap();

        let result = run(&db, "SELECT COUNT(*) FROM users").unwrap();
        assert_eq!(result.columns, vec!["COUNT(*)".to_string()]);
        assert_eq!(result.rows, vec![vec![Value::Integer(4)]]);

        let result = run(
            &db,
            "SELECT age, COUNT(*) FROM users GROUP BY age HAVING COUNT(*) > 1",
        )
        .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(25), Value::Integer(2)]]);

        let result = run(
            &db,
            "SELECT SUM(age), AVG(age), MIN(name), MAX(age) FROM users",
        )
        .unwrap();
        assert_eq!(
            result.rows[0],
            vec![
                Value::Integer(115),
                Value::Float(115.0 / 4.0),
                Value::from("Alice"),
                Value::Integer(35)
            ]
        );

        let result = run(
            &db,
            "SELECT age FROM users GROUP BY age ORDER BY COUNT(*) DESC, age LIMIT 1",
        )
        .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(25)]]);

        let err = run(&db, "SELECT WIBBLE(age) FROM users").unwrap_err();
        assert!(matches!(err, DBError::Plan(PlanError::UnknownFunction(_))));
    }

    #[test]
    fn null_semantics() {
        let (_tmp, db) = seeded_db();
        run(&db, "INSERT INTO users (id, name) VALUES (9, 'Ghost')").unwrap();

        // Comparisons against NULL are false, never errors.
        let result = run(&db, "SELECT id FROM users WHERE age > 0").unwrap();
        assert_eq!(result.rows.len(), 3);

        let result = run(&db, "SELECT id FROM users WHERE age IS NULL").unwrap();
        assert_eq!(single_column(&result), vec![Value::Integer(9)]);

        let result = run(&db, "SELECT id FROM users WHERE age IS NOT NULL").unwrap();
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn update_and_delete_with_predicates() {
        let (_tmp, db) = seeded_db();
        let result = run(&db, "UPDATE users SET age = age + 1 WHERE age < 30").unwrap();
        assert_eq!(result.rows_affected, 1);
        let check = run(&db, "SELECT age FROM users WHERE name = 'Bob'").unwrap();
        assert_eq!(single_column(&check), vec![Value::Integer(26)]);

        let result = run(&db, "DELETE FROM users WHERE age >= 30").unwrap();
        assert_eq!(result.rows_affected, 2);
        let remaining = run(&db, "SELECT COUNT(*) FROM users").unwrap();
        assert_eq!(remaining.rows, vec![vec![Value::Integer(1)]]);
    }

    #[test]
    fn ddl_through_sql() {
        let (_tmp, db) = seeded_db();
        run(&db, "ALTER TABLE users ADD email TEXT DEFAULT 'n/a'").unwrap();
        let result = run(&db, "SELECT email FROM users WHERE id = 1").unwrap();
        assert_eq!(single_column(&result), vec![Value::from("n/a")]);

        run(&db, "ALTER TABLE users DROP email").unwrap();
        assert!(matches!(
            run(&db, "SELECT email FROM users").unwrap_err(),
            DBError::Plan(PlanError::UnknownColumn(_))
        ));

        run(&db, "DROP TABLE users").unwrap();
        assert!(matches!(
            run(&db, "SELECT * FROM users").unwrap_err(),
            DBError::Table(TableError::NotFound(_))
        ));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let (_tmp, db) = seeded_db();
        assert!(matches!(
            run(&db, "SELECT ghost FROM users").unwrap_err(),
            DBError::Plan(PlanError::UnknownColumn(_))
        ));
        assert!(matches!(
            run(&db, "UPDATE users SET ghost = 1").unwrap_err(),
            DBError::Table(TableError::ColumnNotFound(_))
        ));
    }
}
