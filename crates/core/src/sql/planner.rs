//! The rule-based planner: a pure function from a parsed statement and the
//! catalog to a [`PlanNode`] tree.
//!
//! SELECT plans compose bottom-up in a fixed order — Scan, one Join per
//! explicit join clause, Filter, Aggregate, Sort, Limit, Project — so a
//! plan's shape is a deterministic function of the statement, which keeps
//! golden tests trivial. DML and DDL statements become single nodes
//! carrying their fields.

use crate::db::Database;
use crate::error::{DBError, TableError};
use flintdb_sql_parser::ast::{
    AlterAction, Expr, JoinType, OrderByExpr, SelectStatement, Statement,
};
use flintdb_types::TableSchema;

#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    Scan {
        table: String,
    },
    Filter {
        predicate: Expr,
        input: Box<PlanNode>,
    },
    Project {
        columns: Vec<Expr>,
        distinct: bool,
        input: Box<PlanNode>,
    },
    Join {
        join_type: JoinType,
        table: String,
        alias: Option<String>,
        on: Option<Expr>,
        input: Box<PlanNode>,
    },
    Sort {
        order_by: Vec<OrderByExpr>,
        input: Box<PlanNode>,
    },
    Limit {
        limit: Option<u64>,
        offset: Option<u64>,
        input: Box<PlanNode>,
    },
    Aggregate {
        group_by: Vec<Expr>,
        having: Option<Expr>,
        input: Box<PlanNode>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Vec<Expr>>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        predicate: Option<Expr>,
    },
    Delete {
        table: String,
        predicate: Option<Expr>,
    },
    CreateTable {
        schema: TableSchema,
    },
    DropTable {
        table: String,
    },
    AlterTable {
        table: String,
        action: AlterAction,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub root: PlanNode,
}

impl QueryPlan {
    /// True when executing this plan writes to the database.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self.root,
            PlanNode::Insert { .. }
                | PlanNode::Update { .. }
                | PlanNode::Delete { .. }
                | PlanNode::CreateTable { .. }
                | PlanNode::DropTable { .. }
                | PlanNode::AlterTable { .. }
        )
    }

    /// The table a mutation plan targets, if any.
    pub fn target_table(&self) -> Option<&str> {
        match &self.root {
            PlanNode::Insert { table, .. }
            | PlanNode::Update { table, .. }
            | PlanNode::Delete { table, .. }
            | PlanNode::DropTable { table }
            | PlanNode::AlterTable { table, .. } => Some(table),
            PlanNode::CreateTable { schema } => Some(&schema.table_name),
            _ => None,
        }
    }
}

/// Plan `statement` against the catalog snapshot in `db`.
pub fn plan(db: &Database, statement: Statement) -> Result<QueryPlan, DBError> {
    let root = match statement {
        Statement::Select(select) => plan_select(db, select)?,
        Statement::Insert(insert) => {
            require_table(db, &insert.table)?;
            PlanNode::Insert {
                table: insert.table,
                columns: insert.columns,
                values: insert.values,
            }
        }
        Statement::Update(update) => {
            require_table(db, &update.table)?;
            PlanNode::Update {
                table: update.table,
                assignments: update.assignments,
                predicate: update.where_clause,
            }
        }
        Statement::Delete(delete) => {
            require_table(db, &delete.table)?;
            PlanNode::Delete {
                table: delete.table,
                predicate: delete.where_clause,
            }
        }
        Statement::CreateTable(create) => {
            if db.has_table(&create.table) {
                return Err(TableError::Exists(create.table).into());
            }
            let mut schema = TableSchema::new(create.table).with_columns(create.columns);
            schema.normalize_primary_key();
            schema.validate()?;
            PlanNode::CreateTable { schema }
        }
        Statement::DropTable(drop) => {
            require_table(db, &drop.table)?;
            PlanNode::DropTable { table: drop.table }
        }
        Statement::AlterTable(alter) => {
            require_table(db, &alter.table)?;
            PlanNode::AlterTable {
                table: alter.table,
                action: alter.action,
            }
        }
    };
    Ok(QueryPlan { root })
}

fn require_table(db: &Database, table: &str) -> Result<(), DBError> {
    db.get_table(table).map(|_| ())
}

fn plan_select(db: &Database, select: SelectStatement) -> Result<PlanNode, DBError> {
    require_table(db, &select.table)?;
    for join in &select.joins {
        require_table(db, &join.table)?;
    }

    let mut root = PlanNode::Scan {
        table: select.table,
    };
    for join in select.joins {
        root = PlanNode::Join {
            join_type: join.join_type,
            table: join.table,
            alias: join.alias,
            on: join.on,
            input: Box::new(root),
        };
    }
    if let Some(predicate) = select.where_clause {
        root = PlanNode::Filter {
            predicate,
            input: Box::new(root),
        };
    }
    if !select.group_by.is_empty() {
        root = PlanNode::Aggregate {
            group_by: select.group_by,
            having: select.having,
            input: Box::new(root),
        };
    }
    if !select.order_by.is_empty() {
        root = PlanNode::Sort {
            order_by: select.order_by,
            input: Box::new(root),
        };
    }
    if select.limit.is_some() || select.offset.is_some() {
        root = PlanNode::Limit {
            limit: select.limit,
            offset: select.offset,
            input: Box::new(root),
        };
    }
    Ok(PlanNode::Project {
        columns: select.columns,
        distinct: select.distinct,
        input: Box::new(root),
    })
}
