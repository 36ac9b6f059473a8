//! SQL planning and execution over the storage layer. Parsing lives in the
//! `flintdb-sql-parser` crate; this module turns a parsed [`Statement`]
//! into a [`QueryPlan`](planner::QueryPlan) and runs it.

pub mod execute;
pub mod planner;

pub use execute::{QueryResult, TxContext, execute};
pub use planner::{PlanNode, QueryPlan, plan};

use crate::db::Database;
use crate::error::DBError;
use flintdb_sql_parser::Statement;

/// Parse, plan and execute `sql` against `db` without any transaction or
/// WAL envelope. Hosts wanting logged mutations go through
/// [`Engine::sql`](crate::Engine::sql).
pub fn run(db: &Database, sql: &str) -> Result<QueryResult, DBError> {
    let statement: Statement = flintdb_sql_parser::parse(sql)?;
    let plan = planner::plan(db, statement)?;
    execute::execute(db, &plan, None)
}
