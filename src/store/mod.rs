//! SQLite persistence.
//!
//! One pool, two facades ([`TaskStore`], [`UserStore`]). The schema is
//! created on connect; WAL mode keeps concurrent readers cheap. A missing
//! connection string is not fatal: [`Database::unconfigured`] yields a
//! handle whose every operation reports [`Error::Unavailable`], so the
//! server can come up and answer `/health` while storage is absent.
//!
//! Dynamic SQL here is rendered from [`QueryPlan`]s whose fields were
//! whitelist-checked at parse time. Column names come from the static field
//! tables, never from the request; caller values only ever travel as binds.

pub mod tasks;
pub mod users;

pub use tasks::TaskStore;
pub use users::UserStore;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::query::{Direction, FieldKind, Filter, Predicate, QueryPlan, Scalar, SortKey};

/// Shared SQLite handle.
#[derive(Clone)]
pub struct Database {
    pool: Option<SqlitePool>,
}

impl Database {
    /// Open (creating if missing) the database named by the connection
    /// string, e.g. `sqlite://taskd.db?mode=rwc`, and apply the schema.
    pub async fn connect(url: &str, slow_query_ms: u64) -> Result<Self, Error> {
        let mut opts = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::store("open database", e))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .create_if_missing(true);
        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                Duration::from_millis(slow_query_ms),
            );
        }
        let pool = SqlitePool::connect_with(opts)
            .await
            .map_err(|e| Error::store("open database", e))?;
        migrate(&pool).await?;
        Ok(Self { pool: Some(pool) })
    }

    /// A handle with no backing pool; every operation reports
    /// [`Error::Unavailable`].
    pub fn unconfigured() -> Self {
        Self { pool: None }
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_some()
    }

    pub(crate) fn pool(&self) -> Result<&SqlitePool, Error> {
        self.pool.as_ref().ok_or(Error::Unavailable)
    }
}

async fn migrate(pool: &SqlitePool) -> Result<(), Error> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            deadline TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            assigned_user TEXT NOT NULL DEFAULT '',
            assigned_user_name TEXT NOT NULL DEFAULT 'unassigned',
            date_created TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_tasks_assigned_user ON tasks(assigned_user)",
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            pending_tasks TEXT NOT NULL DEFAULT '[]',
            date_created TEXT NOT NULL
        )",
    ];
    for sql in statements {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| Error::store("create schema", e))?;
    }
    Ok(())
}

// ─── SQL rendering ───────────────────────────────────────────────────────────

/// Owned bind value for dynamically rendered SQL.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlArg {
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlArg {
    /// `None` for JSON null, which renders inline as `IS [NOT] NULL` or a
    /// constant-false comparison instead of binding.
    fn from_scalar(scalar: &Scalar) -> Option<SqlArg> {
        match scalar {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(SqlArg::Int(i64::from(*b))),
            Scalar::Int(i) => Some(SqlArg::Int(*i)),
            Scalar::Float(f) => Some(SqlArg::Float(*f)),
            Scalar::Text(t) => Some(SqlArg::Text(t.clone())),
        }
    }
}

/// Render a filter as a `WHERE` clause (leading space included; empty string
/// when unfiltered) plus its bind values in placeholder order.
pub(crate) fn render_where(filter: &Filter) -> (String, Vec<SqlArg>) {
    if filter.conditions.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut clauses = Vec::with_capacity(filter.conditions.len());
    let mut args = Vec::new();
    for cond in &filter.conditions {
        let col = cond.field.column;
        match &cond.predicate {
            Predicate::Eq(Scalar::Text(id)) if cond.field.kind == FieldKind::IdList => {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM json_each({col}) WHERE json_each.value = ?)"
                ));
                args.push(SqlArg::Text(id.clone()));
            }
            Predicate::Eq(Scalar::Null) => clauses.push(format!("{col} IS NULL")),
            Predicate::Ne(Scalar::Null) => clauses.push(format!("{col} IS NOT NULL")),
            Predicate::Eq(s) => push_cmp(&mut clauses, &mut args, col, "=", s),
            Predicate::Ne(s) => push_cmp(&mut clauses, &mut args, col, "!=", s),
            Predicate::Gt(s) => push_cmp(&mut clauses, &mut args, col, ">", s),
            Predicate::Gte(s) => push_cmp(&mut clauses, &mut args, col, ">=", s),
            Predicate::Lt(s) => push_cmp(&mut clauses, &mut args, col, "<", s),
            Predicate::Lte(s) => push_cmp(&mut clauses, &mut args, col, "<=", s),
            Predicate::In(items) => push_set(&mut clauses, &mut args, col, "IN", items),
            Predicate::Nin(items) => push_set(&mut clauses, &mut args, col, "NOT IN", items),
        }
    }
    (format!(" WHERE {}", clauses.join(" AND ")), args)
}

fn push_cmp(clauses: &mut Vec<String>, args: &mut Vec<SqlArg>, col: &str, op: &str, s: &Scalar) {
    match SqlArg::from_scalar(s) {
        Some(arg) => {
            clauses.push(format!("{col} {op} ?"));
            args.push(arg);
        }
        // Ordering against null matches nothing (columns are NOT NULL).
        None => clauses.push("0 = 1".to_string()),
    }
}

fn push_set(clauses: &mut Vec<String>, args: &mut Vec<SqlArg>, col: &str, op: &str, items: &[Scalar]) {
    let mut placeholders = Vec::with_capacity(items.len());
    for item in items {
        if let Some(arg) = SqlArg::from_scalar(item) {
            placeholders.push("?");
            args.push(arg);
        }
    }
    if placeholders.is_empty() {
        // `$in []` matches nothing; `$nin []` matches everything.
        clauses.push(if op == "IN" { "0 = 1" } else { "1 = 1" }.to_string());
    } else {
        clauses.push(format!("{col} {op} ({})", placeholders.join(", ")));
    }
}

/// Render the `ORDER BY` clause. Unsorted listings page over insertion
/// order so `skip`/`limit` windows stay deterministic.
pub(crate) fn render_order(sort: &[SortKey]) -> String {
    if sort.is_empty() {
        return " ORDER BY rowid".to_string();
    }
    let keys: Vec<String> = sort
        .iter()
        .map(|key| {
            let dir = match key.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            format!("{} {dir}", key.field.column)
        })
        .collect();
    format!(" ORDER BY {}", keys.join(", "))
}

/// Render `LIMIT`/`OFFSET`. SQLite needs a LIMIT to apply an OFFSET;
/// `LIMIT -1` means unbounded.
pub(crate) fn render_page(plan: &QueryPlan) -> String {
    match (plan.limit, plan.skip > 0) {
        (Some(limit), true) => format!(" LIMIT {limit} OFFSET {}", plan.skip),
        (Some(limit), false) => format!(" LIMIT {limit}"),
        (None, true) => format!(" LIMIT -1 OFFSET {}", plan.skip),
        (None, false) => String::new(),
    }
}
