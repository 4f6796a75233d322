//! SQLite connection implementation

use async_trait::async_trait;
use fixa_core::{
    ColumnMeta, Connection, FixaError, QueryResult, Result, Row, SchemaIntrospection,
    StatementResult, Transaction, Value,
};
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use std::sync::Arc;

/// SQLite connection wrapper
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
}

impl SqliteConnection {
    /// Open a SQLite database. `:memory:` opens a private in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                FixaError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !path.starts_with("file:") {
                let file_path = std::path::Path::new(path);
                if let Some(parent) = file_path.parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    return Err(FixaError::Connection(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            let conn = RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                FixaError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    path, e
                ))
            })?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| FixaError::Connection(format!("Failed to set journal mode: {}", e)))?;
            conn
        };

        // Fixture ordering is only meaningful when constraints are enforced
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| FixaError::Connection(format!("Failed to enable foreign keys: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a script of several statements without parameters (DDL, ATTACH, ...)
    pub fn execute_script(&self, sql: &str) -> Result<()> {
        tracing::debug!("executing SQL script");
        let conn = self.conn.lock();
        conn.execute_batch(sql)
            .map_err(|e| FixaError::Query(format!("Failed to execute script: {}", e)))
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let conn = self.conn.lock();
        run_execute(&conn, sql, params)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.conn.lock();
        run_query(&conn, sql, params)
    }

    #[tracing::instrument(skip(self, sql, batch), fields(statements = batch.len()))]
    async fn execute_batch(&self, sql: &str, batch: &[Vec<Value>]) -> Result<u64> {
        let conn = self.conn.lock();
        run_batch(&conn, sql, batch)
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning SQLite transaction");
        {
            let conn = self.conn.lock();
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|e| FixaError::Query(format!("Failed to begin transaction: {}", e)))?;
        }
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing SQLite connection");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` SQL so that it can share
/// the connection `Arc<Mutex<..>>` without rusqlite's borrow-based transaction
/// lifetime.
pub struct SqliteTransaction {
    conn: Arc<Mutex<RusqliteConnection>>,
    committed: bool,
    rolled_back: bool,
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.committed && !self.rolled_back {
            tracing::warn!(
                "SQLite transaction dropped without commit or rollback, issuing automatic rollback"
            );
            let conn = self.conn.lock();
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        }
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing SQLite transaction");

        if self.rolled_back {
            return Err(FixaError::Query("Transaction already rolled back".into()));
        }
        if self.committed {
            return Err(FixaError::Query("Transaction already committed".into()));
        }

        {
            let conn = self.conn.lock();
            conn.execute_batch("COMMIT")
                .map_err(|e| FixaError::Query(format!("Failed to commit transaction: {}", e)))?;
        }

        self.committed = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back SQLite transaction");

        if self.committed {
            return Err(FixaError::Query("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        {
            let conn = self.conn.lock();
            conn.execute_batch("ROLLBACK").map_err(|e| {
                FixaError::Query(format!("Failed to rollback transaction: {}", e))
            })?;
        }

        self.rolled_back = true;
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in SQLite transaction");
        let conn = self.conn.lock();
        run_query(&conn, sql, params)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in SQLite transaction");
        let conn = self.conn.lock();
        run_execute(&conn, sql, params)
    }

    async fn execute_batch(&self, sql: &str, batch: &[Vec<Value>]) -> Result<u64> {
        tracing::debug!(statements = batch.len(), "executing batch in SQLite transaction");
        let conn = self.conn.lock();
        run_batch(&conn, sql, batch)
    }
}

fn run_execute(conn: &RusqliteConnection, sql: &str, params: &[Value]) -> Result<StatementResult> {
    let rusqlite_params = values_to_rusqlite(params);
    let rows_affected = conn
        .execute(sql, params_from_iter(rusqlite_params.iter()))
        .map_err(|e| FixaError::Query(format!("Failed to execute statement: {}", e)))?;

    tracing::debug!(affected_rows = rows_affected, "statement executed");
    Ok(StatementResult::affected(rows_affected as u64))
}

fn run_batch(conn: &RusqliteConnection, sql: &str, batch: &[Vec<Value>]) -> Result<u64> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|e| FixaError::Query(format!("Failed to prepare statement: {}", e)))?;

    let mut affected = 0u64;
    for params in batch {
        let rusqlite_params = values_to_rusqlite(params);
        affected += stmt
            .execute(params_from_iter(rusqlite_params.iter()))
            .map_err(|e| FixaError::Query(format!("Failed to execute batch statement: {}", e)))?
            as u64;
    }

    tracing::debug!(statements = batch.len(), affected_rows = affected, "batch executed");
    Ok(affected)
}

pub(crate) fn run_query(
    conn: &RusqliteConnection,
    sql: &str,
    params: &[Value],
) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();
    let rusqlite_params = values_to_rusqlite(params);

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| FixaError::Query(format!("Failed to prepare query: {}", e)))?;

    let mut column_names: Vec<String> = Vec::with_capacity(stmt.column_count());
    let mut columns: Vec<ColumnMeta> = Vec::with_capacity(stmt.column_count());
    for (idx, col) in stmt.columns().iter().enumerate() {
        let name = col.name().to_string();
        // sqlite3_column_decltype, the type from CREATE TABLE
        let data_type = col.decl_type().unwrap_or("DYNAMIC").to_string();
        column_names.push(name.clone());
        columns.push(ColumnMeta {
            name,
            data_type,
            ordinal: idx,
        });
    }

    let mut rows = Vec::new();
    let mut query_rows = stmt
        .query(params_from_iter(rusqlite_params.iter()))
        .map_err(|e| FixaError::Query(format!("Failed to execute query: {}", e)))?;

    while let Some(row) = query_rows
        .next()
        .map_err(|e| FixaError::Query(format!("Failed to fetch row: {}", e)))?
    {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(rusqlite_to_value(row, i)?);
        }
        rows.push(Row::new(column_names.clone(), values));
    }

    let execution_time_ms = start_time.elapsed().as_millis() as u64;
    tracing::debug!(
        row_count = rows.len(),
        execution_time_ms = execution_time_ms,
        "query executed successfully"
    );
    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        affected_rows: 0,
        execution_time_ms,
    })
}

/// Convert our Value types to rusqlite-compatible types
fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Int64(i) => Sql::Integer(*i),
        Value::Float64(f) => Sql::Real(*f),
        // Column affinity decides how the text is finally stored
        Value::Decimal(d) => Sql::Text(d.clone()),
        Value::String(s) => Sql::Text(s.clone()),
        Value::Bytes(b) => Sql::Blob(b.clone()),
        Value::Date(d) => Sql::Text(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => Sql::Text(t.format("%H:%M:%S%.3f").to_string()),
        Value::DateTime(dt) => Sql::Text(dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
    }
}

/// Convert rusqlite row value to our Value type
fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| FixaError::Query(e.to_string()))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_temporal_values_bind_as_canonical_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .and_then(|d| d.and_hms_milli_opt(23, 59, 1, 5))
            .map(Value::DateTime)
            .map(|v| value_to_rusqlite(&v));
        assert_eq!(
            dt,
            Some(rusqlite::types::Value::Text("2024-02-29 23:59:01.005".into()))
        );
        assert_eq!(
            value_to_rusqlite(&Value::Bool(true)),
            rusqlite::types::Value::Integer(1)
        );
    }

    #[tokio::test]
    async fn test_blob_comes_back_as_bytes() -> Result<()> {
        let conn = SqliteConnection::open(":memory:")?;
        conn.execute_script("CREATE TABLE B (DATA BLOB)")?;
        conn.execute("INSERT INTO B VALUES (?)", &[Value::Bytes(vec![0x41, 0x42])])
            .await?;

        let result = conn.query("SELECT DATA FROM B", &[]).await?;
        assert_eq!(result.rows[0].get(0), Some(&Value::Bytes(vec![0x41, 0x42])));
        Ok(())
    }

    #[tokio::test]
    async fn test_execute_batch_reuses_statement() -> Result<()> {
        let conn = SqliteConnection::open(":memory:")?;
        conn.execute_script("CREATE TABLE T (ID INTEGER PRIMARY KEY, NAME TEXT)")?;

        let batch: Vec<Vec<Value>> = (1..=3)
            .map(|i| vec![Value::Int64(i), Value::from(format!("n{i}"))])
            .collect();
        let affected = Connection::execute_batch(&conn, "INSERT INTO T VALUES (?, ?)", &batch)
            .await?;
        assert_eq!(affected, 3);

        let result = conn.query("SELECT COUNT(*) FROM T", &[]).await?;
        assert_eq!(result.rows[0].get(0).and_then(Value::as_i64), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() -> Result<()> {
        let conn = SqliteConnection::open(":memory:")?;
        conn.execute_script("CREATE TABLE T (ID INTEGER)")?;
        {
            let tx = conn.begin_transaction().await?;
            tx.execute("INSERT INTO T VALUES (1)", &[]).await?;
        }
        let result = conn.query("SELECT COUNT(*) FROM T", &[]).await?;
        assert_eq!(result.rows[0].get(0).and_then(Value::as_i64), Some(0));
        Ok(())
    }
}
