//! Connection wrapper that remembers the statements run through it

use async_trait::async_trait;
use fixa_core::{
    Connection, QueryResult, Result, SchemaIntrospection, StatementResult, Transaction, Value,
};
use parking_lot::Mutex;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

/// Records the SQL of every `execute` and `execute_batch`, including those
/// issued inside transactions it began. Queries are not recorded.
///
/// Hand it to the code under test in place of the real connection, then
/// pass [`StatementRecorder::take`] to
/// [`MasterDataRestorer::restore`](crate::MasterDataRestorer::restore).
pub struct StatementRecorder {
    inner: Arc<dyn Connection>,
    executed: Log,
}

impl StatementRecorder {
    pub fn new(inner: Arc<dyn Connection>) -> Self {
        Self {
            inner,
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Statements recorded so far, oldest first
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    /// Hand out the recorded statements and start a fresh log
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.executed.lock())
    }

    pub fn clear(&self) {
        self.executed.lock().clear();
    }

    pub fn inner(&self) -> &Arc<dyn Connection> {
        &self.inner
    }
}

fn record(log: &Log, sql: &str) {
    tracing::trace!(sql = %sql, "statement recorded");
    log.lock().push(sql.to_string());
}

#[async_trait]
impl Connection for StatementRecorder {
    fn driver_name(&self) -> &str {
        self.inner.driver_name()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        record(&self.executed, sql);
        self.inner.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.inner.query(sql, params).await
    }

    async fn execute_batch(&self, sql: &str, batch: &[Vec<Value>]) -> Result<u64> {
        record(&self.executed, sql);
        self.inner.execute_batch(sql, batch).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        let inner = self.inner.begin_transaction().await?;
        Ok(Box::new(RecordingTransaction {
            inner,
            executed: Arc::clone(&self.executed),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        self.inner.as_schema_introspection()
    }
}

struct RecordingTransaction {
    inner: Box<dyn Transaction>,
    executed: Log,
}

#[async_trait]
impl Transaction for RecordingTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.inner.query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        record(&self.executed, sql);
        self.inner.execute(sql, params).await
    }

    async fn execute_batch(&self, sql: &str, batch: &[Vec<Value>]) -> Result<u64> {
        record(&self.executed, sql);
        self.inner.execute_batch(sql, batch).await
    }
}
