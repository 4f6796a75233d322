//! Connection trait and transaction handling

use crate::{QueryResult, Result, SchemaIntrospection, StatementResult, Value};
use async_trait::async_trait;

/// A database connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Execute one parameterized statement once per parameter set.
    ///
    /// Returns the total number of affected rows. Drivers that can reuse a
    /// prepared statement should override this.
    async fn execute_batch(&self, sql: &str, batch: &[Vec<Value>]) -> Result<u64> {
        tracing::debug!(statements = batch.len(), "executing statement batch one by one");
        let mut affected = 0;
        for params in batch {
            affected += self.execute(sql, params).await?.affected_rows;
        }
        Ok(affected)
    }

    /// Begin a transaction
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Get schema introspection interface if supported
    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        None
    }
}

/// A database transaction
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;

    /// Execute a query within the transaction
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Execute a statement within the transaction
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute one parameterized statement once per parameter set
    async fn execute_batch(&self, sql: &str, batch: &[Vec<Value>]) -> Result<u64> {
        let mut affected = 0;
        for params in batch {
            affected += self.execute(sql, params).await?.affected_rows;
        }
        Ok(affected)
    }
}
