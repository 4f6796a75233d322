//! Run a unit of work inside one transaction

use async_trait::async_trait;
use fixa_core::{Connection, Result, Transaction};

/// Work executed by [`TransactionTemplate`]
#[async_trait]
pub trait TransactionCallback: Send {
    type Output: Send;

    async fn do_in_transaction(&mut self, tx: &dyn Transaction) -> Result<Self::Output>;
}

/// Begin, run the callback, commit. Any error rolls the transaction back
/// and is returned to the caller unchanged; a failing rollback is only
/// logged.
pub struct TransactionTemplate<'a> {
    conn: &'a dyn Connection,
}

impl<'a> TransactionTemplate<'a> {
    pub fn new(conn: &'a dyn Connection) -> Self {
        Self { conn }
    }

    pub async fn execute<C>(&self, callback: &mut C) -> Result<C::Output>
    where
        C: TransactionCallback + ?Sized,
    {
        let tx = self.conn.begin_transaction().await?;
        match callback.do_in_transaction(tx.as_ref()).await {
            Ok(output) => {
                tx.commit().await?;
                Ok(output)
            }
            Err(e) => {
                tracing::debug!(error = %e, "rolling back after failure in transaction");
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "exception occurred in rollback");
                }
                Err(e)
            }
        }
    }
}
