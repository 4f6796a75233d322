//! Loading fixture tables in foreign-key order

use crate::assertion::{self, failure};
use crate::default_values::{BasicDefaultValues, DefaultValues};
use crate::table_data::TableData;
use crate::transaction::{TransactionCallback, TransactionTemplate};
use async_trait::async_trait;
use fixa_core::{Connection, Result, Transaction};
use fixa_schema::{DbInfo, GenericDbInfo, TableSorter};
use fixa_settings::{BATCH_SIZE_KEY, DEFAULT_BATCH_SIZE, SCHEMA_KEY, SettingsSource};
use std::sync::Arc;

/// Entry point for tests that need known rows in the database.
///
/// ```ignore
/// let loader = FixtureLoader::new(conn, settings);
/// let mut item = loader.table("ITEM").with_columns(&["ITEM_ID", "NAME"]);
/// item.add_row(&[Some("A1"), Some("pen")])?;
/// loader.set_up_db(&[item]).await?;
/// ```
pub struct FixtureLoader {
    conn: Arc<dyn Connection>,
    settings: Arc<dyn SettingsSource>,
    db_info: Arc<dyn DbInfo>,
    default_values: Arc<dyn DefaultValues>,
}

impl FixtureLoader {
    pub fn new(conn: Arc<dyn Connection>, settings: Arc<dyn SettingsSource>) -> Self {
        let schema = settings
            .get_string(SCHEMA_KEY)
            .filter(|s| !s.trim().is_empty());
        let db_info = Arc::new(GenericDbInfo::new(Arc::clone(&conn), schema));
        Self {
            conn,
            settings,
            db_info,
            default_values: Arc::new(BasicDefaultValues::default()),
        }
    }

    pub fn with_default_values(mut self, default_values: Arc<dyn DefaultValues>) -> Self {
        self.default_values = default_values;
        self
    }

    pub fn with_db_info(mut self, db_info: Arc<dyn DbInfo>) -> Self {
        self.db_info = db_info;
        self
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub fn db_info(&self) -> &Arc<dyn DbInfo> {
        &self.db_info
    }

    /// Empty fixture table sharing this loader's metadata, defaults and
    /// configured batch size
    pub fn table(&self, name: &str) -> TableData {
        let batch_size = self
            .settings
            .get_usize(BATCH_SIZE_KEY)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        TableData::new(Arc::clone(&self.db_info), name)
            .with_default_values(Arc::clone(&self.default_values))
            .with_batch_size(batch_size)
    }

    /// Replace the contents of every table in one transaction. Children are
    /// deleted before their parents and parents inserted before their
    /// children; any failure leaves the database as it was.
    #[tracing::instrument(skip_all, fields(tables = tables.len()))]
    pub async fn set_up_db(&self, tables: &[TableData]) -> Result<()> {
        let sorter = TableSorter::new(Arc::clone(&self.conn), Arc::clone(&self.settings));
        TransactionTemplate::new(self.conn.as_ref())
            .execute(&mut ReplaceTables::new(&sorter, tables))
            .await?;
        tracing::info!("fixture tables set up");
        Ok(())
    }

    /// Check that each table holds exactly the expected rows.
    ///
    /// An empty expectation is itself a failure, so a mistyped table set
    /// can't pass silently.
    pub async fn assert_table_equals(&self, message: &str, expected: &[TableData]) -> Result<()> {
        if expected.is_empty() {
            return Err(failure(
                message,
                "no table data found in the specified sheet.".to_string(),
            ));
        }
        for table in expected {
            assertion::assert_table_equals(message, table, self.conn.as_ref()).await?;
        }
        Ok(())
    }
}

/// Delete children first, then insert parents first
pub(crate) struct ReplaceTables<'a> {
    sorter: &'a TableSorter,
    tables: &'a [TableData],
}

impl<'a> ReplaceTables<'a> {
    pub(crate) fn new(sorter: &'a TableSorter, tables: &'a [TableData]) -> Self {
        Self { sorter, tables }
    }
}

#[async_trait]
impl TransactionCallback for ReplaceTables<'_> {
    type Output = ();

    async fn do_in_transaction(&mut self, tx: &dyn Transaction) -> Result<()> {
        let tables: Vec<&TableData> = self.tables.iter().collect();

        for table in self.sorter.reversed(&tables).await? {
            table.delete_data(tx).await?;
        }
        for table in self.sorter.sort(&tables).await? {
            table.insert_data(tx).await?;
        }
        Ok(())
    }
}
