//! Master data: tables loaded once for a whole test run, backed up to a
//! second schema and restored after a test modifies them

use crate::loader::ReplaceTables;
use crate::recorder::StatementRecorder;
use crate::table_data::TableData;
use crate::transaction::{TransactionCallback, TransactionTemplate};
use async_trait::async_trait;
use fixa_core::{Connection, FixaError, Result, Transaction};
use fixa_schema::TableSorter;
use fixa_settings::{BACKUP_SCHEMA_KEY, SettingsSource};
use indexmap::IndexSet;
use std::collections::HashSet;
use std::sync::Arc;

/// Statement keywords that modify a table
const DEFAULT_KEYWORDS: [&str; 5] = ["INSERT", "DELETE", "UPDATE", "MERGE", "TRUNCATE"];

/// Loads master data and, when `fixa.backup-schema` is set, copies every
/// loaded table into the backup schema.
pub struct MasterDataSetUp {
    conn: Arc<dyn Connection>,
    settings: Arc<dyn SettingsSource>,
    finished: IndexSet<String>,
}

impl MasterDataSetUp {
    pub fn new(conn: Arc<dyn Connection>, settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            conn,
            settings,
            finished: IndexSet::new(),
        }
    }

    #[tracing::instrument(skip_all, fields(tables = tables.len()))]
    pub async fn replace_all(&mut self, tables: &[TableData]) -> Result<()> {
        let sorter = TableSorter::new(Arc::clone(&self.conn), Arc::clone(&self.settings));
        TransactionTemplate::new(self.conn.as_ref())
            .execute(&mut ReplaceTables::new(&sorter, tables))
            .await?;
        self.finished
            .extend(tables.iter().map(|t| t.table_name().to_string()));

        if let Some(backup) = non_empty(self.settings.get_string(BACKUP_SCHEMA_KEY)) {
            TableDuplicator::new(
                Arc::clone(&self.conn),
                Arc::clone(&self.settings),
                self.finished.iter().cloned(),
                "",
                &backup,
            )
            .restore_all()
            .await?;
        }
        tracing::info!(finished = self.finished.len(), "master data set up");
        Ok(())
    }

    /// Every table loaded so far, in load order
    pub fn finished_tables(&self) -> impl Iterator<Item = &str> {
        self.finished.iter().map(String::as_str)
    }
}

/// Overwrites whole tables in one schema with their copies in another.
/// An empty schema name is the connection's default schema.
pub struct TableDuplicator {
    conn: Arc<dyn Connection>,
    settings: Arc<dyn SettingsSource>,
    tables: Vec<String>,
    source_schema: String,
    destination_schema: String,
}

impl TableDuplicator {
    pub fn new<I, S>(
        conn: Arc<dyn Connection>,
        settings: Arc<dyn SettingsSource>,
        tables: I,
        source_schema: &str,
        destination_schema: &str,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            conn,
            settings,
            tables: tables.into_iter().map(Into::into).collect(),
            source_schema: source_schema.trim().to_string(),
            destination_schema: destination_schema.trim().to_string(),
        }
    }

    /// Empty every destination table, children first, then refill them
    /// from the source, parents first. Ordering follows the destination
    /// schema's foreign keys.
    #[tracing::instrument(skip_all, fields(from = %self.source_schema, to = %self.destination_schema))]
    pub async fn restore_all(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Ok(());
        }
        let sorter = TableSorter::new(Arc::clone(&self.conn), Arc::clone(&self.settings))
            .with_schema(self.destination_schema.clone());
        TransactionTemplate::new(self.conn.as_ref())
            .execute(&mut CopyTables {
                duplicator: self,
                sorter: &sorter,
            })
            .await
    }
}

struct CopyTables<'a> {
    duplicator: &'a TableDuplicator,
    sorter: &'a TableSorter,
}

#[async_trait]
impl TransactionCallback for CopyTables<'_> {
    type Output = ();

    async fn do_in_transaction(&mut self, tx: &dyn Transaction) -> Result<()> {
        let dup = self.duplicator;
        let ordered = self.sorter.sort(&dup.tables).await?;

        for table in ordered.iter().rev() {
            let destination = qualified(&dup.destination_schema, table);
            tx.execute(&format!("DELETE FROM {}", destination), &[])
                .await?;
        }
        for table in &ordered {
            let source = qualified(&dup.source_schema, table);
            let destination = qualified(&dup.destination_schema, table);
            let copied = tx
                .execute(
                    &format!("INSERT INTO {} SELECT * FROM {}", destination, source),
                    &[],
                )
                .await?
                .affected_rows;
            tracing::debug!(%source, %destination, copied, "table overwritten");
        }
        Ok(())
    }
}

/// Finds the watched tables a test modified and copies them back from the
/// backup schema.
pub struct MasterDataRestorer {
    conn: Arc<dyn Connection>,
    settings: Arc<dyn SettingsSource>,
    backup_schema: Option<String>,
    watched: Vec<String>,
    keywords: Vec<String>,
}

impl MasterDataRestorer {
    pub fn new<S: AsRef<str>>(
        conn: Arc<dyn Connection>,
        settings: Arc<dyn SettingsSource>,
        tables_to_watch: &[S],
    ) -> Self {
        Self {
            conn,
            settings,
            backup_schema: None,
            watched: tables_to_watch
                .iter()
                .map(|t| t.as_ref().trim().to_uppercase())
                .collect(),
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Use this schema instead of `fixa.backup-schema`
    pub fn with_backup_schema(mut self, schema: impl Into<String>) -> Self {
        self.backup_schema = Some(schema.into());
        self
    }

    /// Replace the modifying keywords. Each must be followed by a space
    /// in the statement to count.
    pub fn with_keywords<S: AsRef<str>>(mut self, keywords: &[S]) -> Self {
        self.keywords = keywords
            .iter()
            .map(|k| format!("{} ", k.as_ref().trim().to_uppercase()))
            .collect();
        self
    }

    /// Watched tables named after a modifying keyword in any statement,
    /// in watch-list order
    pub fn updated_tables<S: AsRef<str>>(&self, executed: &[S]) -> Vec<String> {
        let mut updated: HashSet<&str> = HashSet::with_capacity(self.watched.len());
        for sql in executed {
            let sql = sql.as_ref().to_uppercase();
            tracing::trace!(sql = %sql, "checking statement");
            for table in &self.watched {
                if updated.contains(table.as_str()) {
                    continue;
                }
                if self.modifies(table, &sql) {
                    tracing::info!(table = %table, sql = %sql, "Master table modification detected");
                    updated.insert(table.as_str());
                }
            }
        }
        self.watched
            .iter()
            .filter(|t| updated.contains(t.as_str()))
            .cloned()
            .collect()
    }

    fn modifies(&self, table: &str, sql: &str) -> bool {
        self.keywords.iter().any(|keyword| {
            sql.find(keyword.as_str())
                .is_some_and(|at| sql[at + keyword.len()..].contains(table))
        })
    }

    /// Restore the tables `executed` modified and return their names
    pub async fn restore<S: AsRef<str>>(&self, executed: &[S]) -> Result<Vec<String>> {
        if executed.is_empty() {
            return Ok(Vec::new());
        }
        let updated = self.updated_tables(executed);
        if updated.is_empty() {
            return Ok(updated);
        }

        let backup = self.backup_schema()?;
        TableDuplicator::new(
            Arc::clone(&self.conn),
            Arc::clone(&self.settings),
            updated.iter().cloned(),
            &backup,
            "",
        )
        .restore_all()
        .await?;
        Ok(updated)
    }

    /// Restore from everything `recorder` saw and reset its log
    pub async fn restore_recorded(&self, recorder: &StatementRecorder) -> Result<Vec<String>> {
        let executed = recorder.take();
        self.restore(&executed).await
    }

    fn backup_schema(&self) -> Result<String> {
        non_empty(self.backup_schema.clone())
            .or_else(|| non_empty(self.settings.get_string(BACKUP_SCHEMA_KEY)))
            .ok_or_else(|| {
                FixaError::Configuration(format!(
                    "'{}' must be set to restore master data",
                    BACKUP_SCHEMA_KEY
                ))
            })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn qualified(schema: &str, table: &str) -> String {
    if schema.is_empty() {
        table.to_string()
    } else {
        format!("{}.{}", schema, table)
    }
}
