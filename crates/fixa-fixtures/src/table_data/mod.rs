//! Fixture rows of one table and the DML that loads them

mod coerce;
#[cfg(test)]
mod tests;

pub(crate) use coerce::{CellKind, cell_text, normalize_expected};

use crate::default_values::{BasicDefaultValues, DefaultValues};
use crate::transaction::{TransactionCallback, TransactionTemplate};
use async_trait::async_trait;
use coerce::{normalize_loaded, to_bind_value};
use fixa_core::{Connection, FixaError, Result, SqlType, Transaction, Value};
use fixa_schema::{DbInfo, TableNamed};
use fixa_settings::DEFAULT_BATCH_SIZE;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// One fixture record keyed by upper-cased column name. A column missing
/// from the map was omitted and takes its default on insert; `Value::Null`
/// is an explicit NULL.
pub type FixtureRow = IndexMap<String, Value>;

/// Everything the insert needs to know about one column
#[derive(Debug, Clone)]
struct ColumnPlan {
    /// Name as reported by the database
    name: String,
    /// Upper-cased row key
    key: String,
    sql_type: SqlType,
    length: usize,
    kind: CellKind,
}

/// Fixture rows for one table.
///
/// Rows are entered as text the way they appear in a test data sheet and
/// converted to typed values only when they are inserted. Column names are
/// taken from the database when none were declared.
#[derive(Clone)]
pub struct TableData {
    db_info: Arc<dyn DbInfo>,
    default_values: Arc<dyn DefaultValues>,
    table_name: String,
    column_names: Option<Vec<String>>,
    rows: Vec<FixtureRow>,
    batch_size: usize,
}

impl TableData {
    pub fn new(db_info: Arc<dyn DbInfo>, table_name: &str) -> Self {
        Self {
            db_info,
            default_values: Arc::new(BasicDefaultValues::default()),
            table_name: normalize_table_name(table_name),
            column_names: None,
            rows: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.set_column_names(columns);
        self
    }

    pub fn with_default_values(mut self, default_values: Arc<dyn DefaultValues>) -> Self {
        self.default_values = default_values;
        self
    }

    /// Rows sent per INSERT batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn set_table_name(&mut self, name: &str) {
        self.table_name = normalize_table_name(name);
    }

    pub fn set_column_names<S: AsRef<str>>(&mut self, columns: &[S]) {
        self.column_names = Some(
            columns
                .iter()
                .map(|c| c.as_ref().to_uppercase())
                .collect(),
        );
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn db_info(&self) -> &Arc<dyn DbInfo> {
        &self.db_info
    }

    /// Declared columns, or every column of the table when none were declared
    pub async fn column_names(&self) -> Result<Vec<String>> {
        match &self.column_names {
            Some(columns) => Ok(columns.clone()),
            None => Ok(self
                .db_info
                .column_names(&self.table_name)
                .await?
                .into_iter()
                .map(|c| c.to_uppercase())
                .collect()),
        }
    }

    pub async fn primary_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .db_info
            .primary_keys(&self.table_name)
            .await?
            .into_iter()
            .map(|c| c.to_uppercase())
            .collect())
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[FixtureRow] {
        &self.rows
    }

    /// Append one record, one cell per declared column. `None` is NULL.
    pub fn add_row<S: AsRef<str>>(&mut self, cells: &[Option<S>]) -> Result<()> {
        let columns = self.column_names.as_ref().ok_or_else(|| {
            FixaError::Configuration(format!(
                "column names of table [{}] must be set before rows are added",
                self.table_name
            ))
        })?;
        if cells.len() != columns.len() {
            return Err(FixaError::Configuration(format!(
                "table [{}] has {} columns but the row has {} cells",
                self.table_name,
                columns.len(),
                cells.len()
            )));
        }

        let row = columns
            .iter()
            .zip(cells)
            .map(|(column, cell)| {
                let value = match cell {
                    Some(text) => Value::String(text.as_ref().to_string()),
                    None => Value::Null,
                };
                (column.clone(), value)
            })
            .collect();
        self.rows.push(row);
        Ok(())
    }

    /// Cell of a row; `None` when the row or the column is absent
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row)?.get(&column.to_uppercase())
    }

    /// Binary cell as raw bytes
    pub fn bytes(&self, row: usize, column: &str) -> Result<Option<Vec<u8>>> {
        match self.value(row, column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bytes(bytes)) => Ok(Some(bytes.clone())),
            Some(Value::String(text)) => hex::decode(text.trim()).map(Some).map_err(|e| {
                FixaError::Conversion {
                    table: self.table_name.clone(),
                    row: row + 1,
                    column: column.to_uppercase(),
                    value: text.clone(),
                    reason: format!("invalid hex string ({})", e),
                }
            }),
            Some(other) => Err(FixaError::NotSupported(format!(
                "{:?} is not binary. table=[{}] column=[{}]",
                other, self.table_name, column
            ))),
        }
    }

    pub fn set_value(&mut self, row: usize, column: &str, value: Value) -> Result<()> {
        let table = &self.table_name;
        let record = self.rows.get_mut(row).ok_or_else(|| {
            FixaError::NotFound(format!("row {} of table [{}]", row + 1, table))
        })?;
        record.insert(column.to_uppercase(), value);
        Ok(())
    }

    /// Replace one cell with text, or NULL for `None`
    pub fn alter_column_value(&mut self, row: usize, column: &str, value: Option<&str>) -> Result<()> {
        let value = value.map_or(Value::Null, |v| Value::String(v.to_string()));
        self.set_value(row, column, value)
    }

    /// `PK1=v1,PK2=v2` for one row
    pub async fn pk_values(&self, row: usize) -> Result<String> {
        let pairs: Vec<String> = self
            .primary_keys()
            .await?
            .into_iter()
            .map(|pk| {
                let value = cell_text(self.value(row, &pk));
                format!("{}={}", pk, value)
            })
            .collect();
        Ok(pairs.join(","))
    }

    /// Add every table column that was not declared, filled with defaults,
    /// and widen the declared columns to the whole table
    pub async fn fill_default_values(&mut self) -> Result<()> {
        let declared = self.column_names().await?;
        let all: Vec<String> = self
            .db_info
            .column_names(&self.table_name)
            .await?
            .into_iter()
            .map(|c| c.to_uppercase())
            .collect();

        let mut defaults = Vec::new();
        for column in all.iter().filter(|c| !declared.contains(c)) {
            defaults.push((column.clone(), self.default_value(column).await?));
        }
        for row in &mut self.rows {
            for (column, value) in &defaults {
                row.insert(column.clone(), value.clone());
            }
        }

        tracing::debug!(
            table = %self.table_name,
            filled = defaults.len(),
            "omitted columns filled with defaults"
        );
        self.column_names = Some(all);
        Ok(())
    }

    async fn default_value(&self, column: &str) -> Result<Value> {
        let sql_type = self.db_info.column_type(&self.table_name, column).await?;
        let length = self.db_info.column_length(&self.table_name, column).await?;
        self.default_values.get(sql_type, length)
    }

    pub(crate) async fn cell_kind(&self, column: &str) -> Result<CellKind> {
        let db = &self.db_info;
        let table = &self.table_name;
        let kind = if db.is_binary_column(table, column).await? {
            CellKind::Binary
        } else if db.is_number_column(table, column).await? {
            CellKind::Number
        } else if db.is_boolean_column(table, column).await? {
            CellKind::Boolean
        } else if db.is_date_column(table, column).await? {
            CellKind::Temporal(db.column_type(table, column).await?)
        } else {
            CellKind::Text
        };
        Ok(kind)
    }

    /// Every column the database does not compute, in table order
    async fn insert_plan(&self) -> Result<Vec<ColumnPlan>> {
        let mut plan = Vec::new();
        for name in self.db_info.column_names(&self.table_name).await? {
            if self.db_info.is_computed_column(&self.table_name, &name).await? {
                continue;
            }
            plan.push(ColumnPlan {
                key: name.to_uppercase(),
                sql_type: self.db_info.column_type(&self.table_name, &name).await?,
                length: self.db_info.column_length(&self.table_name, &name).await?,
                kind: self.cell_kind(&name).await?,
                name,
            });
        }
        Ok(plan)
    }

    fn bind(&self, column: &ColumnPlan, row: &FixtureRow, index: usize) -> Result<Value> {
        let fallback;
        let cell = match row.get(&column.key) {
            Some(value) => value,
            None => {
                fallback = self.default_values.get(column.sql_type, column.length)?;
                &fallback
            }
        };
        to_bind_value(column.kind, cell).map_err(|reason| FixaError::Conversion {
            table: self.table_name.clone(),
            row: index + 1,
            column: column.key.clone(),
            value: cell_text(Some(cell)),
            reason: reason.to_string(),
        })
    }

    /// `DELETE FROM <table>`
    #[tracing::instrument(skip(self, tx), fields(table = %self.table_name))]
    pub async fn delete_data(&self, tx: &dyn Transaction) -> Result<u64> {
        let deleted = tx
            .execute(&format!("DELETE FROM {}", self.table_name), &[])
            .await?
            .affected_rows;
        tracing::debug!(deleted, "table cleared");
        Ok(deleted)
    }

    /// Insert every row, flushing a batch each `batch_size` rows
    #[tracing::instrument(skip(self, tx), fields(table = %self.table_name, rows = self.rows.len()))]
    pub async fn insert_data(&self, tx: &dyn Transaction) -> Result<u64> {
        let plan = self.insert_plan().await?;
        let sql = insert_statement(&self.table_name, &plan);

        let mut inserted = 0;
        let mut batch: Vec<Vec<Value>> = Vec::with_capacity(self.batch_size.min(self.rows.len()));
        for (index, row) in self.rows.iter().enumerate() {
            let params = plan
                .iter()
                .map(|column| self.bind(column, row, index))
                .collect::<Result<Vec<_>>>()?;
            batch.push(params);

            if batch.len() >= self.batch_size {
                inserted += tx.execute_batch(&sql, &batch).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            inserted += tx.execute_batch(&sql, &batch).await?;
        }

        tracing::debug!(inserted, "fixture rows inserted");
        Ok(inserted)
    }

    /// Replace the rows with what the table currently holds, ordered by
    /// primary key
    #[tracing::instrument(skip(self, conn), fields(table = %self.table_name))]
    pub async fn load_data(&mut self, conn: &dyn Connection) -> Result<()> {
        let columns = self.column_names().await?;
        if columns.is_empty() {
            self.rows.clear();
            return Ok(());
        }

        let sql = select_statement(&self.table_name, &columns, &self.primary_keys().await?);
        let mut kinds = Vec::with_capacity(columns.len());
        for column in &columns {
            kinds.push(self.cell_kind(column).await?);
        }

        let result = conn.query(&sql, &[]).await?;
        self.rows = result
            .rows
            .into_iter()
            .map(|row| {
                let mut values = row.values.into_iter();
                columns
                    .iter()
                    .zip(&kinds)
                    .map(|(column, kind)| {
                        let value = values.next().unwrap_or(Value::Null);
                        (column.clone(), normalize_loaded(*kind, value))
                    })
                    .collect::<FixtureRow>()
            })
            .collect();
        self.column_names = Some(columns);

        tracing::debug!(rows = self.rows.len(), "table data loaded");
        Ok(())
    }

    /// Delete then insert this table in a transaction of its own
    pub async fn replace_data(&self, conn: &dyn Connection) -> Result<()> {
        TransactionTemplate::new(conn)
            .execute(&mut ReplaceTable { table: self })
            .await
    }
}

struct ReplaceTable<'a> {
    table: &'a TableData,
}

#[async_trait]
impl TransactionCallback for ReplaceTable<'_> {
    type Output = ();

    async fn do_in_transaction(&mut self, tx: &dyn Transaction) -> Result<()> {
        self.table.delete_data(tx).await?;
        self.table.insert_data(tx).await?;
        Ok(())
    }
}

impl TableNamed for TableData {
    fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl fmt::Display for TableData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.column_names.as_deref().unwrap_or_default();
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .map(|(column, value)| format!("{}={}", column, cell_text(Some(value))))
                    .collect();
                format!("{{{}}}", cells.join(", "))
            })
            .collect();
        write!(
            f,
            "TABLE_NAME=[{}], COLUMN_NAME=[{}], DATA=[{}]",
            self.table_name,
            columns.join(", "),
            rows.join(", ")
        )
    }
}

fn normalize_table_name(name: &str) -> String {
    name.trim().to_uppercase()
}

fn insert_statement(table: &str, plan: &[ColumnPlan]) -> String {
    let columns: Vec<&str> = plan.iter().map(|c| c.name.as_str()).collect();
    let placeholders = vec!["?"; plan.len()];
    format!(
        "INSERT INTO {}({}) VALUES ({})",
        table,
        columns.join(","),
        placeholders.join(",")
    )
}

fn select_statement(table: &str, columns: &[String], primary_keys: &[String]) -> String {
    let mut sql = format!("select {} from {}", columns.join(","), table);
    if !primary_keys.is_empty() {
        sql.push_str(" order by ");
        sql.push_str(&primary_keys.join(","));
    }
    sql
}
