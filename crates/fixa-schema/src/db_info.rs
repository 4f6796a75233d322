//! Per-table column metadata, loaded once and cached

use async_trait::async_trait;
use fixa_core::{ColumnInfo, Connection, FixaError, Result, SchemaIntrospection, SqlType};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use unicase::UniCase;

/// Column metadata answers needed to coerce and load fixture rows.
///
/// Table and column names are matched case-insensitively.
#[async_trait]
pub trait DbInfo: Send + Sync {
    /// Primary key columns in key sequence order
    async fn primary_keys(&self, table: &str) -> Result<Vec<String>>;

    /// All columns in ordinal order
    async fn column_names(&self, table: &str) -> Result<Vec<String>>;

    async fn column_type(&self, table: &str, column: &str) -> Result<SqlType>;

    /// Declared length; character width or numeric precision
    async fn column_length(&self, table: &str, column: &str) -> Result<usize>;

    /// Whether the column belongs to a unique index other than the primary key
    async fn is_unique_index(&self, table: &str, column: &str) -> Result<bool>;

    /// Whether the column is generated by the database
    async fn is_computed_column(&self, _table: &str, _column: &str) -> Result<bool> {
        Ok(false)
    }

    async fn is_number_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.column_type(table, column).await?.is_numeric())
    }

    async fn is_date_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.column_type(table, column).await?.is_date())
    }

    async fn is_binary_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.column_type(table, column).await?.is_binary())
    }

    async fn is_boolean_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.column_type(table, column).await?.is_boolean())
    }
}

/// Everything known about one table
#[derive(Debug)]
struct TableMeta {
    columns: Vec<ColumnInfo>,
    primary_keys: Vec<String>,
    unique_columns: HashSet<UniCase<String>>,
}

impl TableMeta {
    fn column(&self, table: &str, column: &str) -> Result<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                FixaError::NotFound(format!(
                    "can't get column info. table=[{}]. column=[{}]",
                    table, column
                ))
            })
    }
}

/// `DbInfo` backed by a connection's schema introspection
pub struct GenericDbInfo {
    conn: Arc<dyn Connection>,
    schema: Option<String>,
    tables: RwLock<HashMap<UniCase<String>, Arc<TableMeta>>>,
}

impl GenericDbInfo {
    pub fn new(conn: Arc<dyn Connection>, schema: Option<String>) -> Self {
        Self {
            conn,
            schema,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Forget every cached table, e.g. after DDL
    pub fn clear_cache(&self) {
        self.tables.write().clear();
    }

    fn introspection(&self) -> Result<&dyn SchemaIntrospection> {
        self.conn.as_schema_introspection().ok_or_else(|| {
            FixaError::NotSupported(format!(
                "driver '{}' does not expose schema metadata",
                self.conn.driver_name()
            ))
        })
    }

    async fn table_meta(&self, table: &str) -> Result<Arc<TableMeta>> {
        let key = UniCase::new(table.to_string());
        let cached = self.tables.read().get(&key).cloned();
        if let Some(meta) = cached {
            tracing::trace!(table = %table, "cache hit for table metadata");
            return Ok(meta);
        }

        tracing::debug!(table = %table, "cache miss for table metadata");
        let meta = Arc::new(self.load(table).await?);
        self.tables.write().insert(key, Arc::clone(&meta));
        Ok(meta)
    }

    async fn load(&self, table: &str) -> Result<TableMeta> {
        let meta = self.introspection()?;
        let schema = self.schema.as_deref().map(|s| meta.normalize_identifier(s));
        let name = meta.normalize_identifier(table);

        let columns = meta
            .get_columns(schema.as_deref(), &name)
            .await
            .map_err(|e| FixaError::metadata(table, "can't get column info.", e))?;

        let primary_keys = meta
            .get_primary_key(schema.as_deref(), &name)
            .await
            .map_err(|e| FixaError::metadata(table, "can't get primary keys.", e))?
            .map(|pk| pk.columns)
            .unwrap_or_default();

        let unique_columns = meta
            .get_indexes(schema.as_deref(), &name)
            .await
            .map_err(|e| FixaError::metadata(table, "can't get index info.", e))?
            .into_iter()
            .filter(|idx| idx.is_unique && !idx.is_primary)
            .flat_map(|idx| idx.columns)
            .filter(|col| !primary_keys.iter().any(|pk| pk.eq_ignore_ascii_case(col)))
            .map(UniCase::new)
            .collect();

        tracing::debug!(
            table = %table,
            columns = columns.len(),
            primary_keys = primary_keys.len(),
            "table metadata loaded"
        );
        Ok(TableMeta {
            columns,
            primary_keys,
            unique_columns,
        })
    }
}

#[async_trait]
impl DbInfo for GenericDbInfo {
    async fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.table_meta(table).await?.primary_keys.clone())
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .table_meta(table)
            .await?
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    async fn column_type(&self, table: &str, column: &str) -> Result<SqlType> {
        Ok(self.table_meta(table).await?.column(table, column)?.sql_type)
    }

    async fn column_length(&self, table: &str, column: &str) -> Result<usize> {
        let meta = self.table_meta(table).await?;
        let info = meta.column(table, column)?;
        Ok(match info.max_length {
            Some(len) => usize::try_from(len).unwrap_or(0),
            // CHAR without a length is CHAR(1)
            None if info.sql_type.is_fixed_char() => 1,
            None => usize::MAX,
        })
    }

    async fn is_unique_index(&self, table: &str, column: &str) -> Result<bool> {
        let meta = self.table_meta(table).await?;
        Ok(meta.unique_columns.contains(&UniCase::new(column.to_string())))
    }

    async fn is_computed_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.table_meta(table).await?.column(table, column)?.is_computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixa_driver_sqlite::SqliteConnection;
    use pretty_assertions::assert_eq;

    fn db_info() -> anyhow::Result<GenericDbInfo> {
        let conn = SqliteConnection::open(":memory:")?;
        conn.execute_script(
            r#"
            CREATE TABLE ITEM (
                ITEM_ID CHAR(5) NOT NULL,
                SHOP_ID INTEGER NOT NULL,
                SKU VARCHAR(20) UNIQUE,
                FLAG CHAR,
                PRICE DECIMAL(8, 2),
                IMAGE BLOB,
                ENABLED BOOLEAN,
                CREATED_AT TIMESTAMP,
                DOUBLED INTEGER GENERATED ALWAYS AS (SHOP_ID * 2) STORED,
                PRIMARY KEY (ITEM_ID, SHOP_ID)
            );
            "#,
        )?;
        Ok(GenericDbInfo::new(Arc::new(conn), None))
    }

    #[tokio::test]
    async fn test_keys_and_columns() -> anyhow::Result<()> {
        let info = db_info()?;
        assert_eq!(info.primary_keys("item").await?, vec!["ITEM_ID", "SHOP_ID"]);
        assert_eq!(info.column_names("ITEM").await?.len(), 9);
        assert_eq!(info.column_type("Item", "price").await?, SqlType::Decimal);
        Ok(())
    }

    #[tokio::test]
    async fn test_column_lengths() -> anyhow::Result<()> {
        let info = db_info()?;
        assert_eq!(info.column_length("ITEM", "ITEM_ID").await?, 5);
        assert_eq!(info.column_length("ITEM", "FLAG").await?, 1);
        assert_eq!(info.column_length("ITEM", "PRICE").await?, 8);
        assert_eq!(info.column_length("ITEM", "SHOP_ID").await?, usize::MAX);
        Ok(())
    }

    #[tokio::test]
    async fn test_type_predicates() -> anyhow::Result<()> {
        let info = db_info()?;
        assert!(info.is_number_column("ITEM", "SHOP_ID").await?);
        assert!(info.is_binary_column("ITEM", "IMAGE").await?);
        assert!(info.is_boolean_column("ITEM", "ENABLED").await?);
        assert!(info.is_date_column("ITEM", "CREATED_AT").await?);
        assert!(!info.is_date_column("ITEM", "SKU").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_unique_and_computed_columns() -> anyhow::Result<()> {
        let info = db_info()?;
        assert!(info.is_unique_index("ITEM", "SKU").await?);
        assert!(!info.is_unique_index("ITEM", "ITEM_ID").await?);
        assert!(info.is_computed_column("ITEM", "DOUBLED").await?);
        assert!(!info.is_computed_column("ITEM", "PRICE").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_table_and_column() -> anyhow::Result<()> {
        let info = db_info()?;
        let err = info.primary_keys("MISSING").await.err();
        assert!(matches!(
            err,
            Some(FixaError::Metadata { ref table, .. }) if table == "MISSING"
        ));

        let err = info.column_type("ITEM", "NOPE").await.err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("Not found: can't get column info. table=[ITEM]. column=[NOPE]")
        );
        Ok(())
    }
}
