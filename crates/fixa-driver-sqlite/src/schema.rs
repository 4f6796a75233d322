//! SQLite schema introspection
//!
//! Built on the table-valued pragma functions so that the schema (an
//! attached database name) can be bound as a parameter.

use crate::SqliteConnection;
use async_trait::async_trait;
use fixa_core::{
    ColumnInfo, Connection, FixaError, ForeignKeyInfo, IndexInfo, PrimaryKeyInfo, Result,
    SchemaIntrospection, SqlType, TableInfo, Value, declared_length,
};
use std::collections::BTreeMap;

/// `table_xinfo.hidden` values of generated columns
const HIDDEN_GENERATED_VIRTUAL: i64 = 2;
const HIDDEN_GENERATED_STORED: i64 = 3;

fn schema_or_main(schema: Option<&str>) -> String {
    match schema {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => "main".to_string(),
    }
}

fn text_at(row: &fixa_core::Row, idx: usize) -> String {
    row.get(idx)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn int_at(row: &fixa_core::Row, idx: usize) -> i64 {
    row.get(idx).and_then(|v| v.as_i64()).unwrap_or(0)
}

#[async_trait]
impl SchemaIntrospection for SqliteConnection {
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>> {
        let schema = schema_or_main(schema);
        let result = self
            .query(
                "SELECT name FROM pragma_table_list WHERE schema = ?1 AND type = 'table' \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name",
                &[Value::String(schema.clone())],
            )
            .await?;

        let tables: Vec<TableInfo> = result
            .rows
            .iter()
            .map(|row| TableInfo {
                schema: Some(schema.clone()),
                name: text_at(row, 0),
            })
            .collect();

        tracing::debug!(table_count = tables.len(), "tables listed");
        Ok(tables)
    }

    #[tracing::instrument(skip(self))]
    async fn get_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>> {
        // cid, name, type, notnull, dflt_value, pk, hidden
        let result = self
            .query(
                "SELECT * FROM pragma_table_xinfo(?1, ?2)",
                &[
                    Value::String(table.to_string()),
                    Value::String(schema_or_main(schema)),
                ],
            )
            .await?;

        if result.rows.is_empty() {
            return Err(FixaError::NotFound(format!("table '{}'", table)));
        }

        let columns = result
            .rows
            .iter()
            .enumerate()
            .map(|(ordinal, row)| {
                let data_type = text_at(row, 2);
                let (max_length, scale) = declared_length(&data_type);
                let hidden = int_at(row, 6);
                ColumnInfo {
                    name: text_at(row, 1),
                    ordinal,
                    sql_type: SqlType::from_type_name(&data_type),
                    data_type,
                    nullable: int_at(row, 3) == 0,
                    default_value: row.get(4).filter(|v| !v.is_null()).map(|v| v.to_string()),
                    max_length,
                    scale,
                    is_primary_key: int_at(row, 5) > 0,
                    is_computed: hidden == HIDDEN_GENERATED_VIRTUAL
                        || hidden == HIDDEN_GENERATED_STORED,
                }
            })
            .collect();

        Ok(columns)
    }

    #[tracing::instrument(skip(self))]
    async fn get_indexes(&self, schema: Option<&str>, table: &str) -> Result<Vec<IndexInfo>> {
        let schema = schema_or_main(schema);
        // seq, name, unique, origin, partial
        let result = self
            .query(
                "SELECT * FROM pragma_index_list(?1, ?2)",
                &[Value::String(table.to_string()), Value::String(schema.clone())],
            )
            .await?;

        let mut indexes = Vec::new();
        for row in &result.rows {
            let name = text_at(row, 1);
            // seqno, cid, name
            let cols_result = self
                .query(
                    "SELECT * FROM pragma_index_info(?1, ?2) ORDER BY seqno",
                    &[Value::String(name.clone()), Value::String(schema.clone())],
                )
                .await?;

            indexes.push(IndexInfo {
                columns: cols_result.rows.iter().map(|r| text_at(r, 2)).collect(),
                is_unique: int_at(row, 2) == 1,
                is_primary: text_at(row, 3) == "pk",
                name,
            });
        }

        Ok(indexes)
    }

    #[tracing::instrument(skip(self))]
    async fn get_foreign_keys(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ForeignKeyInfo>> {
        let schema = schema_or_main(schema);
        // id, seq, table, from, to, on_update, on_delete, match
        let result = self
            .query(
                "SELECT * FROM pragma_foreign_key_list(?1, ?2) ORDER BY id, seq",
                &[Value::String(table.to_string()), Value::String(schema.clone())],
            )
            .await?;

        // Composite keys arrive as one row per column sharing an id
        let mut by_id: BTreeMap<i64, ForeignKeyInfo> = BTreeMap::new();
        for row in &result.rows {
            let referenced_table = text_at(row, 2);
            let fk = by_id.entry(int_at(row, 0)).or_insert_with(|| ForeignKeyInfo {
                name: format!("fk_{}_{}", table, referenced_table),
                columns: Vec::new(),
                referenced_table,
                referenced_schema: Some(schema.clone()),
                referenced_columns: Vec::new(),
            });
            fk.columns.push(text_at(row, 3));
            fk.referenced_columns.push(text_at(row, 4));
        }

        Ok(by_id.into_values().collect())
    }

    async fn get_primary_key(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Option<PrimaryKeyInfo>> {
        let result = self
            .query(
                "SELECT name, pk FROM pragma_table_info(?1, ?2) WHERE pk > 0 ORDER BY pk",
                &[
                    Value::String(table.to_string()),
                    Value::String(schema_or_main(schema)),
                ],
            )
            .await?;

        if result.rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(PrimaryKeyInfo {
            name: None,
            columns: result.rows.iter().map(|r| text_at(r, 0)).collect(),
        }))
    }
}
