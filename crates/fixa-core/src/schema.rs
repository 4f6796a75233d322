//! Schema introspection traits and types

use crate::{Result, SqlType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Schema introspection interface
///
/// `schema` selects the namespace to inspect; `None` means the
/// connection's default schema.
#[async_trait]
pub trait SchemaIntrospection: Send + Sync {
    /// List all base tables in a schema
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>>;

    /// Get columns for a table, in ordinal order
    async fn get_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Get indexes for a table
    async fn get_indexes(&self, schema: Option<&str>, table: &str) -> Result<Vec<IndexInfo>>;

    /// Get the foreign keys a table imports (the table is the child side)
    async fn get_foreign_keys(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ForeignKeyInfo>>;

    /// Get primary key for a table
    async fn get_primary_key(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Option<PrimaryKeyInfo>>;

    /// Convert an identifier to the case the database stores it in
    fn normalize_identifier(&self, identifier: &str) -> String {
        identifier.to_string()
    }
}

/// Table information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: Option<String>,
    pub name: String,
}

/// Column information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub ordinal: usize,
    /// Type as declared by the database
    pub data_type: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub default_value: Option<String>,
    /// Declared length (character width or numeric precision)
    pub max_length: Option<i64>,
    pub scale: Option<i32>,
    pub is_primary_key: bool,
    /// Database-generated column that must never appear in an INSERT
    pub is_computed: bool,
}

impl Default for ColumnInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            ordinal: 0,
            data_type: String::new(),
            sql_type: SqlType::Other,
            nullable: true,
            default_value: None,
            max_length: None,
            scale: None,
            is_primary_key: false,
            is_computed: false,
        }
    }
}

/// Index information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
}

/// Foreign key information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub name: String,
    pub columns: Vec<String>,
    /// The parent table
    pub referenced_table: String,
    pub referenced_schema: Option<String>,
    pub referenced_columns: Vec<String>,
}

/// Primary key information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKeyInfo {
    pub name: Option<String>,
    /// Key columns in key sequence order
    pub columns: Vec<String>,
}
