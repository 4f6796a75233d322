//! Schema introspection tests against an in-memory SQLite database

use anyhow::{Context, Result};
use fixa_core::{Connection, SchemaIntrospection, SqlType, Value};
use fixa_driver_sqlite::SqliteConnection;
use pretty_assertions::assert_eq;

const SCHEMA: &str = r#"
CREATE TABLE GRANPA (ID INTEGER PRIMARY KEY, NAME VARCHAR(20) NOT NULL);
CREATE TABLE FATHER (
    ID INTEGER PRIMARY KEY,
    GRANPA_ID INTEGER REFERENCES GRANPA(ID),
    CODE CHAR(4) UNIQUE
);
CREATE TABLE SON (
    FATHER_ID INTEGER NOT NULL REFERENCES FATHER(ID),
    SEQ INTEGER NOT NULL,
    PRICE DECIMAL(10, 2),
    TOTAL DECIMAL(12, 2) GENERATED ALWAYS AS (PRICE * 2) VIRTUAL,
    PRIMARY KEY (SEQ, FATHER_ID)
);
"#;

fn open() -> Result<SqliteConnection> {
    let conn = SqliteConnection::open(":memory:")?;
    conn.execute_script(SCHEMA)?;
    Ok(conn)
}

#[tokio::test]
async fn test_list_tables_is_sorted_and_skips_internal_tables() -> Result<()> {
    let conn = open()?;
    let names: Vec<String> = conn
        .list_tables(None)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["FATHER", "GRANPA", "SON"]);
    Ok(())
}

#[tokio::test]
async fn test_columns_carry_type_length_and_computed_flag() -> Result<()> {
    let conn = open()?;
    let columns = conn.get_columns(None, "SON").await?;

    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["FATHER_ID", "SEQ", "PRICE", "TOTAL"]);

    let price = columns.iter().find(|c| c.name == "PRICE").context("PRICE")?;
    assert_eq!(price.sql_type, SqlType::Decimal);
    assert_eq!(price.max_length, Some(10));
    assert_eq!(price.scale, Some(2));
    assert!(!price.is_computed);

    let total = columns.iter().find(|c| c.name == "TOTAL").context("TOTAL")?;
    assert!(total.is_computed);
    Ok(())
}

#[tokio::test]
async fn test_unknown_table_is_not_found() -> Result<()> {
    let conn = open()?;
    let err = conn.get_columns(None, "NOPE").await.err().context("expected error")?;
    assert!(err.to_string().contains("NOPE"));
    Ok(())
}

#[tokio::test]
async fn test_primary_key_follows_key_sequence() -> Result<()> {
    let conn = open()?;
    let pk = conn.get_primary_key(None, "SON").await?.context("pk")?;
    assert_eq!(pk.columns, vec!["SEQ", "FATHER_ID"]);
    assert!(conn.get_primary_key(None, "GRANPA").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_foreign_keys_point_at_parents() -> Result<()> {
    let conn = open()?;
    let fks = conn.get_foreign_keys(None, "SON").await?;
    assert_eq!(fks.len(), 1);
    assert_eq!(fks[0].referenced_table, "FATHER");
    assert_eq!(fks[0].columns, vec!["FATHER_ID"]);
    assert!(conn.get_foreign_keys(None, "GRANPA").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unique_index_columns() -> Result<()> {
    let conn = open()?;
    let indexes = conn.get_indexes(None, "FATHER").await?;
    let unique: Vec<&str> = indexes
        .iter()
        .filter(|i| i.is_unique && !i.is_primary)
        .flat_map(|i| i.columns.iter().map(String::as_str))
        .collect();
    assert_eq!(unique, vec!["CODE"]);
    Ok(())
}

#[tokio::test]
async fn test_attached_schema_is_addressable() -> Result<()> {
    let conn = open()?;
    conn.execute_script(
        "ATTACH DATABASE ':memory:' AS backup; \
         CREATE TABLE backup.GRANPA (ID INTEGER PRIMARY KEY, NAME VARCHAR(20));",
    )?;
    conn.execute(
        "INSERT INTO backup.GRANPA VALUES (?, ?)",
        &[Value::Int64(1), Value::from("x")],
    )
    .await?;

    let tables = conn.list_tables(Some("backup")).await?;
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].schema.as_deref(), Some("backup"));
    assert_eq!(conn.get_columns(Some("backup"), "GRANPA").await?.len(), 2);
    Ok(())
}
