//! Shared database set-up for the fixture integration tests

#![allow(dead_code)]

use anyhow::Result;
use fixa_core::{Connection, Value};
use fixa_driver_sqlite::SqliteConnection;
use fixa_settings::{SCHEMA_KEY, SettingsSource};
use std::collections::HashMap;
use std::sync::Arc;

pub const FAMILY: &str = r#"
CREATE TABLE GRANPA (ID CHAR(3) PRIMARY KEY, NAME VARCHAR(20));
CREATE TABLE FATHER (
    ID CHAR(3) PRIMARY KEY,
    GRANPA_ID CHAR(3) NOT NULL REFERENCES GRANPA(ID),
    BORN DATE
);
CREATE TABLE SON (
    ID CHAR(3) PRIMARY KEY,
    FATHER_ID CHAR(3) NOT NULL REFERENCES FATHER(ID),
    ALLOWANCE DECIMAL(7, 2)
);
CREATE TABLE DAUGHTER (
    ID CHAR(3) PRIMARY KEY,
    FATHER_ID CHAR(3) NOT NULL REFERENCES FATHER(ID),
    PHOTO BLOB
);
CREATE TABLE STRANGER (ID CHAR(3) PRIMARY KEY);
"#;

/// Run once per test binary
pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

pub fn family() -> Result<Arc<SqliteConnection>> {
    initialize_logging();
    let conn = SqliteConnection::open(":memory:")?;
    conn.execute_script(FAMILY)?;
    Ok(Arc::new(conn))
}

pub fn settings(pairs: &[(&str, &str)]) -> Arc<dyn SettingsSource> {
    let mut map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    map.entry(SCHEMA_KEY.to_string())
        .or_insert_with(|| "main".to_string());
    Arc::new(map)
}

pub async fn count(conn: &dyn Connection, table: &str) -> Result<i64> {
    let result = conn
        .query(&format!("SELECT COUNT(*) FROM {table}"), &[])
        .await?;
    Ok(result
        .rows
        .first()
        .and_then(|r| r.get(0))
        .and_then(Value::as_i64)
        .unwrap_or(-1))
}

pub async fn texts(conn: &dyn Connection, sql: &str) -> Result<Vec<String>> {
    let result = conn.query(sql, &[]).await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|r| r.get(0))
        .map(|v| v.to_string())
        .collect())
}
