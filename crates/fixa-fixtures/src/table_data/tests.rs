//! Tests for fixture table data

use super::*;
use fixa_driver_sqlite::SqliteConnection;
use fixa_schema::GenericDbInfo;

const ITEM: &str = r#"
CREATE TABLE ITEM (
    ITEM_ID CHAR(5) NOT NULL PRIMARY KEY,
    NAME VARCHAR(20),
    CODE CHAR(3),
    PRICE DECIMAL(8, 2),
    IMAGE BLOB,
    ENABLED BOOLEAN,
    RELEASED DATE,
    UPDATED_AT TIMESTAMP
);
"#;

struct Db {
    conn: Arc<SqliteConnection>,
    info: Arc<dyn DbInfo>,
}

impl Db {
    fn open(ddl: &str) -> anyhow::Result<Self> {
        let conn = Arc::new(SqliteConnection::open(":memory:")?);
        conn.execute_script(ddl)?;
        let info: Arc<dyn DbInfo> = Arc::new(GenericDbInfo::new(conn.clone(), None));
        Ok(Self { conn, info })
    }

    fn table(&self, name: &str, columns: &[&str]) -> TableData {
        TableData::new(self.info.clone(), name).with_columns(columns)
    }

    async fn insert(&self, table: &TableData) -> anyhow::Result<u64> {
        let tx = self.conn.begin_transaction().await?;
        let inserted = table.insert_data(tx.as_ref()).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn load(&self, name: &str) -> anyhow::Result<TableData> {
        let mut table = TableData::new(self.info.clone(), name);
        table.load_data(self.conn.as_ref()).await?;
        Ok(table)
    }

    async fn count(&self, table: &str) -> anyhow::Result<i64> {
        let result = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {table}"), &[])
            .await?;
        Ok(result
            .rows
            .first()
            .and_then(|r| r.get(0))
            .and_then(Value::as_i64)
            .unwrap_or(-1))
    }
}

fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

mod row_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_add_row_keeps_cells_as_text() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut table = db.table(" item ", &["item_id", "Name"]);
        table.add_row(&[Some("A1"), None])?;

        assert_eq!(table.table_name(), "ITEM");
        assert_eq!(table.size(), 1);
        assert_eq!(table.value(0, "ITEM_ID"), Some(&text("A1")));
        assert_eq!(table.value(0, "name"), Some(&Value::Null));
        assert_eq!(table.value(0, "PRICE"), None);
        assert_eq!(table.value(1, "ITEM_ID"), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_row_requires_declared_columns() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut undeclared = TableData::new(db.info.clone(), "ITEM");
        assert!(matches!(
            undeclared.add_row(&[Some("A1")]),
            Err(FixaError::Configuration(_))
        ));

        let mut table = db.table("ITEM", &["ITEM_ID", "NAME"]);
        let err = table.add_row(&[Some("A1")]).err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("Configuration error: table [ITEM] has 2 columns but the row has 1 cells")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_alter_and_set_value() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut table = db.table("ITEM", &["ITEM_ID", "IMAGE"]);
        table.add_row(&[Some("A1"), Some("0aff")])?;

        assert_eq!(table.bytes(0, "IMAGE")?, Some(vec![0x0a, 0xff]));
        table.alter_column_value(0, "image", None)?;
        assert_eq!(table.bytes(0, "IMAGE")?, None);

        table.set_value(0, "PRICE", Value::Decimal("9.5".into()))?;
        assert_eq!(table.value(0, "PRICE"), Some(&Value::Decimal("9.5".into())));

        assert!(matches!(
            table.alter_column_value(3, "IMAGE", Some("00")),
            Err(FixaError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_pk_values_and_display() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut table = db.table("ITEM", &["ITEM_ID", "NAME"]);
        table.add_row(&[Some("A1"), None])?;
        table.add_row(&[Some("A2"), Some("pen")])?;

        assert_eq!(table.pk_values(1).await?, "ITEM_ID=A2");
        assert_eq!(
            table.to_string(),
            "TABLE_NAME=[ITEM], COLUMN_NAME=[ITEM_ID, NAME], DATA=[{ITEM_ID=A1, NAME=null}, {ITEM_ID=A2, NAME=pen}]"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_fill_default_values_widens_columns() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut table = db.table("ITEM", &["ITEM_ID", "NAME"]);
        table.add_row(&[Some("A1"), None])?;
        table.fill_default_values().await?;

        assert_eq!(table.column_names().await?.len(), 8);
        assert_eq!(table.value(0, "NAME"), Some(&Value::Null));
        assert_eq!(table.value(0, "CODE"), Some(&text("   ")));
        assert_eq!(table.value(0, "PRICE"), Some(&Value::Decimal("0".into())));
        assert_eq!(table.value(0, "ENABLED"), Some(&Value::Bool(false)));
        Ok(())
    }
}

mod insert_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_omitted_columns_take_defaults_but_null_stays_null() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut table = db.table("ITEM", &["ITEM_ID", "NAME"]);
        table.add_row(&[Some("A1"), None])?;
        assert_eq!(db.insert(&table).await?, 1);

        let loaded = db.load("ITEM").await?;
        assert_eq!(loaded.value(0, "NAME"), Some(&Value::Null));
        assert_eq!(loaded.value(0, "CODE"), Some(&text("   ")));
        assert_eq!(loaded.value(0, "PRICE"), Some(&Value::Decimal("0".into())));
        assert_eq!(loaded.value(0, "IMAGE"), Some(&text("00000000000000000000")));
        assert_eq!(loaded.value(0, "ENABLED"), Some(&Value::Bool(false)));
        assert_eq!(loaded.value(0, "RELEASED"), Some(&text("1970-01-01")));
        assert_eq!(
            loaded.value(0, "UPDATED_AT"),
            Some(&text("1970-01-01 00:00:00.000"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_typed_columns_are_coerced() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut table = db.table(
            "ITEM",
            &["ITEM_ID", "PRICE", "IMAGE", "ENABLED", "RELEASED", "UPDATED_AT"],
        );
        table.add_row(&[
            Some("A1"),
            Some("1.50"),
            Some("0aff"),
            Some("yes"),
            Some("20240102"),
            Some("2024-01-02 03:04:05.6"),
        ])?;
        table.add_row(&[Some("A2"), Some(""), Some(""), Some(""), Some(""), Some("")])?;
        db.insert(&table).await?;

        let loaded = db.load("ITEM").await?;
        assert_eq!(loaded.value(0, "PRICE"), Some(&Value::Decimal("1.5".into())));
        assert_eq!(loaded.value(0, "IMAGE"), Some(&text("0AFF")));
        assert_eq!(loaded.value(0, "ENABLED"), Some(&Value::Bool(true)));
        assert_eq!(loaded.value(0, "RELEASED"), Some(&text("2024-01-02")));
        assert_eq!(
            loaded.value(0, "UPDATED_AT"),
            Some(&text("2024-01-02 03:04:05.600"))
        );
        for column in ["PRICE", "IMAGE", "ENABLED", "RELEASED", "UPDATED_AT"] {
            assert_eq!(loaded.value(1, column), Some(&Value::Null), "{column}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_cell_reports_its_position() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut table = db.table("item", &["ITEM_ID", "PRICE"]);
        table.add_row(&[Some("A1"), Some("1")])?;
        table.add_row(&[Some("A2"), Some("abc")])?;

        let err = db.insert(&table).await.err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some(
                "invalid number format. tableName = [ITEM]:rowNo = [2]:columnName = [PRICE]:value = [abc]"
            )
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_rows_beyond_one_batch_are_all_inserted() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut table = db.table("ITEM", &["ITEM_ID"]).with_batch_size(2);
        for i in 0..5 {
            table.add_row(&[Some(format!("A{i}"))])?;
        }

        assert_eq!(db.insert(&table).await?, 5);
        assert_eq!(db.count("ITEM").await?, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_computed_columns_are_skipped() -> anyhow::Result<()> {
        let db = Db::open(
            "CREATE TABLE T (ID INTEGER PRIMARY KEY, N INTEGER,
             TWICE INTEGER GENERATED ALWAYS AS (N * 2) STORED);",
        )?;
        let mut table = db.table("T", &["ID", "N"]);
        table.add_row(&[Some("1"), Some("21")])?;
        db.insert(&table).await?;

        let loaded = db.load("T").await?;
        assert_eq!(loaded.value(0, "TWICE"), Some(&Value::Decimal("42".into())));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_clears_the_table() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        db.conn
            .execute_script("INSERT INTO ITEM (ITEM_ID) VALUES ('X1'), ('X2');")?;

        let table = db.table("ITEM", &["ITEM_ID"]);
        let tx = db.conn.begin_transaction().await?;
        assert_eq!(table.delete_data(tx.as_ref()).await?, 2);
        tx.commit().await?;
        assert_eq!(db.count("ITEM").await?, 0);
        Ok(())
    }
}

mod load_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_load_orders_by_primary_key_and_normalizes() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        db.conn.execute_script(
            "INSERT INTO ITEM (ITEM_ID, PRICE, IMAGE, ENABLED, RELEASED) VALUES
             ('B', 2.00, x'0aff', 1, '2024-01-02'),
             ('A', 1.25, NULL, 0, NULL);",
        )?;

        let loaded = db.load("item").await?;
        assert_eq!(loaded.size(), 2);
        assert_eq!(loaded.pk_values(0).await?, "ITEM_ID=A");
        assert_eq!(loaded.value(0, "PRICE"), Some(&Value::Decimal("1.25".into())));
        assert_eq!(loaded.value(1, "PRICE"), Some(&Value::Decimal("2".into())));
        assert_eq!(loaded.value(1, "IMAGE"), Some(&text("0AFF")));
        assert_eq!(loaded.value(0, "ENABLED"), Some(&Value::Bool(false)));
        assert_eq!(loaded.value(1, "RELEASED"), Some(&text("2024-01-02")));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_only_declared_columns() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        db.conn
            .execute_script("INSERT INTO ITEM (ITEM_ID, NAME) VALUES ('A', 'pen');")?;

        let mut table = db.table("ITEM", &["NAME"]);
        table.load_data(db.conn.as_ref()).await?;
        assert_eq!(table.rows().first().map(|r| r.len()), Some(1));
        assert_eq!(table.value(0, "NAME"), Some(&text("pen")));
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_data_swaps_contents() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        db.conn
            .execute_script("INSERT INTO ITEM (ITEM_ID) VALUES ('OLD');")?;

        let mut table = db.table("ITEM", &["ITEM_ID", "NAME"]);
        table.add_row(&[Some("NEW"), Some("pen")])?;
        table.replace_data(db.conn.as_ref()).await?;

        let loaded = db.load("ITEM").await?;
        assert_eq!(loaded.size(), 1);
        assert_eq!(loaded.value(0, "ITEM_ID"), Some(&text("NEW")));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_contents() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        db.conn
            .execute_script("INSERT INTO ITEM (ITEM_ID) VALUES ('OLD');")?;

        let mut table = db.table("ITEM", &["ITEM_ID", "ENABLED"]);
        table.add_row(&[Some("NEW"), Some("maybe")])?;
        assert!(table.replace_data(db.conn.as_ref()).await.is_err());

        let loaded = db.load("ITEM").await?;
        assert_eq!(loaded.value(0, "ITEM_ID"), Some(&text("OLD")));
        Ok(())
    }

    #[tokio::test]
    async fn test_loaded_data_reinserts_unchanged() -> anyhow::Result<()> {
        let db = Db::open(ITEM)?;
        let mut table = db.table("ITEM", &["ITEM_ID", "PRICE", "IMAGE", "UPDATED_AT"]);
        table.add_row(&[Some("A1"), Some("3.10"), Some("cafe"), Some("20240102030405")])?;
        table.add_row(&[Some("A2"), None, None, Some("2024-12-31")])?;
        db.insert(&table).await?;

        let first = db.load("ITEM").await?;
        first.replace_data(db.conn.as_ref()).await?;
        let second = db.load("ITEM").await?;
        assert_eq!(first.rows(), second.rows());
        Ok(())
    }
}
