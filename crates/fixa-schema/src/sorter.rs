//! Orders tables by their foreign-key dependencies

use crate::DependencyParser;
use fixa_core::{Connection, FixaError, Result};
use fixa_settings::{SCHEMA_KEY, SUPPRESS_TABLE_SORT_KEY, SettingsSource};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use unicase::UniCase;

/// Anything that can be ordered by the table it belongs to
pub trait TableNamed {
    fn table_name(&self) -> &str;
}

impl TableNamed for String {
    fn table_name(&self) -> &str {
        self
    }
}

impl TableNamed for str {
    fn table_name(&self) -> &str {
        self
    }
}

impl<T: TableNamed + ?Sized> TableNamed for &T {
    fn table_name(&self) -> &str {
        (**self).table_name()
    }
}

/// Sorts tables parent-first for inserts, or child-first for deletes.
///
/// The dependency ranking is read from the database the first time it is
/// needed and kept for the lifetime of the sorter. Tables outside the
/// foreign-key graph rank alongside the roots.
pub struct TableSorter {
    conn: Arc<dyn Connection>,
    settings: Arc<dyn SettingsSource>,
    schema: Option<String>,
    ranks: OnceCell<HashMap<UniCase<String>, usize>>,
}

impl TableSorter {
    pub fn new(conn: Arc<dyn Connection>, settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            conn,
            settings,
            schema: None,
            ranks: OnceCell::new(),
        }
    }

    /// Read foreign keys from `schema` instead of the configured one. An
    /// empty name means the connection's default schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Parents before children. The input is left untouched.
    pub async fn sort<T: TableNamed + Clone>(&self, tables: &[T]) -> Result<Vec<T>> {
        let mut sorted = tables.to_vec();
        if self.settings.get_bool(SUPPRESS_TABLE_SORT_KEY) {
            tracing::debug!(tables = sorted.len(), "table sort suppressed");
            return Ok(sorted);
        }

        let ranks = self.ranks().await?;
        sorted.sort_by_key(|t| rank_in(ranks, t.table_name()));
        Ok(sorted)
    }

    /// Children before parents
    pub async fn reversed<T: TableNamed + Clone>(&self, tables: &[T]) -> Result<Vec<T>> {
        let mut sorted = self.sort(tables).await?;
        sorted.reverse();
        Ok(sorted)
    }

    /// Dependency depth of one table; 0 for roots and unrelated tables
    pub async fn rank_of(&self, table: &str) -> Result<usize> {
        Ok(rank_in(self.ranks().await?, table))
    }

    async fn ranks(&self) -> Result<&HashMap<UniCase<String>, usize>> {
        self.ranks
            .get_or_try_init(|| async {
                let schema = self
                    .schema
                    .clone()
                    .or_else(|| {
                        self.settings
                            .get_string(SCHEMA_KEY)
                            .filter(|s| !s.trim().is_empty())
                    })
                    .ok_or_else(|| {
                        FixaError::Configuration(format!(
                            "'{}' must be set to sort tables by their foreign keys",
                            SCHEMA_KEY
                        ))
                    })?;
                let meta = self.conn.as_schema_introspection().ok_or_else(|| {
                    FixaError::NotSupported(format!(
                        "driver '{}' does not expose foreign key metadata",
                        self.conn.driver_name()
                    ))
                })?;

                let mut parser = DependencyParser::new();
                parser.parse(meta, &schema).await?;
                let ranks: HashMap<_, _> = parser
                    .ranks()?
                    .into_iter()
                    .map(|(name, depth)| (UniCase::new(name), depth))
                    .collect();

                tracing::info!(schema = %schema, tables = ranks.len(), "table ranking built");
                Ok::<_, FixaError>(ranks)
            })
            .await
    }
}

fn rank_in(ranks: &HashMap<UniCase<String>, usize>, table: &str) -> usize {
    ranks
        .get(&UniCase::new(table.trim().to_string()))
        .copied()
        .unwrap_or(0)
}
