//! Compare fixture tables with what the database holds

use crate::table_data::{CellKind, TableData, cell_text, normalize_expected};
use fixa_core::{Connection, FixaError, Result};
use std::collections::HashMap;

/// Load the rows the database holds for `expected`'s table and columns, then
/// compare them with [`assert_table_data_equals`].
pub async fn assert_table_equals(
    message: &str,
    expected: &TableData,
    conn: &dyn Connection,
) -> Result<()> {
    let mut actual = expected.clone();
    actual.load_data(conn).await?;
    assert_table_data_equals(message, expected, &actual).await
}

/// Rows are paired by primary key. Every declared column of each expected
/// row must read the same as its counterpart when both are printed, and
/// the actual side may not hold rows the expected side lacks.
#[tracing::instrument(skip_all, fields(table = %expected.table_name()))]
pub async fn assert_table_data_equals(
    message: &str,
    expected: &TableData,
    actual: &TableData,
) -> Result<()> {
    let table = expected.table_name();
    let primary_keys = expected.primary_keys().await?;
    let columns = expected.column_names().await?;

    let mut kinds = HashMap::new();
    for column in primary_keys.iter().chain(&columns) {
        if !kinds.contains_key(column) {
            kinds.insert(column.clone(), expected.cell_kind(column).await?);
        }
    }
    let expected_text = |row: usize, column: &str| {
        let kind = kinds.get(column).copied().unwrap_or(CellKind::Text);
        cell_text(
            expected
                .value(row, column)
                .map(|v| normalize_expected(kind, v))
                .as_ref(),
        )
    };

    let mut found = vec![false; actual.size()];
    for exp_row in 0..expected.size() {
        let same_pk = (0..actual.size()).find(|&act_row| {
            primary_keys
                .iter()
                .all(|pk| expected_text(exp_row, pk) == cell_text(actual.value(act_row, pk)))
        });
        let Some(act_row) = same_pk else {
            return Err(failure(
                message,
                format!(
                    "the table of [{}] is expected to have a record whose PK is [{}], \
                     but there is no such record in the table. row number=[{}]",
                    table,
                    expected.pk_values(exp_row).await?,
                    exp_row + 1
                ),
            ));
        };
        found[act_row] = true;

        for column in &columns {
            let want = expected_text(exp_row, column);
            let got = cell_text(actual.value(act_row, column));
            if want != got {
                return Err(failure(
                    message,
                    format!(
                        "table={} line={} column={} expected:<{}> but was:<{}>",
                        table,
                        exp_row + 1,
                        column,
                        want,
                        got
                    ),
                ));
            }
        }
    }

    if let Some(extra) = found.iter().position(|f| !f) {
        return Err(failure(
            message,
            format!(
                "an unexpected record is included in the table of [{}]. PK=[{}]",
                actual.table_name(),
                actual.pk_values(extra).await?
            ),
        ));
    }

    tracing::debug!(rows = expected.size(), "table matched");
    Ok(())
}

pub(crate) fn failure(message: &str, detail: String) -> FixaError {
    if message.is_empty() {
        FixaError::Assertion(detail)
    } else {
        FixaError::Assertion(format!("{} {}", message, detail))
    }
}
