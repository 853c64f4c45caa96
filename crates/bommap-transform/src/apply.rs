use std::collections::BTreeMap;

use bommap_model::{CellValue, ColumnName, HeaderMapping, Row, Table};

/// Projects a source table onto the target schema.
///
/// Output column order follows the mapping's entry order. A target without a
/// source, or whose source column is missing from the table, gets a
/// [`CellValue::Missing`] cell in every row. One source column may feed
/// several targets.
pub fn apply_mapping(source: &Table, mapping: &HeaderMapping) -> Table {
    let mut table = Table::new(mapping.targets().cloned().collect());

    for source_row in &source.rows {
        let mut row = Row::new();
        for entry in mapping.entries() {
            let cell = entry
                .source
                .as_ref()
                .and_then(|source_column| source_row.get(source_column))
                .cloned()
                .unwrap_or(CellValue::Missing);
            row.set(entry.target.clone(), cell);
        }
        table.push_row(row);
    }

    tracing::debug!(
        targets = table.headers.len(),
        rows = table.row_count(),
        "applied mapping"
    );
    table
}

/// Fills blank or absent cells of known columns with literal defaults.
/// Cells that already carry a value are left alone.
pub fn apply_default_values(table: &mut Table, defaults: &BTreeMap<ColumnName, String>) {
    for (column, value) in defaults {
        if !table.has_header(column) {
            continue;
        }
        for row in &mut table.rows {
            let blank = row
                .get(column)
                .is_none_or(|cell| cell.as_text().is_empty());
            if blank {
                row.set(column.clone(), CellValue::Text(value.clone()));
            }
        }
    }
}
