use bommap_model::{CellValue, ColumnName, FactwiseIdRule, Table};

use crate::error::Result;

/// Name of the generated composite-identifier column.
pub const FACTWISE_ID_COLUMN: &str = "Factwise_ID";

/// Writes the composite identifier column.
///
/// Per row, the values of the rule's component columns are joined in order
/// with the separator. A component that is empty or absent renders as an
/// empty segment rather than being skipped, so segment positions keep their
/// meaning across rows.
///
/// Deterministic and idempotent: the column is prepended on first run and
/// overwritten in place on re-runs, never accumulated.
pub fn generate_factwise_id(table: &mut Table, rule: &FactwiseIdRule) -> Result<()> {
    let id_column = ColumnName::new(FACTWISE_ID_COLUMN)?;
    if !table.has_header(&id_column) {
        table.headers.insert(0, id_column.clone());
    }

    for row in &mut table.rows {
        let segments: Vec<&str> = rule
            .components
            .iter()
            .map(|component| row.text(component).unwrap_or_default())
            .collect();
        let id = segments.join(&rule.separator);
        row.set(id_column.clone(), CellValue::Text(id));
    }

    tracing::debug!(
        components = rule.components.len(),
        rows = table.row_count(),
        "generated factwise ids"
    );
    Ok(())
}
