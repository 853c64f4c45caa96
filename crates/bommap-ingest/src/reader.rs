use std::collections::BTreeMap;
use std::io::Cursor;

use calamine::{Reader, Xlsx};

use bommap_model::{CellValue, ColumnName, Row, Table};

use crate::error::{IngestError, Result};
use crate::format::SourceFormat;

/// Where to find the header row inside a source.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Worksheet name; `None` selects the first sheet. Ignored for CSV.
    pub sheet: Option<String>,
    /// 1-based header row index.
    pub header_row: u32,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            header_row: 1,
        }
    }
}

/// Extracts the ordered header list from a source.
///
/// Trailing blank cells are trimmed and interior blanks dropped; the result
/// contains only usable header names. Fails with
/// [`IngestError::InvalidHeaderRow`] when the row is out of range or yields
/// no non-empty cells.
pub fn extract_headers(
    bytes: &[u8],
    format: SourceFormat,
    options: &ReadOptions,
) -> Result<Vec<ColumnName>> {
    let grid = read_grid(bytes, format, options)?;
    let header_cells = header_cells(&grid, options.header_row)?;
    let mut headers = Vec::new();
    for cell in header_cells {
        if !cell.is_empty() {
            headers.push(ColumnName::new(cell)?);
        }
    }
    tracing::debug!(count = headers.len(), "extracted headers");
    Ok(headers)
}

/// Reads the full table: headers plus every data row below the header row.
///
/// Fully blank data rows are skipped. Cells are trimmed; blank cells become
/// [`CellValue::Missing`]. Cells under a blank header have no addressable
/// column and are dropped.
pub fn read_table(bytes: &[u8], format: SourceFormat, options: &ReadOptions) -> Result<Table> {
    let grid = read_grid(bytes, format, options)?;
    let header_cells = header_cells(&grid, options.header_row)?;

    // Column index -> header, skipping blank header cells.
    let mut columns: Vec<(usize, ColumnName)> = Vec::new();
    for (idx, cell) in header_cells.iter().enumerate() {
        if !cell.is_empty() {
            columns.push((idx, ColumnName::new(cell.clone())?));
        }
    }

    let mut table = Table::new(columns.iter().map(|(_, name)| name.clone()).collect());
    for raw_row in grid.iter().skip(options.header_row as usize) {
        if raw_row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut row = Row::new();
        for (idx, name) in &columns {
            let raw = raw_row.get(*idx).map(String::as_str).unwrap_or_default();
            row.set(name.clone(), CellValue::from_raw(raw));
        }
        table.push_row(row);
    }

    tracing::debug!(
        columns = table.headers.len(),
        rows = table.row_count(),
        "read table"
    );
    Ok(table)
}

/// First `sample_rows` non-blank values per column, for surfacing match
/// context next to mapping proposals.
pub fn read_sample_data(
    bytes: &[u8],
    format: SourceFormat,
    options: &ReadOptions,
    sample_rows: usize,
) -> Result<BTreeMap<ColumnName, Vec<String>>> {
    let table = read_table(bytes, format, options)?;
    let mut samples: BTreeMap<ColumnName, Vec<String>> = BTreeMap::new();
    for header in &table.headers {
        let values: Vec<String> = table
            .rows
            .iter()
            .filter_map(|row| row.get(header))
            .filter(|cell| !cell.is_missing())
            .take(sample_rows)
            .map(|cell| cell.as_text().to_string())
            .collect();
        samples.insert(header.clone(), values);
    }
    Ok(samples)
}

/// The header row's cells, trimmed, with trailing blanks removed.
fn header_cells(grid: &[Vec<String>], header_row: u32) -> Result<Vec<String>> {
    if header_row == 0 {
        return Err(IngestError::InvalidHeaderRow {
            row: header_row,
            reason: "header row numbering starts at 1".to_string(),
        });
    }
    let index = (header_row - 1) as usize;
    let Some(raw) = grid.get(index) else {
        return Err(IngestError::InvalidHeaderRow {
            row: header_row,
            reason: format!("sheet has only {} rows", grid.len()),
        });
    };

    let mut cells: Vec<String> = raw.iter().map(|cell| cell.trim().to_string()).collect();
    while cells.last().is_some_and(String::is_empty) {
        cells.pop();
    }
    if cells.iter().all(String::is_empty) {
        return Err(IngestError::InvalidHeaderRow {
            row: header_row,
            reason: "row contains no non-empty cells".to_string(),
        });
    }
    Ok(cells)
}

/// Normalizes either backend into sheet-absolute rows of cell text.
fn read_grid(bytes: &[u8], format: SourceFormat, options: &ReadOptions) -> Result<Vec<Vec<String>>> {
    match format {
        SourceFormat::Csv => read_csv_grid(bytes),
        SourceFormat::Xlsx => read_xlsx_grid(bytes, options.sheet.as_deref()),
    }
}

fn read_csv_grid(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(grid)
}

fn read_xlsx_grid(bytes: &[u8], sheet: Option<&str>) -> Result<Vec<Vec<String>>> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    let sheet_names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(name) => {
            if !sheet_names.iter().any(|candidate| candidate == name) {
                return Err(IngestError::SheetNotFound(name.to_string()));
            }
            name.to_string()
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or(IngestError::EmptyWorkbook)?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;

    // The range is the non-empty bounding box; pad leading rows so indices
    // stay sheet-absolute and 1-based header rows mean what users expect.
    let leading_rows = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut grid: Vec<Vec<String>> = vec![Vec::new(); leading_rows];
    for row in range.rows() {
        grid.push(row.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(grid)
}
