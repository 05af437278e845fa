use crate::mapper::{detect_marketplace, map_columns};
use crate::types::{CanonicalField, CellValue, ColumnMapping, Marketplace, NormalizedRow, RowRef, Table};
use crate::util::{coerce_date, coerce_f64, coerce_text, excel_serial_to_datetime, parse_datetime_safe};
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info, warn};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub normalized_rows: usize,
    pub dropped_rows: usize,
    pub undated_rows: usize,
}

/// Everything the dashboard needs to know about one loaded export.
#[derive(Debug, Clone)]
pub struct Detection {
    pub rows: Vec<NormalizedRow>,
    pub marketplace: Marketplace,
    pub mapping: ColumnMapping,
    pub load_report: LoadReport,
}

/// Read a marketplace export into a [`Table`]. Spreadsheet formats go
/// through calamine, everything else is read as CSV.
pub fn load_table(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let table = if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
        load_workbook(path)?
    } else {
        load_csv(path)?
    };
    info!(
        path = %path.display(),
        columns = table.columns().len(),
        rows = table.len(),
        "table loaded"
    );
    Ok(table)
}

pub fn load_csv(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read csv: {}", path.display()))?;
    let text = String::from_utf8(bytes)
        .with_context(|| format!("csv is not valid UTF-8 (re-save it as UTF-8): {}", path.display()))?;
    parse_csv(&text).with_context(|| format!("failed to parse csv: {}", path.display()))
}

/// Parse CSV text. The delimiter is `;` when the header line carries more
/// semicolons than commas, which is how Russian-locale exports come out.
pub fn parse_csv(text: &str) -> Result<Table> {
    let text = text.trim_start_matches('\u{FEFF}');
    let header_line = text.lines().next().unwrap_or("");
    let delimiter = if header_line.matches(';').count() > header_line.matches(',').count() {
        b';'
    } else {
        b','
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers = rdr.headers().context("failed to read csv headers")?.clone();
    let mut table = Table::new(headers.iter().enumerate().map(|(i, h)| header_name(h, i)).collect());

    for (idx, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(row = idx, error = %e, "skipping malformed csv record");
                continue;
            }
        };
        let cells = record
            .iter()
            .map(|v| {
                if v.trim().is_empty() {
                    CellValue::Missing
                } else {
                    CellValue::Text(v.to_string())
                }
            })
            .collect();
        table.push_row(cells);
    }
    Ok(table)
}

/// Read the first worksheet of a workbook; its first row is the header.
pub fn load_workbook(path: &Path) -> Result<Table> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("failed to open workbook: {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .with_context(|| format!("workbook has no worksheets: {}", path.display()))?
        .with_context(|| format!("failed to read first worksheet: {}", path.display()))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let mut table = Table::new(
        header
            .iter()
            .enumerate()
            .map(|(i, cell)| header_name(&header_text(cell), i))
            .collect(),
    );
    for row in rows {
        table.push_row(row.iter().map(cell_value).collect());
    }
    Ok(table)
}

fn header_name(raw: &str, idx: usize) -> String {
    if raw.trim().is_empty() {
        format!("Unnamed: {idx}")
    } else {
        raw.to_string()
    }
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        CellValue::Missing => String::new(),
        other => coerce_text(&other),
    }
}

pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Float(v) => CellValue::Number(*v),
        Data::Bool(v) => CellValue::Number(if *v { 1.0 } else { 0.0 }),
        Data::String(v) if v.trim().is_empty() => CellValue::Missing,
        Data::String(v) => CellValue::Text(v.clone()),
        Data::DateTime(v) => match excel_serial_to_datetime(v.as_f64()) {
            Some(dt) => CellValue::Date(dt),
            None => CellValue::Number(v.as_f64()),
        },
        Data::DateTimeIso(v) => match parse_datetime_safe(v) {
            Some(dt) => CellValue::Date(dt),
            None => CellValue::Text(v.clone()),
        },
        Data::DurationIso(v) => CellValue::Text(v.clone()),
        Data::Error(_) | Data::Empty => CellValue::Missing,
    }
}

/// Reshape one source row into the canonical record.
///
/// Any numeric field that cannot be coerced drops the whole row (`None`).
/// An unreadable date only clears the date; the row is kept.
pub fn normalize_row(row: &RowRef<'_>, mapping: &ColumnMapping) -> Option<NormalizedRow> {
    let cell = |field: CanonicalField| match mapping.get(field) {
        Some(column) => row.get(column),
        None => &CellValue::Missing,
    };
    let date = match mapping.get(CanonicalField::Date) {
        Some(column) => coerce_date(row.get(column)),
        None => None,
    };

    Some(NormalizedRow {
        turnover: coerce_f64(cell(CanonicalField::Turnover))?,
        commission: coerce_f64(cell(CanonicalField::Commission))?,
        logistics: coerce_f64(cell(CanonicalField::Logistics))?,
        cost: coerce_f64(cell(CanonicalField::Cost))?,
        other: coerce_f64(cell(CanonicalField::Other))?,
        brand: coerce_text(cell(CanonicalField::Brand)),
        category: coerce_text(cell(CanonicalField::Category)),
        date,
    })
}

pub fn detect_and_normalize(table: &Table) -> Detection {
    if table.is_empty() {
        warn!(columns = table.columns().len(), "table has no data rows");
    }
    let mapping = map_columns(table.columns());
    for (field, column) in mapping.iter() {
        debug!(field = %field, column = column.unwrap_or("-"), "column mapping");
    }

    let mut rows = Vec::with_capacity(table.len());
    let mut dropped_rows = 0usize;
    for (idx, row) in table.rows().enumerate() {
        match normalize_row(&row, &mapping) {
            Some(r) => rows.push(r),
            None => {
                dropped_rows += 1;
                debug!(row = idx, "row dropped: numeric field could not be coerced");
            }
        }
    }

    let marketplace = detect_marketplace(table.columns(), &mapping);
    let load_report = LoadReport {
        total_rows: table.len(),
        normalized_rows: rows.len(),
        dropped_rows,
        undated_rows: rows.iter().filter(|r| r.date.is_none()).count(),
    };
    info!(
        marketplace = marketplace.label(),
        total = load_report.total_rows,
        normalized = load_report.normalized_rows,
        dropped = load_report.dropped_rows,
        "export normalized"
    );

    Detection {
        rows,
        marketplace,
        mapping,
        load_report,
    }
}
