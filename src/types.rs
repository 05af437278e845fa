use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tabled::Tabled;

/// A single loosely typed spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
    Missing,
}

static MISSING: CellValue = CellValue::Missing;

/// Ordered column names plus rows of cells.
///
/// Rows are addressed by column name through [`RowRef::get`]. When a header
/// repeats, the first column carrying that name wins.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        let mut index = HashMap::new();
        for (i, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Table {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding short rows with `Missing` and cutting long ones
    /// down to the header width.
    pub fn push_row(&mut self, mut cells: Vec<CellValue>) {
        cells.resize(self.columns.len(), CellValue::Missing);
        self.rows.push(cells);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> + '_ {
        self.rows.iter().map(move |cells| RowRef {
            table: self,
            cells: cells.as_slice(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    cells: &'a [CellValue],
}

impl<'a> RowRef<'a> {
    /// Cell under `column`, or `Missing` for an unknown column.
    pub fn get(&self, column: &str) -> &'a CellValue {
        self.table
            .index
            .get(column)
            .and_then(|&i| self.cells.get(i))
            .unwrap_or(&MISSING)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Turnover,
    Commission,
    Logistics,
    Cost,
    Other,
    Brand,
    Category,
    Date,
    Qty,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::Turnover,
        CanonicalField::Commission,
        CanonicalField::Logistics,
        CanonicalField::Cost,
        CanonicalField::Other,
        CanonicalField::Brand,
        CanonicalField::Category,
        CanonicalField::Date,
        CanonicalField::Qty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Turnover => "turnover",
            CanonicalField::Commission => "commission",
            CanonicalField::Logistics => "logistics",
            CanonicalField::Cost => "cost",
            CanonicalField::Other => "other",
            CanonicalField::Brand => "brand",
            CanonicalField::Category => "category",
            CanonicalField::Date => "date",
            CanonicalField::Qty => "qty",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical field -> source column name, `None` when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: [Option<String>; 9],
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.columns[field as usize].as_deref()
    }

    pub fn set(&mut self, field: CanonicalField, column: Option<String>) {
        self.columns[field as usize] = column;
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, Option<&str>)> + '_ {
        CanonicalField::ALL
            .iter()
            .map(move |&field| (field, self.get(field)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marketplace {
    Ozon,
    Wildberries,
    Unknown,
}

impl Marketplace {
    pub fn label(self) -> &'static str {
        match self {
            Marketplace::Ozon => "Ozon",
            Marketplace::Wildberries => "Wildberries",
            Marketplace::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct NormalizedRow {
    pub turnover: f64,
    pub commission: f64,
    pub logistics: f64,
    pub cost: f64,
    pub other: f64,
    pub brand: String,
    pub category: String,
    #[tabled(display_with = "display_date")]
    pub date: Option<String>,
}

fn display_date(date: &Option<String>) -> String {
    date.clone().unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregates {
    pub turnover: f64,
    pub commission: f64,
    pub logistics: f64,
    pub cost: f64,
    pub other: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandSum {
    pub brand: String,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySum {
    pub category: String,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: String,
    pub turnover: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSlice {
    pub name: &'static str,
    pub value: f64,
}

impl ChartSlice {
    /// Display caption used by the dashboard.
    pub fn label(&self) -> &'static str {
        match self.name {
            "commission" => "Комиссия",
            "logistics" => "Логистика",
            "cost" => "Себестоимость",
            "other" => "Другие",
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub aggregates: Aggregates,
    pub profit: f64,
    pub top_brands: Vec<BrandSum>,
    pub top_cats: Vec<CategorySum>,
    pub series: Vec<SeriesPoint>,
    pub chart: Vec<ChartSlice>,
    pub rows: Vec<NormalizedRow>,
}

/// Single-row "aggregates" sheet of the export.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSheetRow {
    pub turnover: f64,
    pub commission: f64,
    pub logistics: f64,
    pub cost: f64,
    pub other: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Tabled)]
pub struct MetricRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, Tabled)]
pub struct MappingRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Column")]
    pub column: String,
}

#[derive(Debug, Clone, Tabled)]
pub struct RankedRow {
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Turnover")]
    pub turnover: String,
}

#[derive(Debug, Clone, Tabled)]
pub struct SeriesRow {
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Turnover")]
    pub turnover: String,
}

#[derive(Debug, Clone, Tabled)]
pub struct CostShareRow {
    #[tabled(rename = "Item")]
    pub item: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Share")]
    pub share: String,
}
