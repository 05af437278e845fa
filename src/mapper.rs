// Column detection: maps canonical fields onto whatever headers the
// marketplace export happens to use.
use crate::types::{CanonicalField, ColumnMapping, Marketplace};
use once_cell::sync::Lazy;

/// Candidate header fragments per canonical field, lowercase, in priority
/// order. Order matters: the first candidate that matches any column wins.
pub static COLUMN_CANDIDATES: Lazy<Vec<(CanonicalField, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            CanonicalField::Turnover,
            vec![
                "сумма заказа",
                "сумма",
                "amount",
                "order total",
                "total",
                "продажи",
                "sales",
                "revenue",
                "итого",
            ],
        ),
        (
            CanonicalField::Commission,
            vec!["комиссия", "commission", "fee"],
        ),
        (
            CanonicalField::Logistics,
            vec!["логистика", "доставка", "logistics", "shipping", "delivery"],
        ),
        (
            CanonicalField::Cost,
            vec!["себестоимость", "cost", "cost price"],
        ),
        (CanonicalField::Other, vec!["прочие", "other", "tax", "налог"]),
        (CanonicalField::Brand, vec!["бренд", "brand", "manufacturer"]),
        (
            CanonicalField::Category,
            vec!["категория", "category", "section", "раздел"],
        ),
        (
            CanonicalField::Date,
            vec!["дата", "date", "order date", "дата заказа", "created at"],
        ),
        (
            CanonicalField::Qty,
            vec!["количество", "qty", "quantity", "units"],
        ),
    ]
});

/// Header phrase only the Ozon order export uses for its turnover column.
const OZON_TURNOVER_HINT: &str = "сумма заказа";

/// First column whose lowercased name contains a candidate. Candidates are
/// the outer loop, so a higher-priority candidate beats an earlier column.
fn find_column<'a>(
    columns: &'a [String],
    lowered: &[String],
    candidates: &[&str],
) -> Option<&'a str> {
    candidates.iter().find_map(|candidate| {
        lowered
            .iter()
            .position(|name| name.contains(*candidate))
            .map(|i| columns[i].as_str())
    })
}

pub fn map_columns(columns: &[String]) -> ColumnMapping {
    let lowered: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
    let mut mapping = ColumnMapping::default();
    for (field, candidates) in COLUMN_CANDIDATES.iter() {
        let found = find_column(columns, &lowered, candidates).map(str::to_string);
        mapping.set(*field, found);
    }
    mapping
}

/// Best-effort guess of which marketplace produced the export. Purely a
/// display label; nothing downstream depends on it.
pub fn detect_marketplace(columns: &[String], mapping: &ColumnMapping) -> Marketplace {
    let blob = columns
        .iter()
        .map(|c| c.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let ozon_turnover = mapping
        .get(CanonicalField::Turnover)
        .map(|c| c.to_lowercase().contains(OZON_TURNOVER_HINT))
        .unwrap_or(false);

    if blob.contains("ozon") || ozon_turnover {
        Marketplace::Ozon
    } else if blob.contains("wildberries") || blob.contains("wb") {
        Marketplace::Wildberries
    } else {
        Marketplace::Unknown
    }
}
