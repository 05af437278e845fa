use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;

use crate::config::AppConfig;
use crate::loader::{detect_and_normalize, normalize_row, parse_csv};
use crate::mapper::{detect_marketplace, map_columns};
use crate::output::{cost_share_rows, export_report, headline_rows, top_brand_rows};
use crate::reports::build_report;
use crate::types::*;
use crate::{prompt_back_to_menu, read_line, run_menu};

fn unique_test_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("marketplace-report-{prefix}-{nanos}"))
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

fn table(names: &[&str], rows: Vec<Vec<CellValue>>) -> Table {
    let mut t = Table::new(columns(names));
    for r in rows {
        t.push_row(r);
    }
    t
}

fn row(turnover: f64, brand: &str, category: &str, date: Option<&str>) -> NormalizedRow {
    NormalizedRow {
        turnover,
        commission: 0.0,
        logistics: 0.0,
        cost: 0.0,
        other: 0.0,
        brand: brand.to_string(),
        category: category.to_string(),
        date: date.map(str::to_string),
    }
}

#[test]
fn ozon_order_export_end_to_end() {
    let t = table(
        &["Сумма заказа", "Комиссия", "Бренд", "Дата заказа"],
        vec![vec![
            CellValue::Number(1000.0),
            CellValue::Number(100.0),
            text("Nike"),
            text("2024-01-01"),
        ]],
    );

    let detection = detect_and_normalize(&t);
    let m = &detection.mapping;
    assert_eq!(m.get(CanonicalField::Turnover), Some("Сумма заказа"));
    assert_eq!(m.get(CanonicalField::Commission), Some("Комиссия"));
    assert_eq!(m.get(CanonicalField::Brand), Some("Бренд"));
    assert_eq!(m.get(CanonicalField::Date), Some("Дата заказа"));
    for field in [
        CanonicalField::Logistics,
        CanonicalField::Cost,
        CanonicalField::Other,
        CanonicalField::Category,
        CanonicalField::Qty,
    ] {
        assert_eq!(m.get(field), None, "{field} should be unmapped");
    }
    assert_eq!(detection.marketplace, Marketplace::Ozon);

    assert_eq!(
        detection.rows,
        vec![NormalizedRow {
            turnover: 1000.0,
            commission: 100.0,
            logistics: 0.0,
            cost: 0.0,
            other: 0.0,
            brand: "Nike".to_string(),
            category: String::new(),
            date: Some("2024-01-01".to_string()),
        }]
    );

    let report = build_report(&detection.rows);
    assert_eq!(report.aggregates.turnover, 1000.0);
    assert_eq!(report.profit, 900.0);
    assert_eq!(
        report.top_brands,
        vec![BrandSum {
            brand: "Nike".to_string(),
            sum: 1000.0
        }]
    );
    assert!(report.top_cats.is_empty());
    assert_eq!(
        report.series,
        vec![SeriesPoint {
            date: "2024-01-01".to_string(),
            turnover: 1000.0
        }]
    );
}

#[test]
fn map_columns_is_deterministic() {
    let cols = columns(&["Order Total", "Fee", "Shipping", "Brand", "Created At", "Units"]);
    let first = map_columns(&cols);
    let second = map_columns(&cols);
    assert_eq!(first, second);
    assert_eq!(first.get(CanonicalField::Turnover), Some("Order Total"));
    assert_eq!(first.get(CanonicalField::Commission), Some("Fee"));
    assert_eq!(first.get(CanonicalField::Logistics), Some("Shipping"));
    assert_eq!(first.get(CanonicalField::Date), Some("Created At"));
    assert_eq!(first.get(CanonicalField::Qty), Some("Units"));
}

#[test]
fn candidate_priority_beats_column_order() {
    let cols = columns(&["Total", "Сумма заказа"]);
    let mapping = map_columns(&cols);
    assert_eq!(mapping.get(CanonicalField::Turnover), Some("Сумма заказа"));
}

#[test]
fn first_matching_column_wins_for_same_candidate() {
    let cols = columns(&["Brand (main)", "Brand (alt)"]);
    let mapping = map_columns(&cols);
    assert_eq!(mapping.get(CanonicalField::Brand), Some("Brand (main)"));
}

#[test]
fn unmapped_fields_default_without_dropping_rows() {
    let t = table(&["Amount"], vec![vec![CellValue::Number(5.0)]]);
    let detection = detect_and_normalize(&t);
    assert_eq!(detection.rows, vec![row(5.0, "", "", None)]);
    assert_eq!(detection.load_report.dropped_rows, 0);
}

#[test]
fn uncoercible_number_drops_the_row() {
    let t = table(
        &["Amount", "Brand", "Date"],
        vec![
            vec![text("abc"), text("A"), text("2024-01-01")],
            vec![CellValue::Number(10.0), text("B"), text("2024-01-02")],
        ],
    );
    let detection = detect_and_normalize(&t);
    assert_eq!(detection.load_report.total_rows, 2);
    assert_eq!(detection.load_report.dropped_rows, 1);

    let report = build_report(&detection.rows);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.aggregates.turnover, 10.0);
    assert_eq!(report.top_brands.len(), 1);
    assert_eq!(report.top_brands[0].brand, "B");
}

#[test]
fn uncoercible_secondary_field_also_drops_the_row() {
    let mapping = map_columns(&columns(&["Amount", "Commission"]));
    let t = table(
        &["Amount", "Commission"],
        vec![vec![CellValue::Number(10.0), text("n/a")]],
    );
    let first = t.rows().next().expect("one row");
    assert_eq!(normalize_row(&first, &mapping), None);
}

#[test]
fn bad_date_keeps_the_row_but_skips_series() {
    let t = table(
        &["Amount", "Date"],
        vec![vec![CellValue::Number(50.0), text("someday")]],
    );
    let detection = detect_and_normalize(&t);
    assert_eq!(detection.rows.len(), 1);
    assert_eq!(detection.rows[0].date, None);
    assert_eq!(detection.load_report.undated_rows, 1);

    let report = build_report(&detection.rows);
    assert_eq!(report.aggregates.turnover, 50.0);
    assert!(report.series.is_empty());
}

#[test]
fn native_date_cells_are_formatted() {
    let ts = NaiveDate::from_ymd_opt(2024, 5, 9)
        .and_then(|d| d.and_hms_opt(13, 45, 0))
        .expect("valid timestamp");
    let t = table(&["Sales", "Date"], vec![vec![CellValue::Number(1.0), CellValue::Date(ts)]]);
    let detection = detect_and_normalize(&t);
    assert_eq!(detection.rows[0].date.as_deref(), Some("2024-05-09"));
}

#[test]
fn empty_input_gives_zero_report() {
    let report = build_report(&[]);
    assert_eq!(report.aggregates, Aggregates::default());
    assert_eq!(report.profit, 0.0);
    assert!(report.top_brands.is_empty());
    assert!(report.top_cats.is_empty());
    assert!(report.series.is_empty());
    assert!(report.rows.is_empty());
    let chart: Vec<(&str, f64)> = report.chart.iter().map(|s| (s.name, s.value)).collect();
    assert_eq!(
        chart,
        vec![
            ("commission", 0.0),
            ("logistics", 0.0),
            ("cost", 0.0),
            ("other", 0.0)
        ]
    );

    let shares = cost_share_rows(&report);
    assert_eq!(shares.len(), 4);
    assert!(shares.iter().all(|s| s.share == "0.00%"));
}

#[test]
fn empty_table_normalizes_to_nothing() {
    let t = table(&["Amount", "Brand"], vec![]);
    let detection = detect_and_normalize(&t);
    assert!(detection.rows.is_empty());
    assert_eq!(detection.load_report, Default::default());
}

#[test]
fn profit_can_go_negative() {
    let rows = vec![NormalizedRow {
        turnover: 100.0,
        commission: 80.0,
        logistics: 30.0,
        cost: 10.0,
        other: 5.0,
        brand: String::new(),
        category: String::new(),
        date: None,
    }];
    let report = build_report(&rows);
    assert_eq!(report.profit, -25.0);
    let a = &report.aggregates;
    assert_eq!(
        report.profit,
        a.turnover - (a.commission + a.logistics + a.cost + a.other)
    );
    assert_eq!(headline_rows(&report)[1].value, "-25.00");
}

#[test]
fn top_brands_are_stable_on_ties() {
    let rows = vec![
        row(100.0, "A", "Shoes", None),
        row(50.0, "C", "Bags", None),
        row(100.0, "B", "Shoes", None),
    ];
    let report = build_report(&rows);
    let brands: Vec<(&str, f64)> = report
        .top_brands
        .iter()
        .map(|b| (b.brand.as_str(), b.sum))
        .collect();
    assert_eq!(brands, vec![("A", 100.0), ("B", 100.0), ("C", 50.0)]);

    let cats: Vec<(&str, f64)> = report
        .top_cats
        .iter()
        .map(|c| (c.category.as_str(), c.sum))
        .collect();
    assert_eq!(cats, vec![("Shoes", 200.0), ("Bags", 50.0)]);

    let ranked = top_brand_rows(&report, 2);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].rank, 1);
    assert_eq!(ranked[1].name, "B");
}

#[test]
fn series_is_sorted_by_date() {
    let rows = vec![
        row(50.0, "", "", Some("2024-03-01")),
        row(30.0, "", "", Some("2024-01-15")),
        row(20.0, "", "", Some("2024-03-01")),
    ];
    let report = build_report(&rows);
    assert_eq!(
        report.series,
        vec![
            SeriesPoint {
                date: "2024-01-15".to_string(),
                turnover: 30.0
            },
            SeriesPoint {
                date: "2024-03-01".to_string(),
                turnover: 70.0
            },
        ]
    );
}

#[test]
fn marketplace_detection_labels() {
    let check = |names: &[&str]| {
        let cols = columns(names);
        detect_marketplace(&cols, &map_columns(&cols))
    };
    assert_eq!(check(&["Ozon SKU", "Amount"]), Marketplace::Ozon);
    assert_eq!(check(&["Сумма заказа", "Бренд"]), Marketplace::Ozon);
    assert_eq!(check(&["Артикул WB", "Цена"]), Marketplace::Wildberries);
    assert_eq!(check(&["Wildberries order", "Сумма"]), Marketplace::Wildberries);
    assert_eq!(check(&["Amount", "Brand"]), Marketplace::Unknown);
}

#[test]
fn parse_csv_handles_semicolons_and_blanks() {
    let text = "\u{FEFF}Сумма;Бренд;Дата\n1 000,50;Nike;01.02.2024\n;;\nabc;Adidas;\n";
    let t = parse_csv(text).expect("csv should parse");
    assert_eq!(t.columns(), columns(&["Сумма", "Бренд", "Дата"]).as_slice());
    assert_eq!(t.len(), 3);

    let detection = detect_and_normalize(&t);
    assert_eq!(
        detection.rows,
        vec![
            row(1000.5, "Nike", "", Some("2024-02-01")),
            row(0.0, "", "", None),
        ]
    );
    assert_eq!(detection.load_report.total_rows, 3);
    assert_eq!(detection.load_report.normalized_rows, 2);
    assert_eq!(detection.load_report.dropped_rows, 1);
    assert_eq!(detection.load_report.undated_rows, 1);
}

#[test]
fn parse_csv_names_blank_headers() {
    let t = parse_csv("Amount,,Brand\n1,x,A\n").expect("csv should parse");
    assert_eq!(t.columns()[1], "Unnamed: 1");
}

#[test]
fn export_writes_rows_aggregates_and_json() {
    let out_dir = unique_test_dir("export");
    let t = table(
        &["Сумма заказа", "Комиссия", "Бренд", "Дата заказа"],
        vec![vec![
            CellValue::Number(1000.0),
            CellValue::Number(100.0),
            text("Nike"),
            text("2024-01-01"),
        ]],
    );
    let report = build_report(&detect_and_normalize(&t).rows);

    let paths = export_report(&report, &out_dir, "orders").expect("export should succeed");

    let rows_csv = fs::read_to_string(&paths.rows).expect("rows csv readable");
    assert_eq!(rows_csv.lines().count(), 2, "header plus one row");
    assert!(rows_csv.starts_with("turnover,commission,logistics,cost,other,brand,category,date"));
    assert!(rows_csv.contains("Nike"));

    let agg_csv = fs::read_to_string(&paths.aggregates).expect("aggregates csv readable");
    assert_eq!(agg_csv.lines().count(), 2, "header plus one row");
    assert!(agg_csv.starts_with("turnover,commission,logistics,cost,other,profit"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&paths.json).expect("json readable"))
            .expect("json parses");
    assert_eq!(json["profit"].as_f64(), Some(900.0));
    assert_eq!(json["topBrands"][0]["brand"], "Nike");
    assert_eq!(json["chart"].as_array().map(|c| c.len()), Some(4));

    fs::remove_dir_all(&out_dir).expect("should cleanup temp dir");
}

#[test]
fn huge_totals_saturate_instead_of_going_nan() {
    let mut big = row(f64::MAX, "A", "", Some("2024-01-01"));
    big.commission = f64::MAX;
    let report = build_report(&[big.clone(), big]);

    assert_eq!(report.aggregates.turnover, f64::MAX);
    assert_eq!(report.aggregates.commission, f64::MAX);
    assert!(report.profit.is_finite(), "profit should stay finite");
    assert_eq!(report.profit, 0.0);
    assert_eq!(report.top_brands[0].sum, f64::MAX);
    assert_eq!(report.series[0].turnover, f64::MAX);
}

#[test]
fn read_line_reports_closed_input() {
    let mut input = Cursor::new("  y \n");
    assert_eq!(read_line(&mut input, ""), Some("y".to_string()));
    assert_eq!(read_line(&mut input, ""), None);
}

#[test]
fn back_to_menu_prompt_stops_at_end_of_input() {
    assert!(prompt_back_to_menu(&mut Cursor::new("maybe\ny\n")));
    assert!(!prompt_back_to_menu(&mut Cursor::new("n\n")));
    assert!(!prompt_back_to_menu(&mut Cursor::new("maybe\n")));
    assert!(!prompt_back_to_menu(&mut Cursor::new("")));
}

#[test]
fn menu_exits_when_input_closes() {
    let cfg = AppConfig::default();
    // Each call must return; a closed stdin used to loop forever.
    run_menu(&cfg, &mut Cursor::new(""));
    run_menu(&cfg, &mut Cursor::new("9\n"));
    run_menu(&cfg, &mut Cursor::new("2\n"));
    run_menu(&cfg, &mut Cursor::new("1\n"));
}
