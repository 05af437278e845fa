use crate::loader::Detection;
use crate::types::{
    AggregateSheetRow, CostShareRow, MappingRow, MetricRow, RankedRow, Report, SeriesRow,
};
use crate::util::{format_int, format_number, share_pct};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create csv: {}", path.display()))?;
    for r in rows {
        wtr.serialize(r)
            .with_context(|| format!("failed to write csv row: {}", path.display()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).with_context(|| format!("failed to write json: {}", path.display()))?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Print what was detected in the loaded file: marketplace, column mapping
/// and row diagnostics.
pub fn print_detection(detection: &Detection) {
    let lr = &detection.load_report;
    println!("Marketplace: {}", detection.marketplace.label());
    println!(
        "Processing dataset... ({} rows read, {} normalized)",
        format_int(lr.total_rows as u64),
        format_int(lr.normalized_rows as u64)
    );
    if lr.dropped_rows > 0 {
        println!(
            "Note: {} rows skipped because a numeric field could not be read.",
            format_int(lr.dropped_rows as u64)
        );
    }
    if lr.undated_rows > 0 {
        println!(
            "Info: {} rows have no recognized date.",
            format_int(lr.undated_rows as u64)
        );
    }
    println!();

    let mapping: Vec<MappingRow> = detection
        .mapping
        .iter()
        .map(|(field, column)| MappingRow {
            field: field.to_string(),
            column: column.unwrap_or("-").to_string(),
        })
        .collect();
    preview_table_rows(&mapping, mapping.len());
}

pub fn headline_rows(report: &Report) -> Vec<MetricRow> {
    let metric = |name: &str, value: f64| MetricRow {
        metric: name.to_string(),
        value: format_number(value, 2),
    };
    vec![
        metric("Оборот", report.aggregates.turnover),
        metric("Чистая прибыль", report.profit),
        metric("Комиссия", report.aggregates.commission),
        metric("Логистика", report.aggregates.logistics),
    ]
}

pub fn cost_share_rows(report: &Report) -> Vec<CostShareRow> {
    let total: f64 = report.chart.iter().map(|s| s.value).sum();
    report
        .chart
        .iter()
        .map(|s| CostShareRow {
            item: s.label().to_string(),
            value: format_number(s.value, 2),
            share: format!("{}%", format_number(share_pct(s.value, total), 2)),
        })
        .collect()
}

fn ranked_rows<'a, I>(entries: I, limit: usize) -> Vec<RankedRow>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    entries
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (name, sum))| RankedRow {
            rank: idx + 1,
            name: name.to_string(),
            turnover: format_number(sum, 2),
        })
        .collect()
}

pub fn top_brand_rows(report: &Report, limit: usize) -> Vec<RankedRow> {
    ranked_rows(report.top_brands.iter().map(|b| (b.brand.as_str(), b.sum)), limit)
}

pub fn top_category_rows(report: &Report, limit: usize) -> Vec<RankedRow> {
    ranked_rows(
        report.top_cats.iter().map(|c| (c.category.as_str(), c.sum)),
        limit,
    )
}

/// Render the whole dashboard to stdout. Every section has an empty state,
/// so an all-zero report prints cleanly.
pub fn print_dashboard(report: &Report, top_n: usize, preview_rows: usize) {
    println!("Headline metrics\n");
    preview_table_rows(&headline_rows(report), 4);

    println!("Turnover over time\n");
    if report.series.is_empty() {
        println!("No recognized dates in the file; time series is unavailable.\n");
    } else {
        let series: Vec<SeriesRow> = report
            .series
            .iter()
            .map(|p| SeriesRow {
                date: p.date.clone(),
                turnover: format_number(p.turnover, 2),
            })
            .collect();
        preview_table_rows(&series, series.len());
    }

    println!("Cost structure\n");
    preview_table_rows(&cost_share_rows(report), report.chart.len());

    println!("Top {} brands\n", top_n);
    if report.top_brands.is_empty() {
        println!("No brand data.\n");
    } else {
        preview_table_rows(&top_brand_rows(report, top_n), top_n);
    }

    println!("Top {} categories\n", top_n);
    if report.top_cats.is_empty() {
        println!("No category data.\n");
    } else {
        preview_table_rows(&top_category_rows(report, top_n), top_n);
    }

    println!(
        "First {} normalized rows (of {})\n",
        preview_rows.min(report.rows.len()),
        format_int(report.rows.len() as u64)
    );
    preview_table_rows(&report.rows, preview_rows);
}

#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub rows: PathBuf,
    pub aggregates: PathBuf,
    pub json: PathBuf,
}

/// Write the export: the full normalized rows, a single-row aggregates
/// sheet with profit, and the whole report as JSON.
pub fn export_report(report: &Report, out_dir: &Path, stem: &str) -> Result<ExportPaths> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output dir: {}", out_dir.display()))?;
    let paths = ExportPaths {
        rows: out_dir.join(format!("{stem}_rows.csv")),
        aggregates: out_dir.join(format!("{stem}_aggregates.csv")),
        json: out_dir.join(format!("{stem}_report.json")),
    };

    write_csv(&paths.rows, &report.rows)?;
    let agg = &report.aggregates;
    let sheet = [AggregateSheetRow {
        turnover: agg.turnover,
        commission: agg.commission,
        logistics: agg.logistics,
        cost: agg.cost,
        other: agg.other,
        profit: report.profit,
    }];
    write_csv(&paths.aggregates, &sheet)?;
    write_json(&paths.json, report)?;
    Ok(paths)
}
