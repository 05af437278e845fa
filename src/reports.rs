use crate::types::{
    Aggregates, BrandSum, CategorySum, ChartSlice, NormalizedRow, Report, SeriesPoint,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Add two finite amounts, saturating at the largest finite `f64` so that a
/// pathological total never turns into `inf` (and profit into NaN).
fn add_amount(a: f64, b: f64) -> f64 {
    (a + b).clamp(f64::MIN, f64::MAX)
}

/// Turnover sums keyed by text, remembering first-seen key order so that a
/// stable sort keeps ties in insertion order.
#[derive(Default)]
struct GroupSums {
    order: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl GroupSums {
    fn add(&mut self, key: &str, value: f64) {
        if key.is_empty() {
            return;
        }
        match self.index.get(key) {
            Some(&i) => self.order[i].1 = add_amount(self.order[i].1, value),
            None => {
                self.index.insert(key.to_string(), self.order.len());
                self.order.push((key.to_string(), value));
            }
        }
    }

    fn into_sorted_desc(self) -> Vec<(String, f64)> {
        let mut entries = self.order;
        // `sort_by` is stable: equal sums keep first-seen order.
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        entries
    }
}

pub fn build_report(rows: &[NormalizedRow]) -> Report {
    let mut agg = Aggregates::default();
    let mut by_brand = GroupSums::default();
    let mut by_category = GroupSums::default();
    // ISO dates sort correctly as plain text.
    let mut by_date: BTreeMap<&str, f64> = BTreeMap::new();

    for r in rows {
        agg.turnover = add_amount(agg.turnover, r.turnover);
        agg.commission = add_amount(agg.commission, r.commission);
        agg.logistics = add_amount(agg.logistics, r.logistics);
        agg.cost = add_amount(agg.cost, r.cost);
        agg.other = add_amount(agg.other, r.other);
        by_brand.add(&r.brand, r.turnover);
        by_category.add(&r.category, r.turnover);
        if let Some(date) = r.date.as_deref().filter(|d| !d.is_empty()) {
            let sum = by_date.entry(date).or_insert(0.0);
            *sum = add_amount(*sum, r.turnover);
        }
    }

    let expenses = [agg.logistics, agg.cost, agg.other]
        .into_iter()
        .fold(agg.commission, add_amount);
    let profit = add_amount(agg.turnover, -expenses);
    let top_brands = by_brand
        .into_sorted_desc()
        .into_iter()
        .map(|(brand, sum)| BrandSum { brand, sum })
        .collect();
    let top_cats = by_category
        .into_sorted_desc()
        .into_iter()
        .map(|(category, sum)| CategorySum { category, sum })
        .collect();
    let series = by_date
        .into_iter()
        .map(|(date, turnover)| SeriesPoint {
            date: date.to_string(),
            turnover,
        })
        .collect();
    let chart = vec![
        ChartSlice { name: "commission", value: agg.commission },
        ChartSlice { name: "logistics", value: agg.logistics },
        ChartSlice { name: "cost", value: agg.cost },
        ChartSlice { name: "other", value: agg.other },
    ];

    Report {
        aggregates: agg,
        profit,
        top_brands,
        top_cats,
        series,
        chart,
        rows: rows.to_vec(),
    }
}
